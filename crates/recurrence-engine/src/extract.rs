//! Source record fields → validated [`RecurrenceConfig`].
//!
//! The extractor is the only place raw recurrence fields are interpreted.
//! Everything downstream (sequencer, synchronizer, batch worker) consumes the
//! typed config and can rely on its invariants:
//!
//! - `start <= end`, `duration_seconds >= 0`
//! - `1 <= interval <= max_repeat_interval`
//! - at least one stop condition, `1 <= repeat_count <= max_repeat_count`

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::record::{Cadence, EventRecord};
use crate::sanitize::strip_markup;
use crate::sequence::resolve_local;

/// Validated, normalized recurrence settings for one source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
    pub(crate) duration_seconds: i64,
    pub(crate) cadence: Cadence,
    pub(crate) interval: u32,
    pub(crate) repeat_end_date: Option<DateTime<Utc>>,
    pub(crate) repeat_count: Option<u32>,
    pub(crate) timezone: Tz,
}

impl RecurrenceConfig {
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration_seconds(&self) -> i64 {
        self.duration_seconds
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn repeat_end_date(&self) -> Option<DateTime<Utc>> {
        self.repeat_end_date
    }

    pub fn repeat_count(&self) -> Option<u32> {
        self.repeat_count
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

/// How a bare `YYYY-MM-DD` is turned into an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateOnly {
    StartOfDay,
    EndOfDay,
}

/// Validate the recurrence fields of `record` and build its config.
///
/// `now` anchors the future-date guard; callers pass it explicitly so the
/// result is reproducible.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered, checked in this order:
/// missing fields, unparsable dates, inverted range, unknown cadence,
/// interval bounds, stop condition, future-date guard.
pub fn extract(
    record: &EventRecord,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<RecurrenceConfig, ValidationError> {
    let rule = record
        .recurrence
        .as_ref()
        .filter(|rule| rule.enabled)
        .ok_or(ValidationError::MissingField("repeat_enabled"))?;

    let cadence_raw =
        clean(rule.cadence.as_deref()).ok_or(ValidationError::MissingField("cadence"))?;
    let interval_raw = rule.interval.ok_or(ValidationError::MissingField("interval"))?;
    let start_raw =
        clean(record.start_date.as_deref()).ok_or(ValidationError::MissingField("start_date"))?;

    let tz = config.timezone;
    let start = parse_datetime(&start_raw, &tz, DateOnly::StartOfDay)?;
    let end = match clean(record.end_date.as_deref()) {
        Some(raw) => parse_datetime(&raw, &tz, DateOnly::StartOfDay)?,
        None => start,
    };
    if start > end {
        return Err(ValidationError::InvalidRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }

    let cadence = cadence_raw
        .parse::<Cadence>()
        .map_err(ValidationError::InvalidCadence)?;

    let interval = bounded(interval_raw, config.max_repeat_interval, config.strict).ok_or(
        ValidationError::InvalidInterval {
            value: interval_raw,
            max: config.max_repeat_interval,
        },
    )?;

    let repeat_count = match rule.repeat_count {
        Some(raw) => Some(bounded(raw, config.max_repeat_count, config.strict).ok_or(
            ValidationError::InvalidCount {
                value: raw,
                max: config.max_repeat_count,
            },
        )?),
        None => None,
    };
    let repeat_end_date = match clean(rule.repeat_end_date.as_deref()) {
        Some(raw) => Some(parse_datetime(&raw, &tz, DateOnly::EndOfDay)?),
        None => None,
    };
    match (repeat_count, repeat_end_date) {
        (None, None) => return Err(ValidationError::MissingStopCondition),
        (Some(_), Some(_)) if config.strict => {
            return Err(ValidationError::ConflictingStopCondition)
        }
        _ => {}
    }

    if config.strict {
        let horizon = now
            .checked_add_months(Months::new(config.max_years_in_future.saturating_mul(12)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if start > horizon {
            return Err(ValidationError::DateTooFarFuture {
                start: start.to_rfc3339(),
                max_years: config.max_years_in_future,
            });
        }
    }

    // Accepted values are clamped once more so the sequencer never sees an
    // out-of-range cap, whichever mode produced them.
    let interval = interval.clamp(1, config.max_repeat_interval);
    let repeat_count = repeat_count.map(|count| count.clamp(1, config.max_repeat_count));

    Ok(RecurrenceConfig {
        start,
        end,
        duration_seconds: (end - start).num_seconds(),
        cadence,
        interval,
        repeat_end_date,
        repeat_count,
        timezone: tz,
    })
}

/// Strict mode rejects values outside `1..=max`; permissive mode clamps them.
fn bounded(value: i64, max: u32, strict: bool) -> Option<u32> {
    if (1..=i64::from(max)).contains(&value) {
        return u32::try_from(value).ok();
    }
    if strict {
        None
    } else {
        Some(value.clamp(1, i64::from(max)) as u32)
    }
}

/// Sanitize a raw string field; blank values count as absent.
fn clean(raw: Option<&str>) -> Option<String> {
    raw.map(strip_markup).filter(|s| !s.is_empty())
}

/// Parse RFC 3339, a naive local datetime, or a bare date in `tz`.
fn parse_datetime(raw: &str, tz: &Tz, date_only: DateOnly) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| match date_only {
                    DateOnly::StartOfDay => Some(date.and_time(NaiveTime::MIN)),
                    DateOnly::EndOfDay => date.and_hms_opt(23, 59, 59),
                })
        })
        .ok_or_else(|| ValidationError::InvalidDate(format!("'{raw}'")))?;

    resolve_local(tz, naive)
        .ok_or_else(|| ValidationError::InvalidDate(format!("'{raw}' does not exist in {tz}")))
}
