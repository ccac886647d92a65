//! [`RecurrenceConfig`] → ordered, finite list of occurrence intervals.
//!
//! The sequencer is a pure function: no clock, no storage, no logging. Each
//! candidate is computed from the anchor (`start + k * interval` cadence
//! units) on the wall clock of the configured timezone, so:
//!
//! - a monthly series started on Jan 31 lands on the last day of shorter
//!   months and returns to the 31st afterwards;
//! - a 09:00 meeting stays at 09:00 local time across DST transitions.
//!
//! The source occurrence itself is never emitted, and the loop never runs
//! more than [`MAX_ITERATIONS`] times.

use chrono::{
    DateTime, Days, Duration, LocalResult, Months, NaiveDateTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::MAX_ITERATIONS;
use crate::extract::RecurrenceConfig;
use crate::record::Cadence;

/// One generated occurrence's time span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct OccurrenceInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Expand `config` into the occurrences that follow the source interval.
///
/// After each advance the stop conditions are checked in order: a candidate
/// past `repeat_end_date` ends the series, then a reached `repeat_count` ends
/// it. A `repeat_end_date` earlier than the first advance yields an empty
/// list, which is a valid result.
pub fn sequence(config: &RecurrenceConfig) -> Vec<OccurrenceInterval> {
    let duration = Duration::seconds(config.duration_seconds);
    let mut occurrences = Vec::new();

    for k in 1..=MAX_ITERATIONS {
        let Some(start) = advance(config, k) else {
            break;
        };
        if config.repeat_end_date.is_some_and(|until| start > until) {
            break;
        }
        if config
            .repeat_count
            .is_some_and(|count| occurrences.len() >= count as usize)
        {
            break;
        }
        let Some(end) = start.checked_add_signed(duration) else {
            break;
        };
        occurrences.push(OccurrenceInterval { start, end });
    }

    occurrences
}

/// The `k`-th cadence step from the anchor, or `None` past chrono's range.
fn advance(config: &RecurrenceConfig, k: u32) -> Option<DateTime<Utc>> {
    let tz = config.timezone;
    let local = config.start.with_timezone(&tz).naive_local();
    let units = config.interval.checked_mul(k)?;

    let shifted = match config.cadence {
        Cadence::Daily => local.checked_add_days(Days::new(u64::from(units))),
        Cadence::Weekly => local.checked_add_days(Days::new(u64::from(units) * 7)),
        Cadence::Monthly => local.checked_add_months(Months::new(units)),
        Cadence::Yearly => local.checked_add_months(Months::new(units.checked_mul(12)?)),
    }?;

    resolve_local(&tz, shifted)
}

/// Map a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times inside a
/// DST gap resolve to the first wall-clock minute after the gap, i.e. the
/// transition instant itself.
pub(crate) fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => {
            let minute = naive.with_second(0)?.with_nanosecond(0)?;
            (1..=MAX_GAP_MINUTES)
                .find_map(|m| tz.from_local_datetime(&(minute + Duration::minutes(m))).earliest())
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

/// Longest offset jump found in the tz database is two hours.
const MAX_GAP_MINUTES: i64 = 180;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn config(
        start: DateTime<Utc>,
        duration_seconds: i64,
        cadence: Cadence,
        interval: u32,
        repeat_count: Option<u32>,
        repeat_end_date: Option<DateTime<Utc>>,
    ) -> RecurrenceConfig {
        RecurrenceConfig {
            start,
            end: start + Duration::seconds(duration_seconds),
            duration_seconds,
            cadence,
            interval,
            repeat_end_date,
            repeat_count,
            timezone: chrono_tz::UTC,
        }
    }

    // ── worked examples ─────────────────────────────────────────────────

    #[test]
    fn test_daily_count_three() {
        let cfg = config(utc(2024, 1, 1, 9, 0), 3600, Cadence::Daily, 1, Some(3), None);
        let occ = sequence(&cfg);
        let starts: Vec<_> = occ.iter().map(|o| o.start).collect();
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 2, 9, 0),
                utc(2024, 1, 3, 9, 0),
                utc(2024, 1, 4, 9, 0)
            ]
        );
        assert!(occ.iter().all(|o| (o.end - o.start).num_seconds() == 3600));
    }

    #[test]
    fn test_weekly_interval_two() {
        let cfg = config(utc(2024, 3, 4, 12, 0), 0, Cadence::Weekly, 2, Some(2), None);
        let occ = sequence(&cfg);
        assert_eq!(occ[0].start, utc(2024, 3, 18, 12, 0));
        assert_eq!(occ[1].start, utc(2024, 4, 1, 12, 0));
    }

    #[test]
    fn test_monthly_end_of_month_leap_year() {
        let cfg = config(utc(2024, 1, 31, 10, 0), 0, Cadence::Monthly, 1, Some(3), None);
        let occ = sequence(&cfg);
        assert_eq!(occ[0].start, utc(2024, 2, 29, 10, 0));
        assert_eq!(occ[1].start, utc(2024, 3, 31, 10, 0));
        assert_eq!(occ[2].start, utc(2024, 4, 30, 10, 0));
    }

    #[test]
    fn test_monthly_end_of_month_non_leap_year() {
        let cfg = config(utc(2023, 1, 31, 10, 0), 0, Cadence::Monthly, 1, Some(1), None);
        assert_eq!(sequence(&cfg)[0].start, utc(2023, 2, 28, 10, 0));
    }

    #[test]
    fn test_yearly_from_leap_day() {
        let cfg = config(utc(2024, 2, 29, 8, 0), 0, Cadence::Yearly, 1, Some(4), None);
        let occ = sequence(&cfg);
        assert_eq!(occ[0].start, utc(2025, 2, 28, 8, 0));
        assert_eq!(occ[3].start, utc(2028, 2, 29, 8, 0));
    }

    #[test]
    fn test_until_date_is_inclusive() {
        let cfg = config(
            utc(2024, 1, 1, 9, 0),
            0,
            Cadence::Daily,
            1,
            None,
            Some(utc(2024, 1, 4, 9, 0)),
        );
        let occ = sequence(&cfg);
        assert_eq!(occ.len(), 3);
        assert_eq!(occ.last().unwrap().start, utc(2024, 1, 4, 9, 0));
    }

    #[test]
    fn test_until_before_first_advance_is_empty() {
        let cfg = config(
            utc(2024, 1, 1, 9, 0),
            3600,
            Cadence::Weekly,
            1,
            None,
            Some(utc(2024, 1, 3, 0, 0)),
        );
        assert!(sequence(&cfg).is_empty());
    }

    #[test]
    fn test_until_in_the_past_with_huge_interval() {
        let cfg = config(
            utc(2024, 1, 1, 9, 0),
            0,
            Cadence::Daily,
            365,
            None,
            Some(utc(2020, 1, 1, 0, 0)),
        );
        assert!(sequence(&cfg).is_empty());
    }

    #[test]
    fn test_iteration_ceiling_without_count() {
        let cfg = config(
            utc(2024, 1, 1, 9, 0),
            0,
            Cadence::Daily,
            1,
            None,
            Some(utc(2100, 1, 1, 0, 0)),
        );
        assert_eq!(sequence(&cfg).len(), MAX_ITERATIONS as usize);
    }

    #[test]
    fn test_earlier_stop_condition_wins_when_both_set() {
        let cfg = config(
            utc(2024, 1, 1, 9, 0),
            0,
            Cadence::Daily,
            1,
            Some(10),
            Some(utc(2024, 1, 3, 9, 0)),
        );
        assert_eq!(sequence(&cfg).len(), 2);
    }

    #[test]
    fn test_wall_clock_preserved_across_dst() {
        // 2024-03-10 is the US spring-forward date.
        let mut cfg = config(utc(2024, 3, 4, 14, 0), 3600, Cadence::Weekly, 1, Some(2), None);
        cfg.timezone = chrono_tz::America::New_York;
        let occ = sequence(&cfg);
        // 09:00 EST = 14:00Z before, 09:00 EDT = 13:00Z after.
        assert_eq!(occ[0].start, utc(2024, 3, 11, 13, 0));
        assert_eq!(occ[1].start, utc(2024, 3, 18, 13, 0));
        assert_eq!((occ[0].end - occ[0].start).num_seconds(), 3600);
    }

    #[test]
    fn test_dst_gap_moves_forward() {
        // 02:30 on 2024-03-10 does not exist in New York.
        let tz = chrono_tz::America::New_York;
        let naive = NaiveDateTime::parse_from_str("2024-03-10 02:30:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        assert_eq!(resolve_local(&tz, naive), Some(utc(2024, 3, 10, 7, 0)));
    }

    #[test]
    fn test_dst_gap_resolves_to_transition_instant() {
        let tz = chrono_tz::America::New_York;
        for wall in ["2024-03-10 02:00:00", "2024-03-10 02:10:00", "2024-03-10 02:59:45"] {
            let naive = NaiveDateTime::parse_from_str(wall, "%Y-%m-%d %H:%M:%S").unwrap();
            assert_eq!(resolve_local(&tz, naive), Some(utc(2024, 3, 10, 7, 0)), "{wall}");
        }
    }

    // ── properties ──────────────────────────────────────────────────────

    fn cadence_strategy() -> impl Strategy<Value = Cadence> {
        prop_oneof![
            Just(Cadence::Daily),
            Just(Cadence::Weekly),
            Just(Cadence::Monthly),
            Just(Cadence::Yearly),
        ]
    }

    proptest! {
        #[test]
        fn prop_sequence_is_bounded_ordered_and_sized(
            start_secs in 0i64..4_000_000_000,
            duration in 0i64..172_800,
            cadence in cadence_strategy(),
            interval in 1u32..=365,
            count in proptest::option::of(1u32..=100),
            until_offset in -400_000_000i64..4_000_000_000,
        ) {
            let start = DateTime::<Utc>::from_timestamp(start_secs, 0).unwrap();
            let until = if count.is_none() {
                Some(start + Duration::seconds(until_offset))
            } else {
                None
            };
            let cfg = config(start, duration, cadence, interval, count, until);
            let occ = sequence(&cfg);

            prop_assert!(occ.len() <= MAX_ITERATIONS as usize);
            if let Some(count) = count {
                prop_assert!(occ.len() <= count as usize);
            }
            let mut previous = cfg.start;
            for o in &occ {
                prop_assert!(o.start > previous);
                prop_assert_eq!((o.end - o.start).num_seconds(), duration);
                if let Some(until) = until {
                    prop_assert!(o.start <= until);
                }
                previous = o.start;
            }
        }
    }
}
