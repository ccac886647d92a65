//! Copies a source event's attributes onto generated occurrence drafts.
//!
//! Projection is generic over the attribute bag: apart from the fixed
//! [`EXCLUDED_FIELDS`] list there is no per-field logic. A field is copied
//! only when it is non-empty, the target schema has a slot of the same kind,
//! and the acting user may view it on the source record.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::access::{AccessControl, AccessGate, Actor};
use crate::config::EngineConfig;
use crate::error::ProjectionError;
use crate::record::{AttributeValue, EventRecord, FieldKind, OccurrenceDraft, RecordSchema};
use crate::sanitize::{strip_markup, truncate_chars};
use crate::sequence::OccurrenceInterval;

/// Attributes never copied: identity, versioning, title, dates, timestamps
/// and every recurrence field.
pub const EXCLUDED_FIELDS: &[&str] = &[
    "id",
    "uuid",
    "revision",
    "version",
    "title",
    "start_date",
    "end_date",
    "created",
    "changed",
    "parent_event_id",
    "recurrence",
    "repeat_enabled",
    "repeat_type",
    "repeat_interval",
    "repeat_count",
    "repeat_end_date",
];

/// Per-draft projection tally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct FieldProjector<'a, A: AccessControl + ?Sized> {
    gate: AccessGate<'a, A>,
    title_max_len: usize,
    timezone: Tz,
}

impl<'a, A: AccessControl + ?Sized> FieldProjector<'a, A> {
    pub fn new(access: &'a A, config: &EngineConfig) -> Self {
        Self {
            gate: AccessGate::new(access, config.strict),
            title_max_len: config.title_max_len,
            timezone: config.timezone,
        }
    }

    /// Build a complete draft for one occurrence of `source`.
    pub fn draft(
        &self,
        actor: &Actor,
        source: &EventRecord,
        interval: &OccurrenceInterval,
        schema: Option<&RecordSchema>,
    ) -> OccurrenceDraft {
        let mut draft = OccurrenceDraft {
            record_type: source.record_type.clone(),
            owner: source.owner.clone(),
            published: source.published,
            title: self.occurrence_title(&source.title, interval.start),
            start: interval.start,
            end: interval.end,
            parent_event_id: source.id.clone(),
            attributes: Default::default(),
        };
        match schema {
            Some(schema) => {
                self.project(actor, source, &mut draft, schema);
            }
            None => debug!(
                record_type = %source.record_type,
                "no schema for record type, attributes not projected"
            ),
        }
        draft
    }

    /// Copy eligible attributes of `source` into `draft`.
    pub fn project(
        &self,
        actor: &Actor,
        source: &EventRecord,
        draft: &mut OccurrenceDraft,
        schema: &RecordSchema,
    ) -> ProjectionSummary {
        let mut summary = ProjectionSummary::default();

        for (field, value) in &source.attributes {
            if EXCLUDED_FIELDS.contains(&field.as_str()) || value.is_empty() {
                summary.skipped += 1;
                continue;
            }
            let Some(kind) = schema.field_kind(field) else {
                summary.skipped += 1;
                continue;
            };
            if !self.gate.can_copy_field(actor, source, field) {
                debug!(source_id = %source.id, field = %field, actor = %actor, "field not viewable, skipped");
                summary.skipped += 1;
                continue;
            }

            match copy_value(field, value, kind) {
                Ok(copied) if copied.is_empty() => summary.skipped += 1,
                Ok(copied) => {
                    draft.attributes.insert(field.clone(), copied);
                    summary.copied += 1;
                }
                Err(err) => {
                    warn!(source_id = %source.id, field = %field, error = %err, "field copy failed");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// `"{title} ({date})"`, sanitized and length-capped.
    pub fn occurrence_title(&self, source_title: &str, start: DateTime<Utc>) -> String {
        let date = start.with_timezone(&self.timezone).format("%B %-d, %Y");
        let title = strip_markup(&format!("{source_title} ({date})"));
        truncate_chars(&title, self.title_max_len)
    }
}

/// Check `value` against the slot kind and sanitize any strings in it.
fn copy_value(
    field: &str,
    value: &AttributeValue,
    kind: FieldKind,
) -> Result<AttributeValue, ProjectionError> {
    if value.kind() != kind {
        return Err(ProjectionError::KindMismatch {
            field: field.to_string(),
            expected: kind.as_str(),
            found: value.kind().as_str(),
        });
    }
    Ok(sanitize_value(value))
}

fn sanitize_value(value: &AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::String(s) => AttributeValue::String(strip_markup(s)),
        AttributeValue::List(items) => {
            AttributeValue::List(items.iter().map(sanitize_value).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{Capability, Operation, RecordRef};
    use crate::record::RecordId;
    use chrono::TimeZone;

    struct HideField(&'static str);

    impl AccessControl for HideField {
        fn has_capability(&self, _actor: &Actor, _capability: Capability) -> bool {
            true
        }

        fn check_access(&self, actor: &Actor, _record: RecordRef<'_>, operation: Operation<'_>) -> bool {
            // Only "admin" sees the hidden field.
            !matches!(operation, Operation::ViewField(f) if f == self.0) || actor.id == "admin"
        }
    }

    fn source() -> EventRecord {
        let mut record: EventRecord = serde_json::from_str(
            r#"{"id": "7", "owner": "alice", "published": true, "title": "Book club"}"#,
        )
        .unwrap();
        let attrs = &mut record.attributes;
        attrs.insert("location".into(), AttributeValue::String("<b>Library</b>".into()));
        attrs.insert("budget".into(), AttributeValue::Number(120.0));
        attrs.insert("notes".into(), AttributeValue::String("   ".into()));
        attrs.insert("secret".into(), AttributeValue::String("code 1234".into()));
        attrs.insert("repeat_count".into(), AttributeValue::Number(3.0));
        attrs.insert("not_in_schema".into(), AttributeValue::String("x".into()));
        attrs.insert(
            "tags".into(),
            AttributeValue::List(vec![AttributeValue::String("<i>fun</i>".into())]),
        );
        attrs.insert("capacity".into(), AttributeValue::String("twelve".into()));
        record
    }

    fn schema() -> RecordSchema {
        RecordSchema::new("event")
            .field("location", FieldKind::String)
            .field("budget", FieldKind::Number)
            .field("notes", FieldKind::String)
            .field("secret", FieldKind::String)
            .field("repeat_count", FieldKind::Number)
            .field("tags", FieldKind::List)
            .field("capacity", FieldKind::Number)
    }

    fn interval() -> OccurrenceInterval {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 18, 0, 0).unwrap();
        OccurrenceInterval {
            start,
            end: start + chrono::Duration::hours(2),
        }
    }

    #[test]
    fn test_draft_copies_eligible_fields() {
        let access = HideField("secret");
        let projector = FieldProjector::new(&access, &EngineConfig::default());
        let draft = projector.draft(&Actor::new("alice"), &source(), &interval(), Some(&schema()));

        assert_eq!(draft.parent_event_id, RecordId::new("7"));
        assert_eq!(draft.owner, "alice");
        assert!(draft.published);
        assert_eq!(draft.title, "Book club (January 2, 2024)");
        assert_eq!(
            draft.attributes.get("location"),
            Some(&AttributeValue::String("Library".into()))
        );
        assert_eq!(draft.attributes.get("budget"), Some(&AttributeValue::Number(120.0)));
        assert_eq!(
            draft.attributes.get("tags"),
            Some(&AttributeValue::List(vec![AttributeValue::String("fun".into())]))
        );
        for absent in ["notes", "secret", "repeat_count", "not_in_schema", "capacity"] {
            assert!(!draft.attributes.contains_key(absent), "{absent} should not be copied");
        }
    }

    #[test]
    fn test_hidden_field_copied_only_for_permitted_actor() {
        let access = HideField("secret");
        let projector = FieldProjector::new(&access, &EngineConfig::default());

        let for_alice = projector.draft(&Actor::new("alice"), &source(), &interval(), Some(&schema()));
        assert!(!for_alice.attributes.contains_key("secret"));

        let for_admin = projector.draft(&Actor::new("admin"), &source(), &interval(), Some(&schema()));
        assert_eq!(
            for_admin.attributes.get("secret"),
            Some(&AttributeValue::String("code 1234".into()))
        );
    }

    #[test]
    fn test_kind_mismatch_is_counted_not_fatal() {
        let access = HideField("secret");
        let projector = FieldProjector::new(&access, &EngineConfig::default());
        let mut draft = projector.draft(&Actor::new("alice"), &source(), &interval(), None);
        assert!(draft.attributes.is_empty());

        let summary = projector.project(&Actor::new("alice"), &source(), &mut draft, &schema());
        assert_eq!(summary.failed, 1); // capacity
        assert_eq!(summary.copied, 3); // location, budget, tags
    }

    #[test]
    fn test_title_sanitized_and_truncated() {
        let access = HideField("secret");
        let config = EngineConfig {
            title_max_len: 12,
            ..EngineConfig::default()
        };
        let projector = FieldProjector::new(&access, &config);
        let title = projector.occurrence_title("<script>x()</script>Yoga class", interval().start);
        assert_eq!(title, "Yoga class (");
        assert!(title.chars().count() <= 12);
    }

    #[test]
    fn test_title_date_uses_configured_timezone() {
        let access = HideField("secret");
        let config = EngineConfig::default().with_timezone("Asia/Tokyo").unwrap();
        let projector = FieldProjector::new(&access, &config);
        // 18:00Z on Jan 2 is 03:00 on Jan 3 in Tokyo.
        let title = projector.occurrence_title("Call", interval().start);
        assert_eq!(title, "Call (January 3, 2024)");
    }
}
