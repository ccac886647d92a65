//! Record shapes exchanged with the storage collaborator.
//!
//! Source records carry an open bag of named attributes. Each attribute is a
//! tagged [`AttributeValue`]; a [`RecordSchema`] says which attribute slots
//! exist for a record type, so projection can work generically over the bag.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque record identity assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Attribute bag ───────────────────────────────────────────────────────────

/// One named attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Date(DateTime<Utc>),
    Reference(RecordId),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// True for blank strings, empty references and lists with no non-empty item.
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::String(s) => s.trim().is_empty(),
            AttributeValue::Number(_) | AttributeValue::Date(_) => false,
            AttributeValue::Reference(id) => id.0.is_empty(),
            AttributeValue::List(items) => items.iter().all(AttributeValue::is_empty),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            AttributeValue::String(_) => FieldKind::String,
            AttributeValue::Number(_) => FieldKind::Number,
            AttributeValue::Date(_) => FieldKind::Date,
            AttributeValue::Reference(_) => FieldKind::Reference,
            AttributeValue::List(_) => FieldKind::List,
        }
    }
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// Declared kind of an attribute slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Date,
    Reference,
    List,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Date => "date",
            FieldKind::Reference => "reference",
            FieldKind::List => "list",
        }
    }
}

/// Attribute slots available on one record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    pub record_type: String,
    pub fields: BTreeMap<String, FieldKind>,
}

impl RecordSchema {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style slot declaration.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.insert(name.into(), kind);
        self
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.get(name).copied()
    }
}

// ── Recurrence rule ─────────────────────────────────────────────────────────

/// Repeat unit of a recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Cadence {
    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
            Cadence::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            "yearly" => Ok(Cadence::Yearly),
            _ => Err(s.to_string()),
        }
    }
}

/// Raw recurrence fields as stored on the source record.
///
/// Values are kept unparsed; the extractor owns validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceRule {
    pub enabled: bool,
    pub cadence: Option<String>,
    pub interval: Option<i64>,
    pub repeat_count: Option<i64>,
    pub repeat_end_date: Option<String>,
}

// ── Records ─────────────────────────────────────────────────────────────────

fn default_record_type() -> String {
    "event".to_string()
}

/// The canonical event a series is expanded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: RecordId,
    #[serde(default = "default_record_type")]
    pub record_type: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    /// Set when this record was itself generated from another event.
    #[serde(default)]
    pub parent_event_id: Option<RecordId>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
}

impl EventRecord {
    pub fn repeat_enabled(&self) -> bool {
        self.recurrence.as_ref().is_some_and(|rule| rule.enabled)
    }

    pub fn is_generated(&self) -> bool {
        self.parent_event_id.is_some()
    }
}

/// An occurrence about to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceDraft {
    pub record_type: String,
    pub owner: String,
    pub published: bool,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub parent_event_id: RecordId,
    pub attributes: Attributes,
}

/// A persisted generated occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub id: RecordId,
    #[serde(flatten)]
    pub draft: OccurrenceDraft,
}
