//! Storage collaborator interface and an in-memory implementation.
//!
//! The engine reads source events and creates/deletes generated occurrences
//! through [`Storage`]. Every mutation made by a resync happens between
//! `begin()` and `commit()`; `rollback()` must discard all of it.

use std::collections::BTreeMap;

use crate::error::StorageError;
use crate::record::{EventRecord, OccurrenceDraft, OccurrenceRecord, RecordId, RecordSchema};

/// Filter on generated occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    ParentEventId(RecordId),
}

impl Condition {
    fn matches(&self, occurrence: &OccurrenceRecord) -> bool {
        match self {
            Condition::ParentEventId(id) => occurrence.draft.parent_event_id == *id,
        }
    }
}

pub trait Storage {
    /// Persist a generated occurrence and return its new id.
    fn create(&mut self, draft: OccurrenceDraft) -> Result<RecordId, StorageError>;

    /// Load a source event.
    fn load(&self, id: &RecordId) -> Result<EventRecord, StorageError>;

    /// Load generated occurrences by id. Unknown ids are skipped.
    fn load_many(&self, ids: &[RecordId]) -> Result<Vec<OccurrenceRecord>, StorageError>;

    fn delete(&mut self, id: &RecordId) -> Result<(), StorageError>;

    /// Ids of generated occurrences of `record_type` matching every condition.
    fn query(&self, record_type: &str, conditions: &[Condition])
        -> Result<Vec<RecordId>, StorageError>;

    /// Attribute slots of `record_type`, if the type is known.
    fn schema(&self, record_type: &str) -> Option<RecordSchema>;

    fn begin(&mut self) -> Result<(), StorageError>;

    fn commit(&mut self) -> Result<(), StorageError>;

    fn rollback(&mut self) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
struct Tables {
    events: BTreeMap<RecordId, EventRecord>,
    occurrences: BTreeMap<RecordId, OccurrenceRecord>,
    next_id: u64,
}

/// Snapshot-transactional store backed by ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Tables,
    snapshot: Option<Tables>,
    schemas: BTreeMap<String, RecordSchema>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: RecordSchema) -> Self {
        self.schemas.insert(schema.record_type.clone(), schema);
        self
    }

    /// Insert or replace a source event.
    pub fn put_event(&mut self, record: EventRecord) {
        self.tables.events.insert(record.id.clone(), record);
    }

    pub fn remove_event(&mut self, id: &RecordId) -> Option<EventRecord> {
        self.tables.events.remove(id)
    }

    /// Generated occurrences of `parent`, ordered by start.
    pub fn occurrences_of(&self, parent: &RecordId) -> Vec<&OccurrenceRecord> {
        let mut found: Vec<_> = self
            .tables
            .occurrences
            .values()
            .filter(|o| o.draft.parent_event_id == *parent)
            .collect();
        found.sort_by_key(|o| o.draft.start);
        found
    }

    pub fn occurrence_count(&self) -> usize {
        self.tables.occurrences.len()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl Storage for MemoryStorage {
    fn create(&mut self, draft: OccurrenceDraft) -> Result<RecordId, StorageError> {
        if !self.schemas.is_empty() && !self.schemas.contains_key(&draft.record_type) {
            return Err(StorageError::UnknownType(draft.record_type));
        }
        self.tables.next_id += 1;
        let id = RecordId::new(format!("occ-{}", self.tables.next_id));
        self.tables.occurrences.insert(
            id.clone(),
            OccurrenceRecord {
                id: id.clone(),
                draft,
            },
        );
        Ok(id)
    }

    fn load(&self, id: &RecordId) -> Result<EventRecord, StorageError> {
        self.tables
            .events
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn load_many(&self, ids: &[RecordId]) -> Result<Vec<OccurrenceRecord>, StorageError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.tables.occurrences.get(id).cloned())
            .collect())
    }

    fn delete(&mut self, id: &RecordId) -> Result<(), StorageError> {
        self.tables
            .occurrences
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    fn query(
        &self,
        record_type: &str,
        conditions: &[Condition],
    ) -> Result<Vec<RecordId>, StorageError> {
        Ok(self
            .tables
            .occurrences
            .values()
            .filter(|o| o.draft.record_type == record_type)
            .filter(|o| conditions.iter().all(|c| c.matches(o)))
            .map(|o| o.id.clone())
            .collect())
    }

    fn schema(&self, record_type: &str) -> Option<RecordSchema> {
        self.schemas.get(record_type).cloned()
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if self.snapshot.is_some() {
            return Err(StorageError::Transaction(
                "transaction already open".to_string(),
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| StorageError::Transaction("no open transaction".to_string()))
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| StorageError::Transaction("no open transaction".to_string()))?;
        self.tables = snapshot;
        Ok(())
    }
}
