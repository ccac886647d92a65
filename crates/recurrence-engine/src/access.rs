//! Authorization gate in front of generation, field copy and cleanup.
//!
//! The engine does not own permissions; it asks an [`AccessControl`]
//! collaborator and fails closed on anything short of an explicit grant.

use std::fmt;

use crate::record::{EventRecord, OccurrenceRecord};

/// The user (or service account) on whose behalf the engine acts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: String,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Global, record-independent capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreateEvent,
    CreateRecurringEvents,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::CreateEvent => "create event",
            Capability::CreateRecurringEvents => "create recurring events",
        }
    }
}

/// Record-level operations checked against a specific record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    Update,
    Delete,
    ViewField(&'a str),
}

/// A record the access collaborator is asked about.
#[derive(Debug, Clone, Copy)]
pub enum RecordRef<'a> {
    Event(&'a EventRecord),
    Occurrence(&'a OccurrenceRecord),
}

/// Permission collaborator.
pub trait AccessControl {
    fn has_capability(&self, actor: &Actor, capability: Capability) -> bool;

    fn check_access(&self, actor: &Actor, record: RecordRef<'_>, operation: Operation<'_>) -> bool;
}

/// Grants everything. For operator tooling and single-user deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessControl for AllowAll {
    fn has_capability(&self, _actor: &Actor, _capability: Capability) -> bool {
        true
    }

    fn check_access(&self, _actor: &Actor, _record: RecordRef<'_>, _operation: Operation<'_>) -> bool {
        true
    }
}

/// Engine-facing view of an [`AccessControl`] collaborator.
///
/// With `enforce_record_checks == false` (legacy mode) field-view and
/// occurrence-delete checks always pass; the generation gate is enforced
/// either way.
pub struct AccessGate<'a, A: AccessControl + ?Sized> {
    access: &'a A,
    enforce_record_checks: bool,
}

impl<'a, A: AccessControl + ?Sized> AccessGate<'a, A> {
    pub fn new(access: &'a A, enforce_record_checks: bool) -> Self {
        Self {
            access,
            enforce_record_checks,
        }
    }

    /// Missing capability that blocks generation, if any.
    ///
    /// All three are required: the global "create event" and "create
    /// recurring events" capabilities, and update access on `record`.
    pub fn generation_denial(&self, actor: &Actor, record: &EventRecord) -> Option<&'static str> {
        if !self.access.has_capability(actor, Capability::CreateEvent) {
            return Some(Capability::CreateEvent.as_str());
        }
        if !self
            .access
            .check_access(actor, RecordRef::Event(record), Operation::Update)
        {
            return Some("update source event");
        }
        if !self
            .access
            .has_capability(actor, Capability::CreateRecurringEvents)
        {
            return Some(Capability::CreateRecurringEvents.as_str());
        }
        None
    }

    pub fn can_generate(&self, actor: &Actor, record: &EventRecord) -> bool {
        self.generation_denial(actor, record).is_none()
    }

    pub fn can_copy_field(&self, actor: &Actor, record: &EventRecord, field: &str) -> bool {
        !self.enforce_record_checks
            || self
                .access
                .check_access(actor, RecordRef::Event(record), Operation::ViewField(field))
    }

    pub fn can_delete(&self, actor: &Actor, occurrence: &OccurrenceRecord) -> bool {
        !self.enforce_record_checks
            || self
                .access
                .check_access(actor, RecordRef::Occurrence(occurrence), Operation::Delete)
    }
}
