//! # recurrence-engine
//!
//! Bounded expansion of recurring events into concrete occurrences.
//!
//! A source event carries a recurrence rule (cadence, interval, and a count
//! or end-date stop condition). The engine validates that rule, expands it
//! into a finite series of occurrence intervals, and keeps the stored
//! generated occurrences in step with the source as it is edited or deleted.
//!
//! ## Modules
//!
//! - [`config`] — Engine limits (caps, batch threshold, strictness, timezone)
//! - [`record`] — Source events, generated occurrences, attribute bag and schema
//! - [`extract`] — Raw recurrence fields → validated [`RecurrenceConfig`]
//! - [`sequence`] — [`RecurrenceConfig`] → ordered occurrence intervals
//! - [`access`] — Generation, field-view and delete authorization
//! - [`project`] — Attribute copying and occurrence titles
//! - [`sanitize`] — Markup stripping for copied strings
//! - [`storage`] — Storage collaborator trait and an in-memory store
//! - [`sync`] — Delete-then-regenerate protocol and batch materialization
//! - [`hooks`] — Create/update/delete entry points for the host
//! - [`clock`] — Injected "now"
//! - [`error`] — Error types

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod hooks;
pub mod project;
pub mod record;
pub mod sanitize;
pub mod sequence;
pub mod storage;
pub mod sync;

pub use access::{AccessControl, AccessGate, Actor, AllowAll, Capability, Operation, RecordRef};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, MAX_ITERATIONS};
pub use error::{ConfigError, ProjectionError, StorageError, SyncError, ValidationError};
pub use extract::{extract, RecurrenceConfig};
pub use hooks::LifecycleHooks;
pub use project::{FieldProjector, ProjectionSummary, EXCLUDED_FIELDS};
pub use record::{
    AttributeValue, Attributes, Cadence, EventRecord, FieldKind, OccurrenceDraft,
    OccurrenceRecord, RecordId, RecordSchema, RecurrenceRule,
};
pub use sequence::{sequence, OccurrenceInterval};
pub use storage::{Condition, MemoryStorage, Storage};
pub use sync::{BatchJob, BatchQueue, OccurrenceSynchronizer, ResourceHook, SyncReport};
