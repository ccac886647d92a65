//! Entry points called by the host when a source event is saved or deleted.
//!
//! Saving or deleting an event must not fail because of the recurrence
//! engine. Only the permission and validation gates are reported back to the
//! caller; generation failures are logged and the occurrence set is left as
//! it was.

use tracing::{debug, error};

use crate::access::{AccessControl, Actor};
use crate::clock::Clock;
use crate::error::{Result, SyncError};
use crate::record::{EventRecord, RecordId};
use crate::storage::Storage;
use crate::sync::{OccurrenceSynchronizer, SyncReport};

pub struct LifecycleHooks<S, A, C> {
    synchronizer: OccurrenceSynchronizer<S, A, C>,
}

impl<S: Storage, A: AccessControl, C: Clock> LifecycleHooks<S, A, C> {
    pub fn new(synchronizer: OccurrenceSynchronizer<S, A, C>) -> Self {
        Self { synchronizer }
    }

    pub fn synchronizer(&self) -> &OccurrenceSynchronizer<S, A, C> {
        &self.synchronizer
    }

    pub fn synchronizer_mut(&mut self) -> &mut OccurrenceSynchronizer<S, A, C> {
        &mut self.synchronizer
    }

    pub fn into_inner(self) -> OccurrenceSynchronizer<S, A, C> {
        self.synchronizer
    }

    /// A new event was saved.
    pub fn on_source_record_created(
        &mut self,
        actor: &Actor,
        record: &EventRecord,
    ) -> Result<Option<SyncReport>> {
        if record.is_generated() || !record.repeat_enabled() {
            debug!(source_id = %record.id, "created event is not a recurring source");
            return Ok(None);
        }
        degrade(&record.id, self.synchronizer.resync(actor, record))
    }

    /// An existing event was saved. Switching repeat off removes the series.
    pub fn on_source_record_updated(
        &mut self,
        actor: &Actor,
        record: &EventRecord,
    ) -> Result<Option<SyncReport>> {
        if record.is_generated() {
            return Ok(None);
        }
        if record.repeat_enabled() {
            degrade(&record.id, self.synchronizer.resync(actor, record))
        } else {
            degrade(&record.id, self.synchronizer.cleanup(actor, record))
        }
    }

    /// An event was deleted; its generated occurrences go with it.
    pub fn on_source_record_deleted(&mut self, actor: &Actor, record: &EventRecord) -> Option<SyncReport> {
        if record.is_generated() {
            return None;
        }
        degrade(&record.id, self.synchronizer.cleanup(actor, record))
            .ok()
            .flatten()
    }
}

/// Pass gate failures through; swallow generation failures.
fn degrade(
    source_id: &RecordId,
    outcome: Result<SyncReport>,
) -> Result<Option<SyncReport>> {
    match outcome {
        Ok(report) => Ok(Some(report)),
        Err(SyncError::GenerationFailed(message)) => {
            error!(source_id = %source_id, error = %message, "occurrences not synchronized, previous set kept");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
