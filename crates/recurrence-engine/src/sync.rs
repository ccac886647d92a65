//! Keeps generated occurrences consistent with their source event.
//!
//! A resync never diffs: it deletes every generated occurrence of the source
//! and regenerates the series from the current rule. Ordering inside the
//! transaction is fixed:
//!
//! 1. generation gate (no mutation on failure)
//! 2. validation (no mutation on failure)
//! 3. `begin()`
//! 4. delete prior occurrences (honoring per-occurrence delete access)
//! 5. re-extract and sequence
//! 6. large series → batch queue
//! 7. materialize, skipping individual failures
//! 8. `commit()`, or `rollback()` on any error from steps 4–7
//!
//! The delete in step 4 runs before step 5 on purpose; it is only safe
//! because both sit inside the same rollback scope.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::access::{AccessControl, AccessGate, Actor};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{Result, StorageError, SyncError};
use crate::extract::{extract, RecurrenceConfig};
use crate::project::FieldProjector;
use crate::record::{EventRecord, RecordId};
use crate::sequence::{sequence, OccurrenceInterval};
use crate::storage::{Condition, Storage};

/// Outcome of a resync, cleanup or batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Occurrences created in this run.
    pub generated: usize,
    /// Prior occurrences deleted.
    pub removed: usize,
    /// Prior occurrences kept because the actor may not delete them.
    pub retained: usize,
    /// Occurrences that failed to materialize and were skipped.
    pub failures: usize,
    /// Set when materialization was handed to the batch queue.
    pub deferred: Option<usize>,
}

/// Out-of-band materialization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub source_id: RecordId,
    pub actor: Actor,
    pub config: RecurrenceConfig,
    pub estimated: usize,
}

/// Accepts jobs for [`OccurrenceSynchronizer::materialize_batch`].
pub trait BatchQueue {
    fn enqueue(&mut self, job: BatchJob) -> std::result::Result<(), StorageError>;
}

/// Called every `flush_every` materializations and once after the last one.
pub trait ResourceHook {
    fn after_flush(&mut self, created_so_far: usize);
}

impl<F: FnMut(usize)> ResourceHook for F {
    fn after_flush(&mut self, created_so_far: usize) {
        self(created_so_far)
    }
}

pub struct OccurrenceSynchronizer<S, A, C> {
    storage: S,
    access: A,
    clock: C,
    config: EngineConfig,
    batch: Option<Box<dyn BatchQueue>>,
    hook: Box<dyn ResourceHook>,
}

impl<S: Storage, A: AccessControl, C: Clock> OccurrenceSynchronizer<S, A, C> {
    pub fn new(storage: S, access: A, clock: C, config: EngineConfig) -> Self {
        Self {
            storage,
            access,
            clock,
            config,
            batch: None,
            hook: Box::new(|_: usize| {}),
        }
    }

    pub fn with_batch_queue(mut self, queue: impl BatchQueue + 'static) -> Self {
        self.batch = Some(Box::new(queue));
        self
    }

    pub fn with_resource_hook(mut self, hook: impl ResourceHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Delete and regenerate every occurrence of `record`.
    ///
    /// Calling this twice with an unchanged record yields the same final set
    /// of occurrences as calling it once.
    ///
    /// # Errors
    ///
    /// - [`SyncError::PermissionDenied`] / [`SyncError::InvalidConfiguration`]
    ///   before anything is touched.
    /// - [`SyncError::GenerationFailed`] after a rollback; the previous
    ///   occurrence set is left in place.
    pub fn resync(&mut self, actor: &Actor, record: &EventRecord) -> Result<SyncReport> {
        let gate = AccessGate::new(&self.access, self.config.strict);
        if let Some(missing) = gate.generation_denial(actor, record) {
            warn!(source_id = %record.id, actor = %actor, missing, "resync denied");
            return Err(SyncError::PermissionDenied(format!(
                "{actor} lacks '{missing}' for event {}",
                record.id
            )));
        }

        let now = self.clock.now();
        if let Err(err) = extract(record, &self.config, now) {
            warn!(source_id = %record.id, reason = %err, "recurrence rule rejected");
            return Err(err.into());
        }

        let report = self.transaction(&record.id, |sync| sync.regenerate(actor, record, now))?;
        info!(
            source_id = %record.id,
            generated = report.generated,
            removed = report.removed,
            retained = report.retained,
            failures = report.failures,
            deferred = ?report.deferred,
            "resync complete"
        );
        Ok(report)
    }

    /// Delete every generated occurrence of `source`.
    ///
    /// Used when the source is deleted or its repeat flag is switched off.
    pub fn cleanup(&mut self, actor: &Actor, source: &EventRecord) -> Result<SyncReport> {
        let report = self.transaction(&source.id, |sync| {
            let gate = AccessGate::new(&sync.access, sync.config.strict);
            let (removed, retained) = remove_generated(&mut sync.storage, &gate, actor, source)?;
            Ok(SyncReport {
                removed,
                retained: retained.len(),
                ..SyncReport::default()
            })
        })?;
        info!(source_id = %source.id, removed = report.removed, retained = report.retained, "cleanup complete");
        Ok(report)
    }

    /// Materialize a deferred series.
    ///
    /// Occurrences already present for the source are replaced, so a retried
    /// job does not duplicate the series. A job whose `config` no longer
    /// matches the stored source (rule edited or repeat switched off since it
    /// was queued) is dropped without touching storage; the newer resync owns
    /// the occurrence set.
    pub fn materialize_batch(
        &mut self,
        actor: &Actor,
        source_id: &RecordId,
        config: &RecurrenceConfig,
    ) -> Result<SyncReport> {
        let source = self.storage.load(source_id)?;
        let gate = AccessGate::new(&self.access, self.config.strict);
        if let Some(missing) = gate.generation_denial(actor, &source) {
            warn!(source_id = %source_id, actor = %actor, missing, "batch materialization denied");
            return Err(SyncError::PermissionDenied(format!(
                "{actor} lacks '{missing}' for event {source_id}"
            )));
        }

        match extract(&source, &self.config, self.clock.now()) {
            Ok(current) if current == *config => {}
            Ok(_) => {
                warn!(source_id = %source_id, "batch job superseded by a newer rule, dropped");
                return Ok(SyncReport::default());
            }
            Err(err) => {
                warn!(source_id = %source_id, reason = %err, "batch job no longer valid for source, dropped");
                return Ok(SyncReport::default());
            }
        }

        let intervals = sequence(config);
        let report = self.transaction(source_id, |sync| {
            let gate = AccessGate::new(&sync.access, sync.config.strict);
            let (removed, retained) = remove_generated(&mut sync.storage, &gate, actor, &source)?;
            let pending = without_retained(&intervals, &retained);
            let (generated, failures) = sync.materialize(actor, &source, &pending)?;
            Ok(SyncReport {
                generated,
                removed,
                retained: retained.len(),
                failures,
                deferred: None,
            })
        })?;
        info!(source_id = %source_id, generated = report.generated, failures = report.failures, "batch materialized");
        Ok(report)
    }

    /// Steps 4–7, run inside the transaction.
    fn regenerate(
        &mut self,
        actor: &Actor,
        record: &EventRecord,
        now: DateTime<Utc>,
    ) -> Result<SyncReport> {
        let gate = AccessGate::new(&self.access, self.config.strict);
        let (removed, retained) = remove_generated(&mut self.storage, &gate, actor, record)?;

        let config = extract(record, &self.config, now)?;
        let intervals = without_retained(&sequence(&config), &retained);
        let mut report = SyncReport {
            removed,
            retained: retained.len(),
            ..SyncReport::default()
        };

        if intervals.len() > self.config.batch_threshold {
            if let Some(queue) = self.batch.as_mut() {
                queue.enqueue(BatchJob {
                    source_id: record.id.clone(),
                    actor: actor.clone(),
                    config,
                    estimated: intervals.len(),
                })?;
                debug!(source_id = %record.id, estimated = intervals.len(), "series deferred to batch queue");
                report.deferred = Some(intervals.len());
                return Ok(report);
            }
            debug!(source_id = %record.id, estimated = intervals.len(), "no batch queue, materializing inline");
        }

        let (generated, failures) = self.materialize(actor, record, &intervals)?;
        report.generated = generated;
        report.failures = failures;
        Ok(report)
    }

    /// Create one occurrence per interval. Individual failures are logged
    /// and skipped; a series where every create failed is an error.
    fn materialize(
        &mut self,
        actor: &Actor,
        source: &EventRecord,
        intervals: &[OccurrenceInterval],
    ) -> Result<(usize, usize)> {
        let schema = self.storage.schema(&source.record_type);
        let projector = FieldProjector::new(&self.access, &self.config);
        let flush_every = self.config.flush_every.max(1);
        let (mut created, mut failures) = (0usize, 0usize);

        for interval in intervals {
            let draft = projector.draft(actor, source, interval, schema.as_ref());
            match self.storage.create(draft) {
                Ok(id) => {
                    created += 1;
                    debug!(source_id = %source.id, occurrence_id = %id, start = %interval.start, "occurrence created");
                    if created % flush_every == 0 {
                        self.hook.after_flush(created);
                    }
                }
                Err(err) => {
                    failures += 1;
                    warn!(source_id = %source.id, start = %interval.start, error = %err, "occurrence skipped");
                }
            }
        }

        if created > 0 && created % flush_every != 0 {
            self.hook.after_flush(created);
        }
        if created == 0 && failures > 0 {
            return Err(SyncError::GenerationFailed(format!(
                "all {failures} occurrences of event {} failed to materialize",
                source.id
            )));
        }
        Ok((created, failures))
    }

    /// Run `body` between `begin()` and `commit()`, rolling back on error.
    fn transaction<T>(
        &mut self,
        source_id: &RecordId,
        body: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.storage.begin()?;
        let outcome = body(self).and_then(|value| {
            self.storage.commit()?;
            Ok(value)
        });
        outcome.map_err(|err| {
            if let Err(rollback_err) = self.storage.rollback() {
                error!(source_id = %source_id, error = %rollback_err, "rollback failed");
            }
            error!(source_id = %source_id, error = %err, "occurrence sync rolled back");
            match err {
                SyncError::GenerationFailed(_) => err,
                other => SyncError::GenerationFailed(other.to_string()),
            }
        })
    }
}

/// Delete the generated occurrences of `source` the actor may delete.
///
/// Returns the number removed and the spans of the occurrences left in place.
fn remove_generated<S: Storage, A: AccessControl + ?Sized>(
    storage: &mut S,
    gate: &AccessGate<'_, A>,
    actor: &Actor,
    source: &EventRecord,
) -> Result<(usize, Vec<OccurrenceInterval>)> {
    let ids = storage.query(
        &source.record_type,
        &[Condition::ParentEventId(source.id.clone())],
    )?;
    let mut removed = 0usize;
    let mut retained = Vec::new();

    for occurrence in storage.load_many(&ids)? {
        if gate.can_delete(actor, &occurrence) {
            storage.delete(&occurrence.id)?;
            removed += 1;
        } else {
            warn!(
                source_id = %source.id,
                occurrence_id = %occurrence.id,
                actor = %actor,
                "no delete access, occurrence left in place"
            );
            retained.push(OccurrenceInterval {
                start: occurrence.draft.start,
                end: occurrence.draft.end,
            });
        }
    }
    Ok((removed, retained))
}

/// Drop intervals already covered by a retained occurrence.
fn without_retained(
    intervals: &[OccurrenceInterval],
    retained: &[OccurrenceInterval],
) -> Vec<OccurrenceInterval> {
    intervals
        .iter()
        .filter(|interval| !retained.contains(interval))
        .copied()
        .collect()
}
