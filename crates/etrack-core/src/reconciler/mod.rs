//! Batch reconciliation: apply a validated plan against the store.
//!
//! The two phases are deliberately split. [`plan`] is pure and all-or-nothing
//! at validation time; this module applies an accepted plan with per-animal
//! failure tracking, so one bad row never takes down the rest of the batch.
//! Status groups run after the event writes and skip every animal whose
//! event write failed, keeping status and event rows consistent.

mod plan;

pub use plan::{
    BatchPlan, PlannedWrite, PregnancySubmission, SexingSubmission, ValidationFailure,
    ValidationReport,
};

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::db::StoreError;
use crate::models::{Attribution, LotAnimal};
use crate::store::{EventStore, ResilientWriter, StatusStore};

/// Why a batch submit failed as a whole.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Validation rejected the batch; nothing was written.
    #[error("batch rejected: {0}")]
    Rejected(#[from] ValidationReport),

    /// The store failed before any per-animal work could start.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of an applied batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSummary {
    /// Animals whose event and status both landed
    pub resolved_count: u32,
    /// Eligible animals the submission did not cover
    pub remaining_count: u32,
    /// Animals whose write failed after validation passed
    pub failed_animal_ids: Vec<String>,
    /// True when every eligible animal is resolved and nothing failed
    pub lot_complete: bool,
}

/// Applies diagnostic batches against a single store.
pub struct Reconciler<'a, S: EventStore + StatusStore> {
    store: &'a S,
    writer: ResilientWriter<'a, S>,
}

impl<'a, S: EventStore + StatusStore> Reconciler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            writer: ResilientWriter::new(store),
        }
    }

    /// Validate and apply a pregnancy-check batch.
    pub fn submit_pregnancy_checks(
        &self,
        lot: &[LotAnimal],
        submissions: &BTreeMap<String, PregnancySubmission>,
        attribution: &Attribution,
    ) -> Result<SubmitSummary, SubmitError> {
        let batch = plan::plan_pregnancy_checks(lot, submissions, attribution)?;
        Ok(self.apply(lot.len(), batch))
    }

    /// Validate and apply a sexing batch.
    pub fn submit_sexings(
        &self,
        lot: &[LotAnimal],
        submissions: &BTreeMap<String, SexingSubmission>,
        attribution: &Attribution,
    ) -> Result<SubmitSummary, SubmitError> {
        let batch = plan::plan_sexings(lot, submissions, attribution)?;
        Ok(self.apply(lot.len(), batch))
    }

    fn apply(&self, lot_size: usize, batch: BatchPlan) -> SubmitSummary {
        let planned = batch.writes.len();
        let mut failed: BTreeSet<String> = BTreeSet::new();

        for write in &batch.writes {
            if let Err(_e) = self.write_event(write) {
                failed.insert(write.event.recipient_id.clone());
            }
        }

        for group in &batch.groups {
            let ids: Vec<String> = group
                .recipient_ids
                .iter()
                .filter(|id| !failed.contains(*id))
                .cloned()
                .collect();
            if ids.is_empty() {
                continue;
            }
            let mut filtered = group.clone();
            filtered.recipient_ids = ids;
            if self.store.apply_status_update(&filtered).is_err() {
                failed.extend(filtered.recipient_ids);
            }
        }

        let resolved_count = (planned - failed.len()) as u32;
        let remaining_count = (lot_size - planned) as u32;
        SubmitSummary {
            resolved_count,
            remaining_count,
            lot_complete: failed.is_empty() && remaining_count == 0,
            failed_animal_ids: failed.into_iter().collect(),
        }
    }

    /// Insert, or update when the plan resolved an existing row. A unique
    /// violation on insert means another submit won the natural-key race;
    /// the loser re-reads the row and updates it in place.
    fn write_event(&self, write: &PlannedWrite) -> Result<(), StoreError> {
        if write.existing {
            self.writer.update(&write.event)?;
            return Ok(());
        }
        match self.writer.insert(&write.event) {
            Err(StoreError::UniqueViolation(_)) => {
                let key = write.event.natural_key();
                let stored = self
                    .writer
                    .find(&key)?
                    .ok_or_else(|| StoreError::NotFound(format!("event for {}", key.recipient_id)))?;
                let mut event = write.event.clone();
                event.id = stored.id;
                self.writer.update(&event)?;
                Ok(())
            }
            other => other,
        }
    }
}
