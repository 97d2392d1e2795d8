//! Draft snapshot models for crash-recovery of in-progress sessions.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Attribution, CheckOutcome, DiagnosticKind};
use crate::sexing::FetusSex;

/// Per-animal form state captured in a draft.
///
/// The same shape serves both workflows: pregnancy checks fill `outcome` and
/// `fetus_count`, sexing fills `sexes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DraftEntry {
    pub outcome: Option<CheckOutcome>,
    pub sexes: Vec<Option<FetusSex>>,
    pub fetus_count: Option<u32>,
    pub diagnosis_date: Option<NaiveDate>,
    pub notes: String,
}

impl DraftEntry {
    /// True when the user has actually entered something. A prefilled
    /// diagnosis date alone does not count.
    pub fn has_content(&self) -> bool {
        self.outcome.is_some()
            || self.sexes.iter().any(Option::is_some)
            || self.fetus_count.is_some()
            || !self.notes.trim().is_empty()
    }
}

/// Ephemeral snapshot of an in-progress batch: lot identity plus per-animal
/// form state and the shared attribution sub-form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftSnapshot {
    pub farm_id: String,
    pub transfer_date: NaiveDate,
    pub kind: DiagnosticKind,
    /// Keyed by recipient id
    pub entries: BTreeMap<String, DraftEntry>,
    pub attribution: Attribution,
    /// RFC 3339, set by the store on every flush
    pub saved_at: String,
}

impl DraftSnapshot {
    pub fn new(farm_id: String, transfer_date: NaiveDate, kind: DiagnosticKind) -> Self {
        Self {
            farm_id,
            transfer_date,
            kind,
            entries: BTreeMap::new(),
            attribution: Attribution::default(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// An all-blank draft is never persisted.
    pub fn has_content(&self) -> bool {
        self.entries.values().any(DraftEntry::has_content)
    }
}
