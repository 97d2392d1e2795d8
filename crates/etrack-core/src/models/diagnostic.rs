//! Diagnostic event models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::sexing::FetusSex;

/// The two diagnostic workflows recorded against a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// Pregnancy diagnosis (DG) after embryo transfer
    PregnancyCheck,
    /// Fetal sexing of a confirmed pregnancy
    Sexing,
}

impl DiagnosticKind {
    /// Stable wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::PregnancyCheck => "pregnancy_check",
            DiagnosticKind::Sexing => "sexing",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pregnancy_check" => Some(DiagnosticKind::PregnancyCheck),
            "sexing" => Some(DiagnosticKind::Sexing),
            _ => None,
        }
    }

    /// Key under which in-progress drafts for this workflow are stored.
    pub fn draft_key(&self) -> &'static str {
        match self {
            DiagnosticKind::PregnancyCheck => "dg_draft",
            DiagnosticKind::Sexing => "sexing_draft",
        }
    }
}

/// Outcome of a diagnostic act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckOutcome {
    /// Pregnancy confirmed
    Pregnant,
    /// No pregnancy / no viable fetus
    Empty,
    /// Pregnant, confirmed on a retest rather than the first check
    Retest,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Pregnant => "PREGNANT",
            CheckOutcome::Empty => "EMPTY",
            CheckOutcome::Retest => "RETEST",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PREGNANT" => Some(CheckOutcome::Pregnant),
            "EMPTY" => Some(CheckOutcome::Empty),
            "RETEST" => Some(CheckOutcome::Retest),
            _ => None,
        }
    }
}

/// The natural key of a diagnostic event.
///
/// At most one event may exist per (recipient, transfer date, kind); the
/// storage layer enforces this with a UNIQUE constraint and the reconciler
/// always looks rows up by this key before deciding insert vs. update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub recipient_id: String,
    pub transfer_date: NaiveDate,
    pub kind: DiagnosticKind,
}

/// The durable record of one diagnostic act.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiagnosticEvent {
    /// Local UUID
    pub id: String,
    /// Recipient this event belongs to
    pub recipient_id: String,
    /// Transfer date of the lot (natural grouping key)
    pub transfer_date: NaiveDate,
    /// Workflow that produced the event
    pub kind: DiagnosticKind,
    /// Date the diagnosis was performed
    pub diagnosis_date: NaiveDate,
    /// Outcome of the act
    pub outcome: CheckOutcome,
    /// Number of viable fetuses (0 when empty)
    pub fetus_count: u32,
    /// Legacy single-fetus sex column, kept for older readers
    pub sex: Option<FetusSex>,
    /// Free-text notes; for sexing events this carries the encoded
    /// per-fetus payload (see [`crate::sexing`])
    pub notes: Option<String>,
    /// Responsible veterinarian (optional column, may be absent on older
    /// backends)
    pub veterinarian: Option<String>,
    /// Responsible technician (optional column, may be absent on older
    /// backends)
    pub technician: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl DiagnosticEvent {
    /// Create a new event with a fresh id and current timestamps.
    pub fn new(
        recipient_id: String,
        transfer_date: NaiveDate,
        kind: DiagnosticKind,
        diagnosis_date: NaiveDate,
        outcome: CheckOutcome,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_id,
            transfer_date,
            kind,
            diagnosis_date,
            outcome,
            fetus_count: 0,
            sex: None,
            notes: None,
            veterinarian: None,
            technician: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The (recipient, transfer date, kind) tuple identifying this event.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            recipient_id: self.recipient_id.clone(),
            transfer_date: self.transfer_date,
            kind: self.kind,
        }
    }
}
