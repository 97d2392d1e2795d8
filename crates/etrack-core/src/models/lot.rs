//! Lot models: the non-persisted grouping of recipients sharing a farm and
//! a transfer date for one diagnostic step.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{DiagnosticEvent, ReproductiveStatus};

/// A recorded embryo transfer.
///
/// `reference_date` is the FIV lot opening date (D0), the anchor for all
/// gestation arithmetic; it usually precedes `transfer_date` by a week.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbryoTransfer {
    pub id: String,
    pub recipient_id: String,
    pub transfer_date: NaiveDate,
    pub reference_date: NaiveDate,
    pub created_at: String,
}

impl EmbryoTransfer {
    pub fn new(recipient_id: String, transfer_date: NaiveDate, reference_date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_id,
            transfer_date,
            reference_date,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One eligible animal of a loaded lot, as handed to the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct LotAnimal {
    pub recipient_id: String,
    pub tag: String,
    /// Current status at load time; the transition validator gates on it
    pub status: ReproductiveStatus,
    pub transfer_date: NaiveDate,
    /// Gestation reference date (D0) of the transferred embryo's FIV lot
    pub reference_date: NaiveDate,
    /// Fetus count from the prior pregnancy check (1 for DG lots)
    pub fetus_count: u32,
    /// Pre-existing event for the active kind and transfer date, if any
    pub existing_event: Option<DiagnosticEvent>,
}

/// Shared attribution sub-form for a whole batch submit.
///
/// The veterinarian is mandatory; the technician is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attribution {
    pub veterinarian: String,
    pub technician: String,
}

impl Attribution {
    /// True when the mandatory veterinarian field is filled in.
    pub fn has_veterinarian(&self) -> bool {
        !self.veterinarian.trim().is_empty()
    }

    /// Trimmed optional values as persisted on the event row.
    pub fn normalized(&self) -> (Option<String>, Option<String>) {
        let trim = |s: &str| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        };
        (trim(&self.veterinarian), trim(&self.technician))
    }
}
