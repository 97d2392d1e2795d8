//! Recipient animal models.

use serde::{Deserialize, Serialize};

/// Reproductive status of a recipient animal.
///
/// Exactly one status holds at any time. The status is mutated only by the
/// reconciliation engine as a consequence of a recorded diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReproductiveStatus {
    /// Open, no active protocol
    Empty,
    /// Synchronization protocol started (step 1 done)
    SyncStarted,
    /// Synchronized, eligible for embryo transfer
    Synchronized,
    /// Embryo transferred, awaiting pregnancy diagnosis
    Served,
    /// Diagnosed pregnant on the first check
    Pregnant,
    /// Diagnosed pregnant on a retest
    PregnantRetest,
    /// Sexed: female fetus(es) only
    PregnantFemale,
    /// Sexed: male fetus(es) only
    PregnantMale,
    /// Sexed: no fetus could be sexed
    PregnantUnsexed,
    /// Sexed: both female and male fetuses
    PregnantMixedSex,
}

impl ReproductiveStatus {
    /// Stable wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReproductiveStatus::Empty => "EMPTY",
            ReproductiveStatus::SyncStarted => "SYNC_STARTED",
            ReproductiveStatus::Synchronized => "SYNCHRONIZED",
            ReproductiveStatus::Served => "SERVED",
            ReproductiveStatus::Pregnant => "PREGNANT",
            ReproductiveStatus::PregnantRetest => "PREGNANT_RETEST",
            ReproductiveStatus::PregnantFemale => "PREGNANT_FEMALE",
            ReproductiveStatus::PregnantMale => "PREGNANT_MALE",
            ReproductiveStatus::PregnantUnsexed => "PREGNANT_UNSEXED",
            ReproductiveStatus::PregnantMixedSex => "PREGNANT_MIXED_SEX",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EMPTY" => Some(ReproductiveStatus::Empty),
            "SYNC_STARTED" => Some(ReproductiveStatus::SyncStarted),
            "SYNCHRONIZED" => Some(ReproductiveStatus::Synchronized),
            "SERVED" => Some(ReproductiveStatus::Served),
            "PREGNANT" => Some(ReproductiveStatus::Pregnant),
            "PREGNANT_RETEST" => Some(ReproductiveStatus::PregnantRetest),
            "PREGNANT_FEMALE" => Some(ReproductiveStatus::PregnantFemale),
            "PREGNANT_MALE" => Some(ReproductiveStatus::PregnantMale),
            "PREGNANT_UNSEXED" => Some(ReproductiveStatus::PregnantUnsexed),
            "PREGNANT_MIXED_SEX" => Some(ReproductiveStatus::PregnantMixedSex),
            _ => None,
        }
    }

    /// True for every status that carries a confirmed pregnancy.
    pub fn is_pregnant(&self) -> bool {
        matches!(
            self,
            ReproductiveStatus::Pregnant
                | ReproductiveStatus::PregnantRetest
                | ReproductiveStatus::PregnantFemale
                | ReproductiveStatus::PregnantMale
                | ReproductiveStatus::PregnantUnsexed
                | ReproductiveStatus::PregnantMixedSex
        )
    }
}

impl std::fmt::Display for ReproductiveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recipient animal (the female receiving a transferred embryo).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipientAnimal {
    /// Local UUID
    pub id: String,
    /// External tag / identification string (ear tag)
    pub tag: String,
    /// Optional display name
    pub name: Option<String>,
    /// Owning farm
    pub farm_id: String,
    /// Current reproductive status
    pub status: ReproductiveStatus,
    /// Expected due date, set while pregnant (ISO date)
    pub expected_due_date: Option<chrono::NaiveDate>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl RecipientAnimal {
    /// Create a new recipient with status `EMPTY`.
    pub fn new(tag: String, name: Option<String>, farm_id: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tag,
            name,
            farm_id,
            status: ReproductiveStatus::Empty,
            expected_due_date: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
