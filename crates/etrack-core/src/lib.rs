//! Etrack Core Library
//!
//! Local-first embryo transfer tracking: batch pregnancy diagnosis and fetal
//! sexing for recipient cattle.
//!
//! # Architecture
//!
//! ```text
//! Embryo Transfer (D0 anchored)
//!         │
//!         ▼
//! Load Lot (farm + transfer date + kind)
//!         │
//! [STAGING: draft_snapshots]  ◄── debounced autosave, 24h TTL
//!         │
//! Technician fills batch form
//!         │
//! ┌───────▼────────────────────────┐
//! │        Batch Reconciler        │
//! │  validate all → plan → apply   │
//! │  event writes, then grouped    │
//! │  status/due-date updates       │
//! └───────┬────────────────────────┘
//!         │
//!         ▼
//! diagnostic_events + recipients   (single SQLite file)
//! ```
//!
//! # Core Principle
//!
//! **Validation is all-or-nothing, application is per-animal.** A batch with
//! any invalid animal writes nothing; once accepted, one failing row never
//! blocks the rest, and status updates always exclude animals whose event
//! write failed.
//!
//! # Modules
//!
//! - [`db`]: SQLite storage layer (recipients, transfers, events, drafts)
//! - [`models`]: Domain types (RecipientAnimal, DiagnosticEvent, etc.)
//! - [`transition`]: Reproductive status state machine
//! - [`sexing`]: Per-fetus payload codec and aggregation
//! - [`gestation`]: Due-date arithmetic anchored on D0
//! - [`draft`]: Debounced crash-recovery drafts
//! - [`store`]: Write-shape abstraction and schema-drift fallback
//! - [`reconciler`]: Batch planning and application

pub mod db;
pub mod draft;
pub mod gestation;
pub mod models;
pub mod reconciler;
pub mod sexing;
pub mod store;
pub mod transition;

// Re-export commonly used types
pub use db::Database;
pub use models::{
    Attribution, CheckOutcome, DiagnosticEvent, DiagnosticKind, DraftEntry, DraftSnapshot,
    EmbryoTransfer, LotAnimal, NaturalKey, RecipientAnimal, ReproductiveStatus,
};
pub use reconciler::{Reconciler, SubmitSummary};
pub use sexing::FetusSex;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use draft::DraftStore;
use reconciler::{PregnancySubmission, SexingSubmission, SubmitError};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum EtrackError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::StoreError> for EtrackError {
    fn from(e: db::StoreError) -> Self {
        match e {
            db::StoreError::NotFound(what) => EtrackError::NotFound(what),
            other => EtrackError::DatabaseError(other.to_string()),
        }
    }
}

impl From<SubmitError> for EtrackError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Rejected(report) => EtrackError::ValidationError(report.to_string()),
            SubmitError::Store(err) => err.into(),
        }
    }
}

impl From<serde_json::Error> for EtrackError {
    fn from(e: serde_json::Error) -> Self {
        EtrackError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for EtrackError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        EtrackError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<EtrackCore>, EtrackError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(EtrackCore::wrap(db)))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<EtrackCore>, EtrackError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(EtrackCore::wrap(db)))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct EtrackCore {
    db: Arc<Mutex<Database>>,
    dg_draft: Mutex<DraftStore>,
    sexing_draft: Mutex<DraftStore>,
}

impl EtrackCore {
    fn wrap(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            dg_draft: Mutex::new(DraftStore::new(DiagnosticKind::PregnancyCheck)),
            sexing_draft: Mutex::new(DraftStore::new(DiagnosticKind::Sexing)),
        }
    }

    fn draft_store(&self, kind: DiagnosticKind) -> &Mutex<DraftStore> {
        match kind {
            DiagnosticKind::PregnancyCheck => &self.dg_draft,
            DiagnosticKind::Sexing => &self.sexing_draft,
        }
    }
}

#[uniffi::export]
impl EtrackCore {
    // =========================================================================
    // Recipient Operations
    // =========================================================================

    /// Register a new recipient.
    pub fn register_recipient(
        &self,
        tag: String,
        name: Option<String>,
        farm_id: String,
    ) -> Result<FfiRecipient, EtrackError> {
        let db = self.db.lock()?;
        let recipient = RecipientAnimal::new(tag, name, farm_id);
        db.insert_recipient(&recipient)?;
        Ok(recipient.into())
    }

    /// Get a recipient by id.
    pub fn get_recipient(&self, id: String) -> Result<Option<FfiRecipient>, EtrackError> {
        let db = self.db.lock()?;
        let recipient = db.get_recipient(&id)?;
        Ok(recipient.map(|r| r.into()))
    }

    /// Set a recipient's reproductive status directly (workflow steps
    /// outside the batch reconciler).
    pub fn set_recipient_status(&self, id: String, status: String) -> Result<(), EtrackError> {
        let db = self.db.lock()?;
        let status = parse_status(&status)?;
        if !db.set_recipient_status(&id, status)? {
            return Err(EtrackError::NotFound(format!("recipient {id}")));
        }
        Ok(())
    }

    // =========================================================================
    // Transfer Operations
    // =========================================================================

    /// Record an embryo transfer. `reference_date` is the FIV lot opening
    /// date (D0) anchoring all gestation math.
    pub fn register_transfer(
        &self,
        recipient_id: String,
        transfer_date: String,
        reference_date: String,
    ) -> Result<FfiEmbryoTransfer, EtrackError> {
        let db = self.db.lock()?;
        let transfer = EmbryoTransfer::new(
            recipient_id,
            parse_date(&transfer_date)?,
            parse_date(&reference_date)?,
        );
        db.insert_transfer(&transfer)?;
        Ok(transfer.into())
    }

    // =========================================================================
    // Lot Operations
    // =========================================================================

    /// Load the eligible animals for one diagnostic step, sorted by tag.
    pub fn load_lot(
        &self,
        farm_id: String,
        transfer_date: String,
        kind: String,
    ) -> Result<Vec<FfiLotAnimal>, EtrackError> {
        let db = self.db.lock()?;
        let lot = db.load_lot(&farm_id, parse_date(&transfer_date)?, parse_kind(&kind)?)?;
        Ok(lot.into_iter().map(|a| a.into()).collect())
    }

    // =========================================================================
    // Batch Submits
    // =========================================================================

    /// Submit a pregnancy-check batch. Rejects the whole batch when any
    /// entry is invalid; on success the workflow draft is discarded.
    pub fn submit_pregnancy_checks(
        &self,
        farm_id: String,
        transfer_date: String,
        entries: Vec<FfiPregnancyEntry>,
        attribution: FfiAttribution,
    ) -> Result<FfiSubmitSummary, EtrackError> {
        let db = self.db.lock()?;
        let date = parse_date(&transfer_date)?;
        let lot = db.load_lot(&farm_id, date, DiagnosticKind::PregnancyCheck)?;

        let mut submissions = BTreeMap::new();
        for entry in entries {
            submissions.insert(
                entry.recipient_id.clone(),
                PregnancySubmission {
                    outcome: entry.outcome.as_deref().map(parse_outcome).transpose()?,
                    fetus_count: entry.fetus_count,
                    diagnosis_date: entry.diagnosis_date.as_deref().map(parse_date).transpose()?,
                    notes: entry.notes,
                },
            );
        }

        let summary = Reconciler::new(&*db).submit_pregnancy_checks(
            &lot,
            &submissions,
            &attribution.into(),
        )?;
        if summary.failed_animal_ids.is_empty() {
            self.dg_draft.lock()?.clear(&db)?;
        }
        Ok(summary.into())
    }

    /// Submit a sexing batch. Same contract as
    /// [`submit_pregnancy_checks`](Self::submit_pregnancy_checks).
    pub fn submit_sexings(
        &self,
        farm_id: String,
        transfer_date: String,
        entries: Vec<FfiSexingEntry>,
        attribution: FfiAttribution,
    ) -> Result<FfiSubmitSummary, EtrackError> {
        let db = self.db.lock()?;
        let date = parse_date(&transfer_date)?;
        let lot = db.load_lot(&farm_id, date, DiagnosticKind::Sexing)?;

        let mut submissions = BTreeMap::new();
        for entry in entries {
            submissions.insert(
                entry.recipient_id.clone(),
                SexingSubmission {
                    slots: parse_slots(&entry.sexes)?,
                    diagnosis_date: entry.diagnosis_date.as_deref().map(parse_date).transpose()?,
                    notes: entry.notes,
                },
            );
        }

        let summary =
            Reconciler::new(&*db).submit_sexings(&lot, &submissions, &attribution.into())?;
        if summary.failed_animal_ids.is_empty() {
            self.sexing_draft.lock()?.clear(&db)?;
        }
        Ok(summary.into())
    }

    // =========================================================================
    // Draft Operations
    // =========================================================================

    /// Autosave the in-progress form. Writes are debounced; returns whether
    /// a physical write happened.
    pub fn save_draft(&self, snapshot: FfiDraftSnapshot) -> Result<bool, EtrackError> {
        let db = self.db.lock()?;
        let snapshot: DraftSnapshot = snapshot.try_into()?;
        let mut store = self.draft_store(snapshot.kind).lock()?;
        Ok(store.save(&db, &snapshot)?)
    }

    /// Force the pending draft to disk (app going to background).
    pub fn flush_draft(&self, kind: String) -> Result<bool, EtrackError> {
        let db = self.db.lock()?;
        let mut store = self.draft_store(parse_kind(&kind)?).lock()?;
        Ok(store.flush(&db)?)
    }

    /// Restore the stored draft for a workflow, if it is intact and fresh.
    pub fn load_draft(&self, kind: String) -> Result<Option<FfiDraftSnapshot>, EtrackError> {
        let db = self.db.lock()?;
        let store = self.draft_store(parse_kind(&kind)?).lock()?;
        Ok(store.load(&db)?.map(|s| s.into()))
    }

    /// Throw the draft away (user dismissed the restore prompt).
    pub fn discard_draft(&self, kind: String) -> Result<(), EtrackError> {
        let db = self.db.lock()?;
        let mut store = self.draft_store(parse_kind(&kind)?).lock()?;
        store.clear(&db)?;
        Ok(())
    }
}

// =========================================================================
// FFI Parsing Helpers
// =========================================================================

fn parse_date(s: &str) -> Result<NaiveDate, EtrackError> {
    s.parse::<NaiveDate>()
        .map_err(|_| EtrackError::InvalidInput(format!("date: {s}")))
}

fn parse_kind(s: &str) -> Result<DiagnosticKind, EtrackError> {
    DiagnosticKind::parse(s)
        .ok_or_else(|| EtrackError::InvalidInput(format!("diagnostic kind: {s}")))
}

fn parse_status(s: &str) -> Result<ReproductiveStatus, EtrackError> {
    ReproductiveStatus::parse(s)
        .ok_or_else(|| EtrackError::InvalidInput(format!("reproductive status: {s}")))
}

fn parse_outcome(s: &str) -> Result<CheckOutcome, EtrackError> {
    CheckOutcome::parse(s).ok_or_else(|| EtrackError::InvalidInput(format!("outcome: {s}")))
}

/// Per-fetus slot tokens: "" means not yet sexed.
fn parse_slots(sexes: &[String]) -> Result<Vec<Option<FetusSex>>, EtrackError> {
    sexes
        .iter()
        .map(|s| {
            if s.is_empty() {
                Ok(None)
            } else {
                FetusSex::parse(s)
                    .map(Some)
                    .ok_or_else(|| EtrackError::InvalidInput(format!("fetus sex: {s}")))
            }
        })
        .collect()
}

fn slot_strings(slots: &[Option<FetusSex>]) -> Vec<String> {
    slots
        .iter()
        .map(|s| s.map(|v| v.as_str().to_string()).unwrap_or_default())
        .collect()
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe recipient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecipient {
    pub id: String,
    pub tag: String,
    pub name: Option<String>,
    pub farm_id: String,
    pub status: String,
    pub expected_due_date: Option<String>,
}

impl From<RecipientAnimal> for FfiRecipient {
    fn from(r: RecipientAnimal) -> Self {
        Self {
            id: r.id,
            tag: r.tag,
            name: r.name,
            farm_id: r.farm_id,
            status: r.status.as_str().to_string(),
            expected_due_date: r.expected_due_date.map(|d| d.to_string()),
        }
    }
}

/// FFI-safe embryo transfer.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEmbryoTransfer {
    pub id: String,
    pub recipient_id: String,
    pub transfer_date: String,
    pub reference_date: String,
}

impl From<EmbryoTransfer> for FfiEmbryoTransfer {
    fn from(t: EmbryoTransfer) -> Self {
        Self {
            id: t.id,
            recipient_id: t.recipient_id,
            transfer_date: t.transfer_date.to_string(),
            reference_date: t.reference_date.to_string(),
        }
    }
}

/// FFI-safe diagnostic event.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDiagnosticEvent {
    pub id: String,
    pub recipient_id: String,
    pub transfer_date: String,
    pub kind: String,
    pub diagnosis_date: String,
    pub outcome: String,
    pub fetus_count: u32,
    /// Per-fetus slot tokens decoded from the notes payload ("" = blank)
    pub sexes: Vec<String>,
    /// Free-text note with the encoded payload stripped
    pub notes: String,
    pub veterinarian: Option<String>,
    pub technician: Option<String>,
}

impl From<DiagnosticEvent> for FfiDiagnosticEvent {
    fn from(e: DiagnosticEvent) -> Self {
        let (slots, notes) = sexing::decode_with_legacy(
            e.notes.as_deref(),
            e.sex,
            e.fetus_count.max(1) as usize,
        );
        Self {
            id: e.id,
            recipient_id: e.recipient_id,
            transfer_date: e.transfer_date.to_string(),
            kind: e.kind.as_str().to_string(),
            diagnosis_date: e.diagnosis_date.to_string(),
            outcome: e.outcome.as_str().to_string(),
            fetus_count: e.fetus_count,
            sexes: slot_strings(&slots),
            notes,
            veterinarian: e.veterinarian,
            technician: e.technician,
        }
    }
}

/// FFI-safe lot animal.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLotAnimal {
    pub recipient_id: String,
    pub tag: String,
    pub status: String,
    pub transfer_date: String,
    pub reference_date: String,
    pub fetus_count: u32,
    pub existing_event: Option<FfiDiagnosticEvent>,
}

impl From<LotAnimal> for FfiLotAnimal {
    fn from(a: LotAnimal) -> Self {
        Self {
            recipient_id: a.recipient_id,
            tag: a.tag,
            status: a.status.as_str().to_string(),
            transfer_date: a.transfer_date.to_string(),
            reference_date: a.reference_date.to_string(),
            fetus_count: a.fetus_count,
            existing_event: a.existing_event.map(|e| e.into()),
        }
    }
}

/// FFI-safe attribution sub-form.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAttribution {
    pub veterinarian: String,
    pub technician: String,
}

impl From<FfiAttribution> for Attribution {
    fn from(a: FfiAttribution) -> Self {
        Self {
            veterinarian: a.veterinarian,
            technician: a.technician,
        }
    }
}

impl From<Attribution> for FfiAttribution {
    fn from(a: Attribution) -> Self {
        Self {
            veterinarian: a.veterinarian,
            technician: a.technician,
        }
    }
}

/// One pregnancy-check form row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPregnancyEntry {
    pub recipient_id: String,
    pub outcome: Option<String>,
    pub fetus_count: Option<u32>,
    pub diagnosis_date: Option<String>,
    pub notes: String,
}

/// One sexing form row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSexingEntry {
    pub recipient_id: String,
    /// Per-fetus tokens ("FEMALE", "MALE", "UNSEXED", "" for blank)
    pub sexes: Vec<String>,
    pub diagnosis_date: Option<String>,
    pub notes: String,
}

/// FFI-safe batch outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSubmitSummary {
    pub resolved_count: u32,
    pub remaining_count: u32,
    pub failed_animal_ids: Vec<String>,
    pub lot_complete: bool,
}

impl From<SubmitSummary> for FfiSubmitSummary {
    fn from(s: SubmitSummary) -> Self {
        Self {
            resolved_count: s.resolved_count,
            remaining_count: s.remaining_count,
            failed_animal_ids: s.failed_animal_ids,
            lot_complete: s.lot_complete,
        }
    }
}

/// One draft form row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDraftEntry {
    pub recipient_id: String,
    pub outcome: Option<String>,
    pub sexes: Vec<String>,
    pub fetus_count: Option<u32>,
    pub diagnosis_date: Option<String>,
    pub notes: String,
}

/// FFI-safe draft snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDraftSnapshot {
    pub farm_id: String,
    pub transfer_date: String,
    pub kind: String,
    pub entries: Vec<FfiDraftEntry>,
    pub attribution: FfiAttribution,
    pub saved_at: String,
}

impl TryFrom<FfiDraftSnapshot> for DraftSnapshot {
    type Error = EtrackError;

    fn try_from(s: FfiDraftSnapshot) -> Result<Self, Self::Error> {
        let mut snapshot = DraftSnapshot::new(
            s.farm_id,
            parse_date(&s.transfer_date)?,
            parse_kind(&s.kind)?,
        );
        snapshot.attribution = s.attribution.into();
        for entry in s.entries {
            snapshot.entries.insert(
                entry.recipient_id,
                DraftEntry {
                    outcome: entry.outcome.as_deref().map(parse_outcome).transpose()?,
                    sexes: parse_slots(&entry.sexes)?,
                    fetus_count: entry.fetus_count,
                    diagnosis_date: entry.diagnosis_date.as_deref().map(parse_date).transpose()?,
                    notes: entry.notes,
                },
            );
        }
        Ok(snapshot)
    }
}

impl From<DraftSnapshot> for FfiDraftSnapshot {
    fn from(s: DraftSnapshot) -> Self {
        Self {
            farm_id: s.farm_id,
            transfer_date: s.transfer_date.to_string(),
            kind: s.kind.as_str().to_string(),
            entries: s
                .entries
                .into_iter()
                .map(|(recipient_id, e)| FfiDraftEntry {
                    recipient_id,
                    outcome: e.outcome.map(|o| o.as_str().to_string()),
                    sexes: slot_strings(&e.sexes),
                    fetus_count: e.fetus_count,
                    diagnosis_date: e.diagnosis_date.map(|d| d.to_string()),
                    notes: e.notes,
                })
                .collect(),
            attribution: s.attribution.into(),
            saved_at: s.saved_at,
        }
    }
}
