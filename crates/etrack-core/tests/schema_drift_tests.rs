//! Schema drift: a database file created by an older release lacks the
//! attribution columns on `diagnostic_events`. Writes must degrade to the
//! minimal shape and the batch must still land.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use etrack_core::db::Database;
use etrack_core::models::{
    Attribution, CheckOutcome, DiagnosticKind, EmbryoTransfer, NaturalKey, RecipientAnimal,
    ReproductiveStatus,
};
use etrack_core::reconciler::{PregnancySubmission, Reconciler};
use etrack_core::store::{ResilientWriter, WriteShape};
use tempfile::TempDir;

/// The `diagnostic_events` table as shipped before attribution was recorded.
const LEGACY_EVENTS_TABLE: &str = r#"
CREATE TABLE diagnostic_events (
    id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL,
    transfer_date TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('pregnancy_check', 'sexing')),
    diagnosis_date TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK (outcome IN ('PREGNANT', 'EMPTY', 'RETEST')),
    fetus_count INTEGER NOT NULL DEFAULT 0,
    sex TEXT,
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (recipient_id, transfer_date, kind)
);
"#;

fn open_legacy_store(dir: &TempDir) -> Database {
    let path = dir.path().join("etrack.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(LEGACY_EVENTS_TABLE).unwrap();
    }
    // CREATE TABLE IF NOT EXISTS leaves the legacy table untouched
    Database::open(&path).unwrap()
}

fn te() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn add_served(db: &Database, tag: &str) -> String {
    let mut r = RecipientAnimal::new(tag.into(), None, "farm-1".into());
    r.status = ReproductiveStatus::Served;
    db.insert_recipient(&r).unwrap();
    db.insert_transfer(&EmbryoTransfer::new(
        r.id.clone(),
        te(),
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
    ))
    .unwrap();
    r.id
}

fn vet() -> Attribution {
    Attribution {
        veterinarian: "Dr. Ana".into(),
        technician: String::new(),
    }
}

#[test]
fn test_full_write_degrades_to_minimal_on_legacy_store() {
    let dir = TempDir::new().unwrap();
    let db = open_legacy_store(&dir);
    let id = add_served(&db, "A-1");

    let mut event = etrack_core::DiagnosticEvent::new(
        id.clone(),
        te(),
        DiagnosticKind::PregnancyCheck,
        NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(),
        CheckOutcome::Pregnant,
    );
    event.fetus_count = 1;
    event.veterinarian = Some("Dr. Ana".into());

    // the direct full-shape write fails as a legacy store would make it
    let err = db.insert_event(&event, WriteShape::Full).unwrap_err();
    assert!(matches!(
        err,
        etrack_core::db::StoreError::UnknownColumn(_)
    ));

    // the resilient writer retries with the minimal shape
    let writer = ResilientWriter::new(&db);
    writer.insert(&event).unwrap();
    assert!(!writer.attribution_supported());

    let stored = db
        .find_event(&NaturalKey {
            recipient_id: id,
            transfer_date: te(),
            kind: DiagnosticKind::PregnancyCheck,
        })
        .unwrap()
        .unwrap();
    assert_eq!(stored.outcome, CheckOutcome::Pregnant);
    assert!(stored.veterinarian.is_none());
}

#[test]
fn test_batch_submit_succeeds_end_to_end_on_legacy_store() {
    let dir = TempDir::new().unwrap();
    let db = open_legacy_store(&dir);
    let a = add_served(&db, "A-1");
    let b = add_served(&db, "B-2");

    let lot = db
        .load_lot("farm-1", te(), DiagnosticKind::PregnancyCheck)
        .unwrap();
    assert_eq!(lot.len(), 2);

    let sub = |outcome| PregnancySubmission {
        outcome: Some(outcome),
        diagnosis_date: NaiveDate::from_ymd_opt(2025, 4, 9),
        ..Default::default()
    };
    let subs = BTreeMap::from([
        (a.clone(), sub(CheckOutcome::Pregnant)),
        (b.clone(), sub(CheckOutcome::Empty)),
    ]);

    let summary = Reconciler::new(&db)
        .submit_pregnancy_checks(&lot, &subs, &vet())
        .unwrap();
    assert_eq!(summary.resolved_count, 2);
    assert!(summary.lot_complete);
    assert!(summary.failed_animal_ids.is_empty());

    // attribution was dropped, everything else landed
    let event = db
        .find_event(&NaturalKey {
            recipient_id: a.clone(),
            transfer_date: te(),
            kind: DiagnosticKind::PregnancyCheck,
        })
        .unwrap()
        .unwrap();
    assert_eq!(event.outcome, CheckOutcome::Pregnant);
    assert!(event.veterinarian.is_none());
    assert!(event.technician.is_none());

    let r = db.get_recipient(&a).unwrap().unwrap();
    assert_eq!(r.status, ReproductiveStatus::Pregnant);
    let r = db.get_recipient(&b).unwrap().unwrap();
    assert_eq!(r.status, ReproductiveStatus::Empty);
}

#[test]
fn test_current_store_keeps_attribution() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(dir.path().join("fresh.db")).unwrap();
    let id = add_served(&db, "A-1");

    let lot = db
        .load_lot("farm-1", te(), DiagnosticKind::PregnancyCheck)
        .unwrap();
    let subs = BTreeMap::from([(
        id.clone(),
        PregnancySubmission {
            outcome: Some(CheckOutcome::Pregnant),
            diagnosis_date: NaiveDate::from_ymd_opt(2025, 4, 9),
            ..Default::default()
        },
    )]);
    Reconciler::new(&db)
        .submit_pregnancy_checks(&lot, &subs, &vet())
        .unwrap();

    let event = db
        .find_event(&NaturalKey {
            recipient_id: id,
            transfer_date: te(),
            kind: DiagnosticKind::PregnancyCheck,
        })
        .unwrap()
        .unwrap();
    assert_eq!(event.veterinarian.as_deref(), Some("Dr. Ana"));
}
