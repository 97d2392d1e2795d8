//! Write-surface abstractions over the database.
//!
//! The reconciler never talks to [`Database`] directly. It goes through the
//! [`EventStore`] and [`StatusStore`] traits, and event writes pass through
//! [`ResilientWriter`], which handles stores created before the attribution
//! columns existed: the first `UnknownColumn` failure flips the writer to the
//! `Minimal` shape for the rest of its lifetime.

use std::cell::Cell;

use chrono::NaiveDate;

use crate::db::{Database, DbResult, StoreError};
use crate::models::{DiagnosticEvent, NaturalKey, ReproductiveStatus};

/// Which columns an event write carries.
///
/// `Full` includes the optional attribution columns, `Minimal` omits them.
/// Callers pick a shape explicitly; there is no hidden column probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteShape {
    Full,
    Minimal,
}

/// What a grouped status update does to the expected due date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueDateAction {
    /// Write this date.
    Set(NaiveDate),
    /// Null the column (animal confirmed empty).
    Clear,
    /// Leave whatever is stored (sexing refines status, not dates).
    Keep,
}

/// One batched status write: every listed recipient receives the identical
/// status and due-date action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdateGroup {
    pub status: ReproductiveStatus,
    pub due_date: DueDateAction,
    pub recipient_ids: Vec<String>,
}

/// Diagnostic event persistence.
pub trait EventStore {
    fn insert_event(&self, event: &DiagnosticEvent, shape: WriteShape) -> DbResult<()>;
    fn update_event(&self, event: &DiagnosticEvent, shape: WriteShape) -> DbResult<bool>;
    fn find_event(&self, key: &NaturalKey) -> DbResult<Option<DiagnosticEvent>>;
}

/// Recipient status persistence.
pub trait StatusStore {
    fn apply_status_update(&self, group: &StatusUpdateGroup) -> DbResult<usize>;
}

impl EventStore for Database {
    fn insert_event(&self, event: &DiagnosticEvent, shape: WriteShape) -> DbResult<()> {
        Database::insert_event(self, event, shape)
    }

    fn update_event(&self, event: &DiagnosticEvent, shape: WriteShape) -> DbResult<bool> {
        Database::update_event(self, event, shape)
    }

    fn find_event(&self, key: &NaturalKey) -> DbResult<Option<DiagnosticEvent>> {
        Database::find_event(self, key)
    }
}

impl StatusStore for Database {
    fn apply_status_update(&self, group: &StatusUpdateGroup) -> DbResult<usize> {
        Database::apply_status_update(self, group)
    }
}

/// Event writer that degrades to the `Minimal` shape when the underlying
/// store predates the attribution columns.
///
/// The flag is sticky: once a `Full` write fails with `UnknownColumn`, every
/// later write goes straight to `Minimal` without re-probing. A failure of
/// the `Minimal` retry itself is surfaced unchanged.
pub struct ResilientWriter<'a, S: EventStore> {
    store: &'a S,
    attribution_supported: Cell<bool>,
}

impl<'a, S: EventStore> ResilientWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            attribution_supported: Cell::new(true),
        }
    }

    /// Whether the store has accepted (or not yet rejected) attribution
    /// columns.
    pub fn attribution_supported(&self) -> bool {
        self.attribution_supported.get()
    }

    pub fn insert(&self, event: &DiagnosticEvent) -> DbResult<()> {
        self.attempt(|shape| self.store.insert_event(event, shape))
    }

    pub fn update(&self, event: &DiagnosticEvent) -> DbResult<bool> {
        self.attempt(|shape| self.store.update_event(event, shape))
    }

    pub fn find(&self, key: &NaturalKey) -> DbResult<Option<DiagnosticEvent>> {
        self.store.find_event(key)
    }

    fn attempt<T>(&self, op: impl Fn(WriteShape) -> DbResult<T>) -> DbResult<T> {
        if !self.attribution_supported.get() {
            return op(WriteShape::Minimal);
        }
        match op(WriteShape::Full) {
            Err(StoreError::UnknownColumn(_)) => {
                self.attribution_supported.set(false);
                op(WriteShape::Minimal)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CheckOutcome, DiagnosticKind};
    use std::cell::RefCell;

    /// Store double that rejects `Full` writes like a pre-drift file would.
    struct DriftedStore {
        reject_full: bool,
        shapes_seen: RefCell<Vec<WriteShape>>,
    }

    impl DriftedStore {
        fn new(reject_full: bool) -> Self {
            Self {
                reject_full,
                shapes_seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl EventStore for DriftedStore {
        fn insert_event(&self, _event: &DiagnosticEvent, shape: WriteShape) -> DbResult<()> {
            self.shapes_seen.borrow_mut().push(shape);
            if shape == WriteShape::Full && self.reject_full {
                return Err(StoreError::UnknownColumn(
                    "table diagnostic_events has no column named veterinarian".into(),
                ));
            }
            Ok(())
        }

        fn update_event(&self, event: &DiagnosticEvent, shape: WriteShape) -> DbResult<bool> {
            self.insert_event(event, shape)?;
            Ok(true)
        }

        fn find_event(&self, _key: &NaturalKey) -> DbResult<Option<DiagnosticEvent>> {
            Ok(None)
        }
    }

    fn event() -> DiagnosticEvent {
        DiagnosticEvent::new(
            "r1".into(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            DiagnosticKind::PregnancyCheck,
            chrono::NaiveDate::from_ymd_opt(2025, 4, 9).unwrap(),
            CheckOutcome::Pregnant,
        )
    }

    #[test]
    fn test_full_write_succeeds_without_fallback() {
        let store = DriftedStore::new(false);
        let writer = ResilientWriter::new(&store);

        writer.insert(&event()).unwrap();
        assert_eq!(*store.shapes_seen.borrow(), vec![WriteShape::Full]);
        assert!(writer.attribution_supported());
    }

    #[test]
    fn test_unknown_column_falls_back_once_then_sticks() {
        let store = DriftedStore::new(true);
        let writer = ResilientWriter::new(&store);

        writer.insert(&event()).unwrap();
        assert!(!writer.attribution_supported());

        writer.update(&event()).unwrap();
        // one Full probe on the first write, Minimal everywhere after
        assert_eq!(
            *store.shapes_seen.borrow(),
            vec![WriteShape::Full, WriteShape::Minimal, WriteShape::Minimal]
        );
    }

    #[test]
    fn test_other_errors_do_not_trigger_fallback() {
        struct BrokenStore;
        impl EventStore for BrokenStore {
            fn insert_event(&self, _: &DiagnosticEvent, _: WriteShape) -> DbResult<()> {
                Err(StoreError::UniqueViolation("diagnostic_events".into()))
            }
            fn update_event(&self, _: &DiagnosticEvent, _: WriteShape) -> DbResult<bool> {
                unreachable!()
            }
            fn find_event(&self, _: &NaturalKey) -> DbResult<Option<DiagnosticEvent>> {
                Ok(None)
            }
        }

        let store = BrokenStore;
        let writer = ResilientWriter::new(&store);
        let err = writer.insert(&event()).unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert!(writer.attribution_supported());
    }
}
