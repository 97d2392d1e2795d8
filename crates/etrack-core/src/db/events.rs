//! Diagnostic event database operations.
//!
//! Inserts and updates come in two shapes: `Full` carries the optional
//! attribution columns, `Minimal` omits them for stores created before those
//! columns existed. Shape selection lives in [`crate::store`].

use rusqlite::{params, OptionalExtension};

use super::transfers::parse_date;
use super::{Database, DbResult, StoreError};
use crate::models::{CheckOutcome, DiagnosticEvent, DiagnosticKind, NaturalKey};
use crate::sexing::FetusSex;
use crate::store::WriteShape;

impl Database {
    /// Insert a new diagnostic event. A natural-key collision surfaces as
    /// [`StoreError::UniqueViolation`].
    pub fn insert_event(&self, event: &DiagnosticEvent, shape: WriteShape) -> DbResult<()> {
        match shape {
            WriteShape::Full => {
                self.conn.execute(
                    r#"
                    INSERT INTO diagnostic_events (
                        id, recipient_id, transfer_date, kind, diagnosis_date,
                        outcome, fetus_count, sex, notes, veterinarian, technician,
                        created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                    "#,
                    params![
                        event.id,
                        event.recipient_id,
                        event.transfer_date.to_string(),
                        event.kind.as_str(),
                        event.diagnosis_date.to_string(),
                        event.outcome.as_str(),
                        event.fetus_count,
                        event.sex.map(|s| s.as_str()),
                        event.notes,
                        event.veterinarian,
                        event.technician,
                        event.created_at,
                        event.updated_at,
                    ],
                )?;
            }
            WriteShape::Minimal => {
                self.conn.execute(
                    r#"
                    INSERT INTO diagnostic_events (
                        id, recipient_id, transfer_date, kind, diagnosis_date,
                        outcome, fetus_count, sex, notes, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        event.id,
                        event.recipient_id,
                        event.transfer_date.to_string(),
                        event.kind.as_str(),
                        event.diagnosis_date.to_string(),
                        event.outcome.as_str(),
                        event.fetus_count,
                        event.sex.map(|s| s.as_str()),
                        event.notes,
                        event.created_at,
                        event.updated_at,
                    ],
                )?;
            }
        }
        Ok(())
    }

    /// Update an existing event by id. The natural-key columns are never
    /// rewritten.
    pub fn update_event(&self, event: &DiagnosticEvent, shape: WriteShape) -> DbResult<bool> {
        let rows = match shape {
            WriteShape::Full => self.conn.execute(
                r#"
                UPDATE diagnostic_events SET
                    diagnosis_date = ?2,
                    outcome = ?3,
                    fetus_count = ?4,
                    sex = ?5,
                    notes = ?6,
                    veterinarian = ?7,
                    technician = ?8,
                    updated_at = datetime('now')
                WHERE id = ?1
                "#,
                params![
                    event.id,
                    event.diagnosis_date.to_string(),
                    event.outcome.as_str(),
                    event.fetus_count,
                    event.sex.map(|s| s.as_str()),
                    event.notes,
                    event.veterinarian,
                    event.technician,
                ],
            )?,
            WriteShape::Minimal => self.conn.execute(
                r#"
                UPDATE diagnostic_events SET
                    diagnosis_date = ?2,
                    outcome = ?3,
                    fetus_count = ?4,
                    sex = ?5,
                    notes = ?6,
                    updated_at = datetime('now')
                WHERE id = ?1
                "#,
                params![
                    event.id,
                    event.diagnosis_date.to_string(),
                    event.outcome.as_str(),
                    event.fetus_count,
                    event.sex.map(|s| s.as_str()),
                    event.notes,
                ],
            )?,
        };
        Ok(rows > 0)
    }

    /// Look an event up by its natural key.
    pub fn find_event(&self, key: &NaturalKey) -> DbResult<Option<DiagnosticEvent>> {
        let date = key.transfer_date.to_string();
        self.query_event(
            "WHERE recipient_id = ?1 AND transfer_date = ?2 AND kind = ?3",
            params![key.recipient_id, date, key.kind.as_str()],
        )
    }

    /// Get an event by id.
    pub fn get_event(&self, id: &str) -> DbResult<Option<DiagnosticEvent>> {
        self.query_event("WHERE id = ?1", params![id])
    }

    /// Reads degrade like writes do: a store without the attribution columns
    /// answers the same query with NULL in their place.
    fn query_event(
        &self,
        where_clause: &str,
        params: &[&dyn rusqlite::types::ToSql],
    ) -> DbResult<Option<DiagnosticEvent>> {
        match self.query_event_with("veterinarian, technician", where_clause, params) {
            Err(StoreError::UnknownColumn(_)) => {
                self.query_event_with("NULL, NULL", where_clause, params)
            }
            other => other,
        }
    }

    fn query_event_with(
        &self,
        attribution_cols: &str,
        where_clause: &str,
        params: &[&dyn rusqlite::types::ToSql],
    ) -> DbResult<Option<DiagnosticEvent>> {
        let sql = format!(
            r#"
            SELECT id, recipient_id, transfer_date, kind, diagnosis_date,
                   outcome, fetus_count, sex, notes, {attribution_cols},
                   created_at, updated_at
            FROM diagnostic_events
            {where_clause}
            "#
        );
        self.conn
            .query_row(&sql, params, |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    recipient_id: row.get(1)?,
                    transfer_date: row.get(2)?,
                    kind: row.get(3)?,
                    diagnosis_date: row.get(4)?,
                    outcome: row.get(5)?,
                    fetus_count: row.get(6)?,
                    sex: row.get(7)?,
                    notes: row.get(8)?,
                    veterinarian: row.get(9)?,
                    technician: row.get(10)?,
                    created_at: row.get(11)?,
                    updated_at: row.get(12)?,
                })
            })
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }
}

/// Intermediate row struct for database mapping.
struct EventRow {
    id: String,
    recipient_id: String,
    transfer_date: String,
    kind: String,
    diagnosis_date: String,
    outcome: String,
    fetus_count: u32,
    sex: Option<String>,
    notes: Option<String>,
    veterinarian: Option<String>,
    technician: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<EventRow> for DiagnosticEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let kind = DiagnosticKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Invalid(format!("diagnostic kind: {}", row.kind)))?;
        let outcome = CheckOutcome::parse(&row.outcome)
            .ok_or_else(|| StoreError::Invalid(format!("outcome: {}", row.outcome)))?;
        // older writers stored free-form sex values; unknown ones decode as none
        let sex = row.sex.as_deref().and_then(FetusSex::parse);

        Ok(DiagnosticEvent {
            id: row.id,
            recipient_id: row.recipient_id,
            transfer_date: parse_date(&row.transfer_date)?,
            kind,
            diagnosis_date: parse_date(&row.diagnosis_date)?,
            outcome,
            fetus_count: row.fetus_count,
            sex,
            notes: row.notes,
            veterinarian: row.veterinarian,
            technician: row.technician,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
