//! Embryo transfer database operations.

use chrono::NaiveDate;
use rusqlite::params;

use super::{Database, DbResult, StoreError};
use crate::models::EmbryoTransfer;

impl Database {
    /// Insert a recorded embryo transfer.
    pub fn insert_transfer(&self, transfer: &EmbryoTransfer) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO embryo_transfers (
                id, recipient_id, transfer_date, reference_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                transfer.id,
                transfer.recipient_id,
                transfer.transfer_date.to_string(),
                transfer.reference_date.to_string(),
                transfer.created_at,
            ],
        )?;
        Ok(())
    }

    /// All transfers a recipient received on a given date. Twins produce
    /// multiple rows; the earliest reference date anchors gestation math.
    pub fn list_transfers(
        &self,
        recipient_id: &str,
        transfer_date: NaiveDate,
    ) -> DbResult<Vec<EmbryoTransfer>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, recipient_id, transfer_date, reference_date, created_at
            FROM embryo_transfers
            WHERE recipient_id = ?1 AND transfer_date = ?2
            ORDER BY reference_date ASC
            "#,
        )?;

        let rows = stmt.query_map(params![recipient_id, transfer_date.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut transfers = Vec::new();
        for row in rows {
            let (id, recipient_id, transfer_date, reference_date, created_at) = row?;
            transfers.push(EmbryoTransfer {
                id,
                recipient_id,
                transfer_date: parse_date(&transfer_date)?,
                reference_date: parse_date(&reference_date)?,
                created_at,
            });
        }
        Ok(transfers)
    }
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    s.parse::<NaiveDate>()
        .map_err(|_| StoreError::Invalid(format!("date: {s}")))
}
