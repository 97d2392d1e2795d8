//! Draft snapshot storage: a small key-value table keyed by workflow.
//!
//! Payload integrity (checksum, TTL) is enforced by [`crate::draft`]; this
//! module only moves rows.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

/// A raw stored draft row, validated by the draft layer before use.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDraft {
    pub payload: String,
    pub checksum: String,
    pub saved_at: String,
}

impl Database {
    /// Upsert the draft for a workflow key. One row per key.
    pub fn put_draft(
        &self,
        key: &str,
        payload: &str,
        checksum: &str,
        saved_at: &str,
    ) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO draft_snapshots (key, payload, checksum, saved_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![key, payload, checksum, saved_at],
        )?;
        Ok(())
    }

    /// Fetch the stored draft for a key, if any.
    pub fn get_draft(&self, key: &str) -> DbResult<Option<StoredDraft>> {
        let row = self
            .conn
            .query_row(
                "SELECT payload, checksum, saved_at FROM draft_snapshots WHERE key = ?1",
                [key],
                |row| {
                    Ok(StoredDraft {
                        payload: row.get(0)?,
                        checksum: row.get(1)?,
                        saved_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Delete the draft for a key. Returns whether a row existed.
    pub fn delete_draft(&self, key: &str) -> DbResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM draft_snapshots WHERE key = ?1", [key])?;
        Ok(rows > 0)
    }
}
