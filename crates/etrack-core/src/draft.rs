//! Crash-recovery drafts.
//!
//! Each workflow owns one slot in the `draft_snapshots` table. Saves are
//! debounced so rapid form edits collapse into one write, and loads validate
//! a checksum plus a 24-hour freshness window before handing the snapshot
//! back. Anything stale or corrupt is deleted rather than restored.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::db::{Database, DbResult};
use crate::models::{DiagnosticKind, DraftSnapshot};

/// Drafts older than this are discarded on load.
pub const DRAFT_TTL_HOURS: i64 = 24;

/// Default gap between physical writes.
pub const SAVE_DEBOUNCE: Duration = Duration::from_secs(1);

/// Persistence handle for one workflow's draft slot.
pub struct DraftStore {
    key: String,
    debounce: Duration,
    last_flush: Option<Instant>,
    pending: Option<DraftSnapshot>,
}

impl DraftStore {
    pub fn new(kind: DiagnosticKind) -> Self {
        Self::with_debounce(kind, SAVE_DEBOUNCE)
    }

    pub fn with_debounce(kind: DiagnosticKind, debounce: Duration) -> Self {
        Self {
            key: kind.draft_key().to_string(),
            debounce,
            last_flush: None,
            pending: None,
        }
    }

    /// Record the latest form state. Writes through immediately when outside
    /// the debounce window, otherwise keeps the snapshot pending for the next
    /// [`flush`](Self::flush). Returns whether a physical write happened.
    ///
    /// Blank snapshots are dropped, not persisted.
    pub fn save(&mut self, db: &Database, snapshot: &DraftSnapshot) -> DbResult<bool> {
        if !snapshot.has_content() {
            self.pending = None;
            return Ok(false);
        }
        self.pending = Some(snapshot.clone());

        let within_window = self
            .last_flush
            .is_some_and(|at| at.elapsed() < self.debounce);
        if within_window {
            return Ok(false);
        }
        self.flush(db)
    }

    /// Write the pending snapshot, if any, stamping its `saved_at`.
    pub fn flush(&mut self, db: &Database) -> DbResult<bool> {
        let Some(mut snapshot) = self.pending.take() else {
            return Ok(false);
        };
        snapshot.saved_at = Utc::now().to_rfc3339();

        let payload = serde_json::to_string(&snapshot)?;
        db.put_draft(&self.key, &payload, &checksum(&payload), &snapshot.saved_at)?;
        self.last_flush = Some(Instant::now());
        Ok(true)
    }

    /// Restore the stored draft. Returns `None` (and deletes the row) when
    /// the checksum does not match, the payload fails to parse, or the draft
    /// is older than [`DRAFT_TTL_HOURS`].
    pub fn load(&self, db: &Database) -> DbResult<Option<DraftSnapshot>> {
        let Some(stored) = db.get_draft(&self.key)? else {
            return Ok(None);
        };

        if checksum(&stored.payload) != stored.checksum {
            db.delete_draft(&self.key)?;
            return Ok(None);
        }
        let Ok(snapshot) = serde_json::from_str::<DraftSnapshot>(&stored.payload) else {
            db.delete_draft(&self.key)?;
            return Ok(None);
        };
        let fresh = DateTime::parse_from_rfc3339(&stored.saved_at)
            .map(|at| Utc::now() - at.with_timezone(&Utc) < chrono::Duration::hours(DRAFT_TTL_HOURS))
            .unwrap_or(false);
        if !fresh {
            db.delete_draft(&self.key)?;
            return Ok(None);
        }

        Ok(Some(snapshot))
    }

    /// Drop both the pending snapshot and the stored row.
    pub fn clear(&mut self, db: &Database) -> DbResult<()> {
        self.pending = None;
        db.delete_draft(&self.key)?;
        Ok(())
    }
}

fn checksum(payload: &str) -> String {
    hex::encode(Sha256::digest(payload.as_bytes()))
}
