//! SQLite schema definition.

/// Complete database schema for etrack.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Recipients
-- ============================================================================

CREATE TABLE IF NOT EXISTS recipients (
    id TEXT PRIMARY KEY,
    tag TEXT NOT NULL,
    name TEXT,
    farm_id TEXT NOT NULL,
    reproductive_status TEXT NOT NULL DEFAULT 'EMPTY',
    expected_due_date TEXT,                      -- ISO date, NULL unless pregnant
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_recipients_farm ON recipients(farm_id);
CREATE INDEX IF NOT EXISTS idx_recipients_status ON recipients(reproductive_status);

-- ============================================================================
-- Embryo Transfers
-- ============================================================================

CREATE TABLE IF NOT EXISTS embryo_transfers (
    id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL REFERENCES recipients(id),
    transfer_date TEXT NOT NULL,                 -- groups recipients into lots
    reference_date TEXT NOT NULL,                -- FIV lot opening date (D0)
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_transfers_recipient ON embryo_transfers(recipient_id);
CREATE INDEX IF NOT EXISTS idx_transfers_date ON embryo_transfers(transfer_date);

-- ============================================================================
-- Diagnostic Events
-- ============================================================================

-- The UNIQUE constraint on (recipient_id, transfer_date, kind) is the
-- natural key and the sole concurrency guard against duplicate rows.
CREATE TABLE IF NOT EXISTS diagnostic_events (
    id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL REFERENCES recipients(id),
    transfer_date TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('pregnancy_check', 'sexing')),
    diagnosis_date TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK (outcome IN ('PREGNANT', 'EMPTY', 'RETEST')),
    fetus_count INTEGER NOT NULL DEFAULT 0,
    sex TEXT,                                    -- legacy single-fetus column
    notes TEXT,                                  -- may embed the SEXES: payload
    veterinarian TEXT,                           -- optional attribution columns;
    technician TEXT,                             -- absent on pre-drift stores
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (recipient_id, transfer_date, kind)
);

CREATE INDEX IF NOT EXISTS idx_events_recipient ON diagnostic_events(recipient_id);
CREATE INDEX IF NOT EXISTS idx_events_date ON diagnostic_events(transfer_date);

-- ============================================================================
-- Draft Snapshots (key-value, one row per workflow)
-- ============================================================================

CREATE TABLE IF NOT EXISTS draft_snapshots (
    key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,                       -- JSON DraftSnapshot
    checksum TEXT NOT NULL,                      -- hex SHA-256 of payload
    saved_at TEXT NOT NULL                       -- RFC 3339
);
"#;
