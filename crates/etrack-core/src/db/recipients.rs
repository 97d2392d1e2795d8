//! Recipient database operations, including the grouped status/date update
//! used by the batch reconciler.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult, StoreError};
use crate::models::{RecipientAnimal, ReproductiveStatus};
use crate::store::{DueDateAction, StatusUpdateGroup};

impl Database {
    /// Insert a new recipient.
    pub fn insert_recipient(&self, recipient: &RecipientAnimal) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO recipients (
                id, tag, name, farm_id, reproductive_status, expected_due_date,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                recipient.id,
                recipient.tag,
                recipient.name,
                recipient.farm_id,
                recipient.status.as_str(),
                recipient.expected_due_date.map(|d| d.to_string()),
                recipient.created_at,
                recipient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a recipient by id.
    pub fn get_recipient(&self, id: &str) -> DbResult<Option<RecipientAnimal>> {
        self.conn
            .query_row(
                r#"
                SELECT id, tag, name, farm_id, reproductive_status,
                       expected_due_date, created_at, updated_at
                FROM recipients
                WHERE id = ?
                "#,
                [id],
                |row| {
                    Ok(RecipientRow {
                        id: row.get(0)?,
                        tag: row.get(1)?,
                        name: row.get(2)?,
                        farm_id: row.get(3)?,
                        status: row.get(4)?,
                        expected_due_date: row.get(5)?,
                        created_at: row.get(6)?,
                        updated_at: row.get(7)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Set the status of a single recipient (used by workflow steps outside
    /// the batch reconciler, e.g. marking an animal SERVED after transfer).
    pub fn set_recipient_status(&self, id: &str, status: ReproductiveStatus) -> DbResult<bool> {
        let rows = self.conn.execute(
            "UPDATE recipients SET reproductive_status = ?2, updated_at = datetime('now')
             WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(rows > 0)
    }

    /// Apply one grouped status/date update: every recipient in the group
    /// receives the identical values in a single statement.
    pub fn apply_status_update(&self, group: &StatusUpdateGroup) -> DbResult<usize> {
        if group.recipient_ids.is_empty() {
            return Ok(0);
        }

        // all bound values are TEXT, so the parameter list stays homogeneous
        let mut values: Vec<String> = vec![group.status.as_str().to_string()];
        let set_clause = match &group.due_date {
            DueDateAction::Set(date) => {
                values.push(date.to_string());
                "reproductive_status = ?1, expected_due_date = ?2"
            }
            DueDateAction::Clear => "reproductive_status = ?1, expected_due_date = NULL",
            DueDateAction::Keep => "reproductive_status = ?1",
        };

        let first_id_param = values.len() + 1;
        let placeholders: Vec<String> = (0..group.recipient_ids.len())
            .map(|i| format!("?{}", first_id_param + i))
            .collect();
        values.extend(group.recipient_ids.iter().cloned());

        let sql = format!(
            "UPDATE recipients SET {set_clause}, updated_at = datetime('now')
             WHERE id IN ({})",
            placeholders.join(", ")
        );

        let rows = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        Ok(rows)
    }
}

/// Intermediate row struct for database mapping.
struct RecipientRow {
    id: String,
    tag: String,
    name: Option<String>,
    farm_id: String,
    status: String,
    expected_due_date: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RecipientRow> for RecipientAnimal {
    type Error = StoreError;

    fn try_from(row: RecipientRow) -> Result<Self, Self::Error> {
        let status = ReproductiveStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Invalid(format!("reproductive status: {}", row.status)))?;
        let expected_due_date = row
            .expected_due_date
            .map(|d| {
                d.parse::<NaiveDate>()
                    .map_err(|_| StoreError::Invalid(format!("due date: {d}")))
            })
            .transpose()?;

        Ok(RecipientAnimal {
            id: row.id,
            tag: row.tag,
            name: row.name,
            farm_id: row.farm_id,
            status,
            expected_due_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
