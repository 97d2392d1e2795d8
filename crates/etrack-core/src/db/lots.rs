//! Lot loading: the read-only provider that assembles the eligible animals
//! for one diagnostic step.

use chrono::NaiveDate;
use rusqlite::params;

use super::transfers::parse_date;
use super::{Database, DbResult, StoreError};
use crate::models::{CheckOutcome, DiagnosticKind, LotAnimal, NaturalKey, ReproductiveStatus};

impl Database {
    /// Load the lot for (farm, transfer date, kind): every recipient of the
    /// farm that is eligible for the step, together with its pre-existing
    /// event for that kind/date, sorted by tag.
    ///
    /// Eligibility: `SERVED` for pregnancy checks; `PREGNANT` or
    /// `PREGNANT_RETEST` for sexing, which additionally requires a pregnant
    /// prior pregnancy-check row for the same transfer date.
    pub fn load_lot(
        &self,
        farm_id: &str,
        transfer_date: NaiveDate,
        kind: DiagnosticKind,
    ) -> DbResult<Vec<LotAnimal>> {
        let status_filter = match kind {
            DiagnosticKind::PregnancyCheck => "r.reproductive_status = 'SERVED'",
            DiagnosticKind::Sexing => {
                "r.reproductive_status IN ('PREGNANT', 'PREGNANT_RETEST')"
            }
        };

        // twins produce several transfer rows; the earliest D0 anchors
        // gestation math
        let sql = format!(
            r#"
            SELECT r.id, r.tag, r.reproductive_status, MIN(t.reference_date)
            FROM recipients r
            JOIN embryo_transfers t ON t.recipient_id = r.id
            WHERE r.farm_id = ?1 AND t.transfer_date = ?2 AND {status_filter}
            GROUP BY r.id
            ORDER BY r.tag
            "#
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![farm_id, transfer_date.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut animals = Vec::new();
        for row in rows {
            let (recipient_id, tag, status, reference_date) = row?;
            let status = ReproductiveStatus::parse(&status)
                .ok_or_else(|| StoreError::Invalid(format!("reproductive status: {status}")))?;

            let mut fetus_count = 1;
            if kind == DiagnosticKind::Sexing {
                // sexing needs a confirmed pregnancy for this transfer date
                let check = self.find_event(&NaturalKey {
                    recipient_id: recipient_id.clone(),
                    transfer_date,
                    kind: DiagnosticKind::PregnancyCheck,
                })?;
                match check {
                    Some(check) if check.outcome != CheckOutcome::Empty => {
                        fetus_count = check.fetus_count.max(1);
                    }
                    _ => continue,
                }
            }

            let existing_event = self.find_event(&NaturalKey {
                recipient_id: recipient_id.clone(),
                transfer_date,
                kind,
            })?;

            animals.push(LotAnimal {
                recipient_id,
                tag,
                status,
                transfer_date,
                reference_date: parse_date(&reference_date)?,
                fetus_count,
                existing_event,
            });
        }
        Ok(animals)
    }
}
