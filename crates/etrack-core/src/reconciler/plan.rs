//! Pure batch planning.
//!
//! Planning validates the whole submission up front and, only when every
//! animal passes, derives the event writes and the grouped status updates.
//! No storage is touched here; the orchestrator in the parent module applies
//! the plan.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::gestation::due_date;
use crate::models::{
    Attribution, CheckOutcome, DiagnosticEvent, DiagnosticKind, LotAnimal, ReproductiveStatus,
};
use crate::sexing::{self, FetusSex, FinalOutcome, SEX_MARKER};
use crate::store::{DueDateAction, StatusUpdateGroup};
use crate::transition::{validate_transition, TransitionAction};

/// Per-animal form data for a pregnancy-check batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PregnancySubmission {
    pub outcome: Option<CheckOutcome>,
    /// Viable fetus count; defaults to 1 for a pregnant outcome
    pub fetus_count: Option<u32>,
    pub diagnosis_date: Option<NaiveDate>,
    pub notes: String,
}

/// Per-animal form data for a sexing batch.
///
/// An entry whose slots are all blank declares the pregnancy lost: the
/// aggregate outcome is `EMPTY` and the animal's status reverts accordingly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SexingSubmission {
    pub slots: Vec<Option<FetusSex>>,
    pub diagnosis_date: Option<NaiveDate>,
    pub notes: String,
}

/// One animal that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub recipient_id: String,
    pub tag: String,
    pub reason: String,
}

/// The full validation outcome of a rejected batch. When this is returned,
/// nothing was written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub failures: Vec<ValidationFailure>,
    pub missing_veterinarian: bool,
}

impl std::error::Error for ValidationReport {}

impl ValidationReport {
    fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.missing_veterinarian
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.missing_veterinarian {
            parts.push("a responsible veterinarian is required".to_string());
        }
        for failure in &self.failures {
            parts.push(format!("{}: {}", failure.tag, failure.reason));
        }
        write!(f, "{}", parts.join("; "))
    }
}

/// One event write the plan calls for. `existing` selects update over insert
/// and means the event id was taken from the stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite {
    pub event: DiagnosticEvent,
    pub existing: bool,
}

/// A validated batch: the per-animal event writes plus the status updates
/// grouped by identical (status, due-date action).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub writes: Vec<PlannedWrite>,
    pub groups: Vec<StatusUpdateGroup>,
}

/// Validate and plan a pregnancy-check batch. All-or-nothing: a single
/// invalid animal rejects the whole batch with zero writes planned.
pub fn plan_pregnancy_checks(
    lot: &[LotAnimal],
    submissions: &BTreeMap<String, PregnancySubmission>,
    attribution: &Attribution,
) -> Result<BatchPlan, ValidationReport> {
    let mut report = ValidationReport {
        missing_veterinarian: !attribution.has_veterinarian(),
        ..Default::default()
    };
    let mut resolved = Vec::new();

    for animal in lot {
        let Some(submission) = submissions.get(&animal.recipient_id) else {
            continue;
        };
        if let Err(denied) =
            validate_transition(animal.status, TransitionAction::PerformPregnancyCheck)
        {
            report.push(animal, denied.to_string());
            continue;
        }
        let Some(outcome) = submission.outcome else {
            report.push(animal, "no diagnosis selected".into());
            continue;
        };
        let Some(diagnosis_date) = submission.diagnosis_date else {
            report.push(animal, "diagnosis date is missing".into());
            continue;
        };
        // the marker token is reserved for the encoder; readers decode every
        // event's notes, DG rows included
        if submission.notes.contains(SEX_MARKER) {
            report.push(animal, format!("notes must not contain '{SEX_MARKER}'"));
            continue;
        }

        let (status, due, fetus_count) = match outcome {
            CheckOutcome::Pregnant => (
                ReproductiveStatus::Pregnant,
                DueDateAction::Set(due_date(animal.reference_date)),
                submission.fetus_count.unwrap_or(1).max(1),
            ),
            CheckOutcome::Retest => (
                ReproductiveStatus::PregnantRetest,
                DueDateAction::Set(due_date(animal.reference_date)),
                submission.fetus_count.unwrap_or(1).max(1),
            ),
            CheckOutcome::Empty => (ReproductiveStatus::Empty, DueDateAction::Clear, 0),
        };

        let mut event = base_event(animal, DiagnosticKind::PregnancyCheck, diagnosis_date);
        event.outcome = outcome;
        event.fetus_count = fetus_count;
        event.notes = non_blank(&submission.notes);
        (event.veterinarian, event.technician) = attribution.normalized();

        resolved.push(Resolved {
            write: PlannedWrite {
                existing: animal.existing_event.is_some(),
                event,
            },
            status,
            due,
        });
    }

    finish(resolved, report)
}

/// Validate and plan a sexing batch. Same all-or-nothing contract as
/// [`plan_pregnancy_checks`].
pub fn plan_sexings(
    lot: &[LotAnimal],
    submissions: &BTreeMap<String, SexingSubmission>,
    attribution: &Attribution,
) -> Result<BatchPlan, ValidationReport> {
    let mut report = ValidationReport {
        missing_veterinarian: !attribution.has_veterinarian(),
        ..Default::default()
    };
    let mut resolved = Vec::new();

    for animal in lot {
        let Some(submission) = submissions.get(&animal.recipient_id) else {
            continue;
        };
        if let Err(denied) = validate_transition(animal.status, TransitionAction::PerformSexing) {
            report.push(animal, denied.to_string());
            continue;
        }
        let Some(diagnosis_date) = submission.diagnosis_date else {
            report.push(animal, "diagnosis date is missing".into());
            continue;
        };
        // the marker token is reserved for the encoder
        if submission.notes.contains(SEX_MARKER) {
            report.push(animal, format!("notes must not contain '{SEX_MARKER}'"));
            continue;
        }

        let final_outcome = sexing::aggregate(&submission.slots);
        let due = match final_outcome {
            FinalOutcome::Empty => DueDateAction::Clear,
            _ => DueDateAction::Keep,
        };

        let mut event = base_event(animal, DiagnosticKind::Sexing, diagnosis_date);
        event.outcome = final_outcome.check_outcome();
        event.fetus_count = sexing::viable_count(&submission.slots);
        event.sex = sexing::legacy_scalar(&submission.slots);
        event.notes = non_blank(&sexing::encode(&submission.slots, submission.notes.trim()));
        (event.veterinarian, event.technician) = attribution.normalized();

        resolved.push(Resolved {
            write: PlannedWrite {
                existing: animal.existing_event.is_some(),
                event,
            },
            status: final_outcome.status(),
            due,
        });
    }

    finish(resolved, report)
}

struct Resolved {
    write: PlannedWrite,
    status: ReproductiveStatus,
    due: DueDateAction,
}

impl ValidationReport {
    fn push(&mut self, animal: &LotAnimal, reason: String) {
        self.failures.push(ValidationFailure {
            recipient_id: animal.recipient_id.clone(),
            tag: animal.tag.clone(),
            reason,
        });
    }
}

/// New event, or the stored row's identity when one already exists for the
/// natural key (re-submits edit in place).
fn base_event(
    animal: &LotAnimal,
    kind: DiagnosticKind,
    diagnosis_date: NaiveDate,
) -> DiagnosticEvent {
    let mut event = DiagnosticEvent::new(
        animal.recipient_id.clone(),
        animal.transfer_date,
        kind,
        diagnosis_date,
        CheckOutcome::Pregnant,
    );
    if let Some(existing) = &animal.existing_event {
        event.id = existing.id.clone();
        event.created_at = existing.created_at.clone();
    }
    event
}

fn non_blank(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Group the resolved animals by identical (status, due-date action) and
/// assemble the plan. Group order is deterministic (sorted by key).
fn finish(resolved: Vec<Resolved>, report: ValidationReport) -> Result<BatchPlan, ValidationReport> {
    if !report.is_clean() {
        return Err(report);
    }

    let mut writes = Vec::with_capacity(resolved.len());
    let mut grouped: BTreeMap<(String, String), StatusUpdateGroup> = BTreeMap::new();
    for r in resolved {
        let due_key = match &r.due {
            DueDateAction::Set(date) => format!("set:{date}"),
            DueDateAction::Clear => "clear".to_string(),
            DueDateAction::Keep => "keep".to_string(),
        };
        grouped
            .entry((r.status.as_str().to_string(), due_key))
            .or_insert_with(|| StatusUpdateGroup {
                status: r.status,
                due_date: r.due.clone(),
                recipient_ids: Vec::new(),
            })
            .recipient_ids
            .push(r.write.event.recipient_id.clone());
        writes.push(r.write);
    }

    Ok(BatchPlan {
        writes,
        groups: grouped.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gestation::GESTATION_DAYS;

    fn vet() -> Attribution {
        Attribution {
            veterinarian: "Dr. Ana".into(),
            technician: String::new(),
        }
    }

    fn animal(id: &str, tag: &str, status: ReproductiveStatus) -> LotAnimal {
        LotAnimal {
            recipient_id: id.into(),
            tag: tag.into(),
            status,
            transfer_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            reference_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            fetus_count: 1,
            existing_event: None,
        }
    }

    fn pregnant(date: Option<NaiveDate>) -> PregnancySubmission {
        PregnancySubmission {
            outcome: Some(CheckOutcome::Pregnant),
            diagnosis_date: date.or(NaiveDate::from_ymd_opt(2025, 4, 9)),
            ..Default::default()
        }
    }

    #[test]
    fn test_pregnant_plan_sets_due_date_from_reference() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Served)];
        let subs = BTreeMap::from([("r1".to_string(), pregnant(None))]);

        let plan = plan_pregnancy_checks(&lot, &subs, &vet()).unwrap();
        assert_eq!(plan.writes.len(), 1);
        let event = &plan.writes[0].event;
        assert_eq!(event.outcome, CheckOutcome::Pregnant);
        assert_eq!(event.fetus_count, 1);
        assert_eq!(event.veterinarian.as_deref(), Some("Dr. Ana"));
        assert!(event.technician.is_none());

        assert_eq!(plan.groups.len(), 1);
        let expected_due = lot[0].reference_date + chrono::Duration::days(GESTATION_DAYS);
        assert_eq!(plan.groups[0].status, ReproductiveStatus::Pregnant);
        assert_eq!(plan.groups[0].due_date, DueDateAction::Set(expected_due));
    }

    #[test]
    fn test_empty_outcome_clears_due_date_and_zeroes_count() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Served)];
        let subs = BTreeMap::from([(
            "r1".to_string(),
            PregnancySubmission {
                outcome: Some(CheckOutcome::Empty),
                fetus_count: Some(2),
                diagnosis_date: NaiveDate::from_ymd_opt(2025, 4, 9),
                ..Default::default()
            },
        )]);

        let plan = plan_pregnancy_checks(&lot, &subs, &vet()).unwrap();
        assert_eq!(plan.writes[0].event.fetus_count, 0);
        assert_eq!(plan.groups[0].status, ReproductiveStatus::Empty);
        assert_eq!(plan.groups[0].due_date, DueDateAction::Clear);
    }

    #[test]
    fn test_single_invalid_animal_rejects_whole_batch() {
        let lot = vec![
            animal("r1", "A-1", ReproductiveStatus::Served),
            animal("r2", "B-2", ReproductiveStatus::Pregnant),
        ];
        let subs = BTreeMap::from([
            ("r1".to_string(), pregnant(None)),
            ("r2".to_string(), pregnant(None)),
        ]);

        let report = plan_pregnancy_checks(&lot, &subs, &vet()).unwrap_err();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].tag, "B-2");
        assert!(!report.missing_veterinarian);
    }

    #[test]
    fn test_missing_veterinarian_rejects_batch() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Served)];
        let subs = BTreeMap::from([("r1".to_string(), pregnant(None))]);

        let report = plan_pregnancy_checks(&lot, &subs, &Attribution::default()).unwrap_err();
        assert!(report.missing_veterinarian);
        assert!(report.failures.is_empty());
        assert!(report.to_string().contains("veterinarian"));
    }

    #[test]
    fn test_animals_without_submission_are_skipped() {
        let lot = vec![
            animal("r1", "A-1", ReproductiveStatus::Served),
            animal("r2", "B-2", ReproductiveStatus::Served),
        ];
        let subs = BTreeMap::from([("r1".to_string(), pregnant(None))]);

        let plan = plan_pregnancy_checks(&lot, &subs, &vet()).unwrap();
        assert_eq!(plan.writes.len(), 1);
        assert_eq!(plan.writes[0].event.recipient_id, "r1");
    }

    #[test]
    fn test_identical_results_collapse_into_one_group() {
        let lot = vec![
            animal("r1", "A-1", ReproductiveStatus::Served),
            animal("r2", "B-2", ReproductiveStatus::Served),
            animal("r3", "C-3", ReproductiveStatus::Served),
        ];
        let mut empty = pregnant(None);
        empty.outcome = Some(CheckOutcome::Empty);
        let subs = BTreeMap::from([
            ("r1".to_string(), pregnant(None)),
            ("r2".to_string(), pregnant(None)),
            ("r3".to_string(), empty),
        ]);

        let plan = plan_pregnancy_checks(&lot, &subs, &vet()).unwrap();
        assert_eq!(plan.groups.len(), 2);
        let pregnant_group = plan
            .groups
            .iter()
            .find(|g| g.status == ReproductiveStatus::Pregnant)
            .unwrap();
        assert_eq!(pregnant_group.recipient_ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_existing_event_plans_an_update_with_stored_id() {
        let mut a = animal("r1", "A-1", ReproductiveStatus::Served);
        let stored = DiagnosticEvent::new(
            "r1".into(),
            a.transfer_date,
            DiagnosticKind::PregnancyCheck,
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            CheckOutcome::Retest,
        );
        let stored_id = stored.id.clone();
        a.existing_event = Some(stored);

        let subs = BTreeMap::from([("r1".to_string(), pregnant(None))]);
        let plan = plan_pregnancy_checks(&[a], &subs, &vet()).unwrap();
        assert!(plan.writes[0].existing);
        assert_eq!(plan.writes[0].event.id, stored_id);
    }

    #[test]
    fn test_sexing_plan_encodes_slots_and_keeps_due_date() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Pregnant)];
        let subs = BTreeMap::from([(
            "r1".to_string(),
            SexingSubmission {
                slots: vec![Some(FetusSex::Female), Some(FetusSex::Female)],
                diagnosis_date: NaiveDate::from_ymd_opt(2025, 5, 10),
                notes: "clear image".into(),
            },
        )]);

        let plan = plan_sexings(&lot, &subs, &vet()).unwrap();
        let event = &plan.writes[0].event;
        assert_eq!(event.kind, DiagnosticKind::Sexing);
        assert_eq!(event.outcome, CheckOutcome::Pregnant);
        assert_eq!(event.fetus_count, 2);
        assert_eq!(event.sex, Some(FetusSex::Female));
        assert_eq!(
            event.notes.as_deref(),
            Some("SEXES:FEMALE,FEMALE|clear image")
        );
        assert_eq!(plan.groups[0].status, ReproductiveStatus::PregnantFemale);
        assert_eq!(plan.groups[0].due_date, DueDateAction::Keep);
    }

    #[test]
    fn test_sexing_all_blank_slots_declares_pregnancy_lost() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Pregnant)];
        let subs = BTreeMap::from([(
            "r1".to_string(),
            SexingSubmission {
                slots: vec![None, None],
                diagnosis_date: NaiveDate::from_ymd_opt(2025, 5, 10),
                notes: "reabsorbed".into(),
            },
        )]);

        let plan = plan_sexings(&lot, &subs, &vet()).unwrap();
        let event = &plan.writes[0].event;
        assert_eq!(event.outcome, CheckOutcome::Empty);
        assert_eq!(event.fetus_count, 0);
        assert!(event.sex.is_none());
        assert_eq!(event.notes.as_deref(), Some("reabsorbed"));
        assert_eq!(plan.groups[0].status, ReproductiveStatus::Empty);
        assert_eq!(plan.groups[0].due_date, DueDateAction::Clear);
    }

    #[test]
    fn test_pregnancy_check_rejects_reserved_marker_in_notes() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Served)];
        let mut sub = pregnant(None);
        sub.notes = "scanned twice SEXES:FEMALE".into();
        let subs = BTreeMap::from([("r1".to_string(), sub)]);

        let report = plan_pregnancy_checks(&lot, &subs, &vet()).unwrap_err();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("SEXES:"));
    }

    #[test]
    fn test_sexing_rejects_reserved_marker_in_notes() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Pregnant)];
        let subs = BTreeMap::from([(
            "r1".to_string(),
            SexingSubmission {
                slots: vec![Some(FetusSex::Male)],
                diagnosis_date: NaiveDate::from_ymd_opt(2025, 5, 10),
                notes: "weird SEXES: text".into(),
            },
        )]);

        let report = plan_sexings(&lot, &subs, &vet()).unwrap_err();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("SEXES:"));
    }

    #[test]
    fn test_sexing_rejects_wrong_status() {
        let lot = vec![animal("r1", "A-1", ReproductiveStatus::Served)];
        let subs = BTreeMap::from([(
            "r1".to_string(),
            SexingSubmission {
                slots: vec![Some(FetusSex::Male)],
                diagnosis_date: NaiveDate::from_ymd_opt(2025, 5, 10),
                notes: String::new(),
            },
        )]);

        let report = plan_sexings(&lot, &subs, &vet()).unwrap_err();
        assert_eq!(report.failures[0].tag, "A-1");
    }
}
