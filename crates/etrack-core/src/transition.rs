//! Reproductive status state machine.
//!
//! Every workflow step declares the statuses it may be performed from; the
//! check is a pure function so the batch reconciler can evaluate the whole
//! lot before issuing a single write.

use thiserror::Error;

use crate::models::ReproductiveStatus;

/// A workflow step requested against a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    /// Enroll the recipient in a synchronization protocol
    EnterProtocol,
    /// Finish protocol step 1 (starts synchronization)
    FinishSyncStep,
    /// Finish protocol step 2 (recipient becomes synchronized)
    FinishSecondStep,
    /// Perform the embryo transfer
    PerformTransfer,
    /// Record a pregnancy diagnosis
    PerformPregnancyCheck,
    /// Record a fetal sexing
    PerformSexing,
}

impl TransitionAction {
    /// Statuses this action may legally be performed from.
    pub fn allowed_from(&self) -> &'static [ReproductiveStatus] {
        match self {
            TransitionAction::EnterProtocol | TransitionAction::FinishSyncStep => {
                &[ReproductiveStatus::Empty]
            }
            TransitionAction::FinishSecondStep => &[ReproductiveStatus::SyncStarted],
            TransitionAction::PerformTransfer => &[ReproductiveStatus::Synchronized],
            TransitionAction::PerformPregnancyCheck => &[ReproductiveStatus::Served],
            TransitionAction::PerformSexing => &[
                ReproductiveStatus::Pregnant,
                ReproductiveStatus::PregnantRetest,
            ],
        }
    }

    /// Human-readable label of the required status set.
    pub fn required_label(&self) -> String {
        self.allowed_from()
            .iter()
            .map(ReproductiveStatus::as_str)
            .collect::<Vec<_>>()
            .join(" or ")
    }

    /// Short description used in denial messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TransitionAction::EnterProtocol => "enter a synchronization protocol",
            TransitionAction::FinishSyncStep => "finish the first protocol step",
            TransitionAction::FinishSecondStep => "finish the second protocol step",
            TransitionAction::PerformTransfer => "receive an embryo transfer",
            TransitionAction::PerformPregnancyCheck => "record a pregnancy diagnosis",
            TransitionAction::PerformSexing => "record a fetal sexing",
        }
    }
}

/// A rejected status transition, with a reason fit for the technician.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "recipient must be {} to {}, current status is {current}",
    action.required_label(),
    action.describe()
)]
pub struct TransitionDenied {
    pub current: ReproductiveStatus,
    pub action: TransitionAction,
}

/// Check whether `action` may be performed from `current`.
pub fn validate_transition(
    current: ReproductiveStatus,
    action: TransitionAction,
) -> Result<(), TransitionDenied> {
    if action.allowed_from().contains(&current) {
        Ok(())
    } else {
        Err(TransitionDenied { current, action })
    }
}
