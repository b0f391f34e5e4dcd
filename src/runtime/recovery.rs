//! Session recovery logic
//!
//! Intakes are persisted while a collaborator call is in flight. When the
//! process restarts in that window the stored state is busy and would reject
//! every answer, so it is normalized before the actor starts.

use crate::state_machine::{Intake, IntakeState};

/// Result of analyzing a persisted intake
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryDecision {
    /// The intake to resume with
    pub intake: Intake,
    /// Reason for the decision (for logging)
    pub reason: RecoveryReason,
}

/// Why a particular recovery decision was made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    /// Nothing was in flight
    Idle,
    /// The symptom description went down with the extraction call; ask again
    InterruptedExtraction,
    /// The image path went down with the classifier call; offer the image again
    InterruptedImage,
    /// Everything advice needs is in memory; the executor repeats the call
    InterruptedAdvice,
    /// The question went down with the model call; back to accepting questions
    InterruptedFollowUp,
}

impl RecoveryDecision {
    /// The stored state differs from the one the actor starts with
    pub fn changes_state(&self) -> bool {
        matches!(
            self.reason,
            RecoveryReason::InterruptedExtraction
                | RecoveryReason::InterruptedImage
                | RecoveryReason::InterruptedFollowUp
        )
    }
}

/// Decide the state a persisted intake resumes in
pub fn resume_state(mut intake: Intake) -> RecoveryDecision {
    let reason = match intake.state {
        IntakeState::ExtractingSymptoms => {
            intake.state = IntakeState::AwaitingAnswer;
            RecoveryReason::InterruptedExtraction
        }
        IntakeState::AnalyzingImage => {
            intake.state = IntakeState::OfferingImage;
            RecoveryReason::InterruptedImage
        }
        IntakeState::GeneratingAdvice => RecoveryReason::InterruptedAdvice,
        IntakeState::AnsweringFollowUp => {
            intake.state = IntakeState::Complete;
            RecoveryReason::InterruptedFollowUp
        }
        IntakeState::AwaitingAnswer
        | IntakeState::OfferingImage
        | IntakeState::AwaitingImagePath
        | IntakeState::Complete => RecoveryReason::Idle,
    };
    RecoveryDecision { intake, reason }
}
