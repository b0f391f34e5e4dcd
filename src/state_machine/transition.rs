//! Pure state transition function

use super::state::{ConversationMemory, Slot};
use super::{Effect, Event, Intake, IntakeContext, IntakeState};
use crate::followup::{is_exit, FOLLOW_UP_INVITE, GOODBYE, HISTORY_TURNS};
use crate::model::{AdviceRequest, FollowUpRequest, FollowUpTurn, PatientVisit};
use crate::report::IntakeSummary;
use crate::safety::{screen_input, InputScreen, CRISIS_NOTE};
use crate::triage::{classify, interpret_symptoms};
use thiserror::Error;

pub const RETRY_MESSAGE: &str = "I couldn't detect any symptoms. Please describe again.";

pub const IMAGE_DONE_MESSAGE: &str = "Visual analysis complete.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Intake,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Intake) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Still processing the previous answer")]
    Busy,
    #[error("Intake is already complete")]
    AlreadyComplete,
    #[error("Intake is not complete yet")]
    IntakeInProgress,
    #[error("Follow-up questions are closed for this session")]
    FollowUpClosed,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
/// Classification runs here, exactly once, when the cursor moves past the
/// last slot.
pub fn transition(
    intake: &Intake,
    context: &IntakeContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (intake.state, event) {
        // ============================================================
        // Slot answers
        // ============================================================
        (IntakeState::AwaitingAnswer, Event::UserAnswer { text }) => {
            let slot = intake.current_slot().ok_or_else(|| {
                TransitionError::InvalidTransition("no slot left to answer".to_string())
            })?;

            if slot != Slot::Symptoms {
                let mut next = intake.clone();
                next.memory.store_answer(slot, &text);
                return Ok(advance(next, context));
            }

            let text = text.trim();
            if text.is_empty() {
                return Ok(TransitionResult::new(intake.clone())
                    .with_effect(Effect::reply(RETRY_MESSAGE)));
            }
            let mut next = intake.clone();
            next.state = IntakeState::ExtractingSymptoms;
            Ok(TransitionResult::new(next).with_effect(Effect::ExtractSymptoms {
                text: text.to_string(),
            }))
        }

        (IntakeState::ExtractingSymptoms, Event::SymptomsExtracted { text, record }) => {
            let mut next = intake.clone();
            next.state = IntakeState::AwaitingAnswer;
            let screen = screen_input(&text);

            let mut result = if record.is_empty() {
                let retry = match screen {
                    InputScreen::Vague => screen.reply(),
                    InputScreen::Clear | InputScreen::Unsafe => RETRY_MESSAGE,
                };
                TransitionResult::new(next).with_effect(Effect::reply(retry))
            } else {
                next.memory.store_extraction(&record);
                advance(next, context)
            };
            if screen == InputScreen::Unsafe {
                result.effects.insert(0, Effect::reply(CRISIS_NOTE));
            }
            Ok(result)
        }

        // ============================================================
        // Image sub-dialogue
        // ============================================================
        (IntakeState::OfferingImage, Event::UserAnswer { text }) => {
            let mut next = intake.clone();
            if text.trim().eq_ignore_ascii_case("yes") {
                next.state = IntakeState::AwaitingImagePath;
                return Ok(TransitionResult::new(next).with_effect(Effect::PersistState));
            }
            Ok(begin_advice(next, Vec::new()))
        }

        (IntakeState::AwaitingImagePath, Event::UserAnswer { text }) => {
            let path = text.trim();
            if path.is_empty() {
                return Ok(TransitionResult::new(intake.clone()));
            }
            let mut next = intake.clone();
            next.state = IntakeState::AnalyzingImage;
            Ok(TransitionResult::new(next).with_effect(Effect::AnalyzeImage {
                path: path.to_string(),
            }))
        }

        (IntakeState::AnalyzingImage, Event::ImageAnalyzed { finding }) => {
            let mut next = intake.clone();
            next.memory.visual_result = Some(finding);
            Ok(begin_advice(next, vec![Effect::reply(IMAGE_DONE_MESSAGE)]))
        }

        // ============================================================
        // Completion
        // ============================================================
        (
            IntakeState::GeneratingAdvice,
            Event::AdviceReady {
                advice,
                emergency,
                advisory_level,
            },
        ) => {
            let mut next = intake.clone();
            next.memory.advice = Some(advice);
            next.memory.emergency = emergency;
            next.memory.advisory_level = advisory_level;
            next.state = IntakeState::Complete;

            let report = IntakeSummary::from_memory(&next.memory).render();
            let visit = PatientVisit {
                name: next.memory.name.clone().unwrap_or_default(),
                age: next.memory.age.clone().unwrap_or_default(),
                sex: next.memory.sex.clone().unwrap_or_default(),
                symptoms: next.memory.symptoms.clone(),
            };
            Ok(TransitionResult::new(next)
                .with_effect(Effect::reply(report))
                .with_effect(Effect::reply(FOLLOW_UP_INVITE))
                .with_effect(Effect::RecordVisit { visit })
                .with_effect(Effect::PersistState))
        }

        // ============================================================
        // Follow-up questions
        // ============================================================
        (IntakeState::Complete, Event::FollowUpQuestion { text }) => {
            if !intake.accepts_follow_up() {
                return Err(TransitionError::FollowUpClosed);
            }
            let question = text.trim();
            if question.is_empty() {
                return Ok(TransitionResult::new(intake.clone())
                    .with_effect(Effect::reply(FOLLOW_UP_INVITE)));
            }
            if is_exit(question) {
                let mut next = intake.clone();
                next.memory.follow_up_closed = true;
                return Ok(TransitionResult::new(next)
                    .with_effect(Effect::reply(GOODBYE))
                    .with_effect(Effect::PersistState));
            }
            match screen_input(question) {
                InputScreen::Clear => {
                    let mut next = intake.clone();
                    next.state = IntakeState::AnsweringFollowUp;
                    let request = follow_up_request(&next.memory, question);
                    Ok(TransitionResult::new(next).with_effect(Effect::AnswerFollowUp { request }))
                }
                screen => Ok(TransitionResult::new(intake.clone())
                    .with_effect(Effect::reply(screen.reply()))),
            }
        }

        (IntakeState::AnsweringFollowUp, Event::FollowUpAnswered { question, answer }) => {
            let mut next = intake.clone();
            next.state = IntakeState::Complete;
            next.memory.follow_ups.push(FollowUpTurn {
                question,
                answer: answer.clone(),
            });
            Ok(TransitionResult::new(next)
                .with_effect(Effect::reply(answer))
                .with_effect(Effect::PersistState))
        }

        // ============================================================
        // Rejections
        // ============================================================
        (IntakeState::Complete, Event::UserAnswer { .. }) => Err(TransitionError::AlreadyComplete),

        (state, Event::UserAnswer { .. } | Event::FollowUpQuestion { .. }) if state.is_busy() => {
            Err(TransitionError::Busy)
        }

        (_, Event::FollowUpQuestion { .. }) => Err(TransitionError::IntakeInProgress),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

/// Move the cursor past every filled slot. When it leaves the last slot,
/// classify and move on to the image offer or straight to advice.
fn advance(mut next: Intake, context: &IntakeContext) -> TransitionResult {
    let mut effects = Vec::new();
    while let Some(slot) = next.current_slot() {
        if !next.memory.is_filled(slot) {
            break;
        }
        next.current_index += 1;
    }

    if next.current_slot().is_some() {
        effects.push(Effect::PersistState);
        return TransitionResult {
            new_state: next,
            effects,
        };
    }

    let record = next.memory.symptom_record();
    next.memory.triage = Some(classify(&record, context.profile.as_ref()));
    next.memory.reasoning = Some(interpret_symptoms(&record));

    effects.push(Effect::RecordSymptomTrend {
        symptoms: record.symptoms.iter().cloned().collect(),
    });

    if context.image_step {
        next.state = IntakeState::OfferingImage;
        effects.push(Effect::PersistState);
        return TransitionResult {
            new_state: next,
            effects,
        };
    }
    begin_advice(next, effects)
}

fn begin_advice(mut next: Intake, mut effects: Vec<Effect>) -> TransitionResult {
    next.state = IntakeState::GeneratingAdvice;
    let request = advice_request(&next.memory);
    effects.push(Effect::PersistState);
    effects.push(Effect::GenerateAdvice { request });
    TransitionResult {
        new_state: next,
        effects,
    }
}

/// Advice request for the collected memory
pub fn advice_request(memory: &ConversationMemory) -> AdviceRequest {
    AdviceRequest {
        name: memory.name.clone(),
        age: memory.age.clone(),
        symptoms: memory.symptoms.clone(),
        severity: memory.severity.clone(),
        duration: memory.duration.clone(),
        triage: memory
            .triage
            .clone()
            .unwrap_or_else(|| classify(&memory.symptom_record(), None)),
    }
}

fn follow_up_request(memory: &ConversationMemory, question: &str) -> FollowUpRequest {
    let skip = memory.follow_ups.len().saturating_sub(HISTORY_TURNS);
    FollowUpRequest {
        name: memory.name.clone(),
        age: memory.age.clone(),
        sex: memory.sex.clone(),
        symptoms: memory.symptoms.clone(),
        triage: memory.triage.clone(),
        history: memory.follow_ups.iter().skip(skip).cloned().collect(),
        question: question.to_string(),
    }
}
