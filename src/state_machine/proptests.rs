//! Property-based tests for the intake state machine
//!
//! A scripted driver plays the collaborators so whole dialogues can be
//! generated and checked against the invariants.

use super::state::Slot;
use super::*;
use crate::model::{SymptomRecord, VisualFinding};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

/// Stand-in extractor: recognizes a couple of words, nothing else
fn scripted_extraction(text: &str) -> SymptomRecord {
    let lower = text.to_lowercase();
    SymptomRecord::new(
        ["fever", "cough", "chest pain", "headache"]
            .into_iter()
            .filter(|s| lower.contains(s)),
    )
}

/// Feed one answer and resolve every collaborator effect it triggers.
/// Returns the final intake plus every effect seen along the way.
fn drive(
    intake: &Intake,
    context: &IntakeContext,
    text: &str,
) -> Result<(Intake, Vec<Effect>), TransitionError> {
    let mut seen = Vec::new();
    let mut pending = vec![Event::answer(text)];
    let mut current = intake.clone();

    while let Some(event) = pending.pop() {
        let result = transition(&current, context, event)?;
        current = result.new_state;
        for effect in result.effects {
            match &effect {
                Effect::ExtractSymptoms { text } => pending.push(Event::SymptomsExtracted {
                    text: text.clone(),
                    record: scripted_extraction(text),
                }),
                Effect::AnalyzeImage { .. } => pending.push(Event::ImageAnalyzed {
                    finding: VisualFinding::new("rash", 0.5),
                }),
                Effect::GenerateAdvice { .. } => pending.push(Event::AdviceReady {
                    advice: "Rest.".to_string(),
                    emergency: false,
                    advisory_level: None,
                }),
                _ => {}
            }
            seen.push(effect);
        }
    }
    Ok((current, seen))
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_answer() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("   ".to_string()),
        Just("yes".to_string()),
        Just("I have a fever and a cough".to_string()),
        Just("chest pain".to_string()),
        Just("i feel bad".to_string()),
        "[a-z ]{1,20}",
    ]
}

fn arb_context() -> impl Strategy<Value = IntakeContext> {
    any::<bool>().prop_map(|image_step| IntakeContext::new("prop-session").with_image_step(image_step))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The slot cursor never moves backwards
    #[test]
    fn prop_index_is_non_decreasing(
        context in arb_context(),
        answers in proptest::collection::vec(arb_answer(), 0..30),
    ) {
        let mut intake = Intake::new();
        for text in &answers {
            let before = intake.current_index;
            match drive(&intake, &context, text) {
                Ok((next, _)) => {
                    prop_assert!(next.current_index >= before);
                    prop_assert!(next.current_index <= Slot::ORDER.len());
                    intake = next;
                }
                Err(e) => {
                    prop_assert!(intake.is_complete());
                    prop_assert_eq!(e, TransitionError::AlreadyComplete);
                }
            }
        }
    }

    /// Classification and trend logging happen at most once per intake
    #[test]
    fn prop_single_completion(
        context in arb_context(),
        answers in proptest::collection::vec(arb_answer(), 0..30),
    ) {
        let mut intake = Intake::new();
        let mut trend_records = 0;
        let mut visits = 0;
        for text in &answers {
            let Ok((next, effects)) = drive(&intake, &context, text) else {
                continue;
            };
            trend_records += effects.iter().filter(|e| matches!(e, Effect::RecordSymptomTrend { .. })).count();
            visits += effects.iter().filter(|e| matches!(e, Effect::RecordVisit { .. })).count();
            intake = next;
        }
        prop_assert!(trend_records <= 1);
        prop_assert_eq!(visits, usize::from(intake.is_complete()));
        prop_assert_eq!(intake.memory.triage.is_some(), trend_records == 1);
    }

    /// Unrecognized symptom text never advances past the symptom slot
    #[test]
    fn prop_retry_keeps_symptom_slot(text in "[qxz ]{1,20}") {
        let context = IntakeContext::new("prop-session");
        let mut intake = Intake::new();
        for answer in ["Ana", "34", "female"] {
            intake = drive(&intake, &context, answer).unwrap().0;
        }
        let (next, _) = drive(&intake, &context, &text).unwrap();
        prop_assert_eq!(next.current_index, 3);
        prop_assert_eq!(next.state, IntakeState::AwaitingAnswer);
        prop_assert!(next.memory.symptoms.is_empty());
    }

    /// Same input, same output
    #[test]
    fn prop_transition_is_pure(context in arb_context(), text in arb_answer()) {
        let intake = Intake::new();
        let first = transition(&intake, &context, Event::answer(text.clone())).unwrap();
        let second = transition(&intake, &context, Event::answer(text)).unwrap();
        prop_assert_eq!(first.new_state, second.new_state);
        prop_assert_eq!(first.effects, second.effects);
    }

    /// Answers sent while a collaborator is in flight are rejected
    #[test]
    fn prop_busy_rejects_answers(
        state in prop_oneof![
            Just(IntakeState::ExtractingSymptoms),
            Just(IntakeState::AnalyzingImage),
            Just(IntakeState::GeneratingAdvice),
            Just(IntakeState::AnsweringFollowUp),
        ],
        text in arb_answer(),
    ) {
        let intake = Intake { state, ..Intake::default() };
        let context = IntakeContext::new("prop-session");
        let answer = transition(&intake, &context, Event::answer(text.clone()));
        prop_assert_eq!(answer.unwrap_err(), TransitionError::Busy);
        let question = transition(&intake, &context, Event::follow_up(text));
        prop_assert_eq!(question.unwrap_err(), TransitionError::Busy);
    }
}
