//! Property-based tests for the triage rules
//!
//! These tests verify the escalation invariants across arbitrary records
//! and profiles.

use super::*;
use crate::model::{PatientProfile, Severity, SymptomRecord, TriageLevel};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

const SYMPTOM_POOL: &[&str] = &[
    "chest pain",
    "shortness of breath",
    "dizziness",
    "fever",
    "headache",
    "cough",
    "fatigue",
    "nausea",
    "rash",
];

const CONDITION_POOL: &[&str] = &["hypertension", "heart disease", "diabetes", "asthma", "arthritis"];

const RISK_POOL: &[&str] = &["immunocompromised", "smoker", "pregnant"];

fn arb_severity() -> impl Strategy<Value = Option<Severity>> {
    prop_oneof![
        Just(None),
        Just(Some(Severity::Mild)),
        Just(Some(Severity::Moderate)),
        Just(Some(Severity::Severe)),
        Just(Some(Severity::High)),
        "[a-z]{3,8}".prop_map(|t| Severity::parse(&t)),
    ]
}

fn arb_duration() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("long".to_string())),
        Just(Some("3 days".to_string())),
        Just(Some("since yesterday".to_string())),
    ]
}

fn arb_record() -> impl Strategy<Value = SymptomRecord> {
    (
        proptest::sample::subsequence(SYMPTOM_POOL, 0..=SYMPTOM_POOL.len()),
        arb_severity(),
        arb_duration(),
    )
        .prop_map(|(symptoms, severity, duration)| SymptomRecord {
            symptoms: symptoms.iter().map(ToString::to_string).collect(),
            severity,
            duration,
        })
}

fn arb_profile() -> impl Strategy<Value = PatientProfile> {
    (
        0u32..110,
        proptest::sample::subsequence(CONDITION_POOL, 0..=CONDITION_POOL.len()),
        proptest::sample::subsequence(RISK_POOL, 0..=RISK_POOL.len()),
    )
        .prop_map(|(age, conditions, risks)| PatientProfile::new(age, conditions, risks))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Escalation only ever tightens the base level
    #[test]
    fn prop_final_level_never_exceeds_base(record in arb_record(), profile in arb_profile()) {
        let base = classify(&record, None);
        let escalated = classify(&record, Some(&profile));
        prop_assert!(escalated.level <= base.level);
        prop_assert!(escalated.reason.starts_with(&base.reason));
    }

    /// Cardiac and respiratory symptoms are at least emergent for any profile
    #[test]
    fn prop_cardiac_respiratory_at_least_emergent(
        record in arb_record(),
        profile in proptest::option::of(arb_profile()),
    ) {
        let result = classify(&record, profile.as_ref());
        if record.has_any(&["chest pain", "shortness of breath"]) {
            prop_assert!(result.level <= TriageLevel::Emergent);
        }
    }

    #[test]
    fn prop_elderly_fever_at_least_emergent(record in arb_record(), profile in arb_profile()) {
        let result = classify(&record, Some(&profile));
        if profile.age >= 65 && record.has("fever") {
            prop_assert!(result.level <= TriageLevel::Emergent);
        }
    }

    #[test]
    fn prop_classification_is_deterministic(record in arb_record(), profile in proptest::option::of(arb_profile())) {
        let first = classify(&record, profile.as_ref());
        let second = classify(&record, profile.as_ref());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_recommendation_matches_level(record in arb_record(), profile in proptest::option::of(arb_profile())) {
        let result = classify(&record, profile.as_ref());
        prop_assert_eq!(result.recommendation.as_str(), result.level.recommendation());
        prop_assert_eq!(result.escalations.len(), result.reason.matches(" (").count());
    }
}
