//! Base urgency rules

use super::escalation::apply_escalation;
use crate::model::{PatientProfile, Severity, SymptomRecord, TriageLevel, TriageResult};

/// Literal duration token the headache rule reacts to. Durations are not
/// bucketed, so "3 weeks" does not count.
const CHRONIC_DURATION: &str = "long";

/// Classify a record, then tighten the level for the given risk profile.
///
/// Pure: identical inputs always give identical output.
pub fn classify(record: &SymptomRecord, profile: Option<&PatientProfile>) -> TriageResult {
    let (level, reason) = base_assessment(record);
    let mut result = TriageResult {
        level,
        reason: reason.to_string(),
        recommendation: level.recommendation().to_string(),
        escalations: Vec::new(),
    };

    if let Some(profile) = profile {
        apply_escalation(&mut result, record, profile);
    }
    result
}

/// First matching base rule, ignoring any profile
pub fn base_assessment(record: &SymptomRecord) -> (TriageLevel, &'static str) {
    if record.has_any(&["chest pain", "shortness of breath"]) {
        return (TriageLevel::Emergent, "possible cardiac or respiratory issue");
    }

    if record.has("fever") && record.severity == Some(Severity::High) {
        return (TriageLevel::Urgent, "high fever can indicate infection");
    }

    let long_duration = record
        .duration
        .as_deref()
        .is_some_and(|d| d.trim().eq_ignore_ascii_case(CHRONIC_DURATION));
    if record.has("headache") && long_duration {
        return (TriageLevel::LessUrgent, "chronic headache may require consult");
    }

    if record.is_empty() {
        (TriageLevel::NonUrgent, "symptoms unclear or not recognized")
    } else {
        (TriageLevel::NonUrgent, "general symptoms detected")
    }
}
