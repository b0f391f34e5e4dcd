//! Plain-language interpretation of a symptom set
//!
//! Informational only. The result is shown to the patient and stored with
//! the turn, but never feeds back into the triage level.

use crate::model::SymptomRecord;

struct Pattern {
    requires: &'static [&'static str],
    note: &'static str,
}

static PATTERNS: &[Pattern] = &[
    Pattern {
        requires: &["fever", "cough", "fatigue"],
        note: "These symptoms may indicate influenza or another viral infection.",
    },
    Pattern {
        requires: &["headache", "neck stiffness", "fever"],
        note: "These symptoms could suggest meningitis. Seek immediate medical attention.",
    },
    Pattern {
        requires: &["chest pain", "shortness of breath"],
        note: "These could be signs of a cardiac emergency. Immediate care is recommended.",
    },
    Pattern {
        requires: &["abdominal pain", "vomiting", "fever"],
        note: "Possible appendicitis or GI infection. Consult a doctor.",
    },
];

pub const NO_PATTERN: &str = "No specific condition detected.";

/// Note for the first pattern fully contained in the record
pub fn interpret_symptoms(record: &SymptomRecord) -> String {
    PATTERNS
        .iter()
        .find(|p| p.requires.iter().all(|s| record.has(s)))
        .map_or(NO_PATTERN, |p| p.note)
        .to_string()
}
