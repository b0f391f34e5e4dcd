//! Safety checks around the dialogue
//!
//! Two independent layers:
//! 1. Input guardrails classify free text as vague or unsafe. Symptom
//!    descriptions are always extracted; the screen only shapes the reply
//!    around them. Follow-up questions that fail the screen never reach the
//!    model.
//! 2. The red-flag filter inspects the final symptom set and replaces the
//!    advice with an emergency alert when needed.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::Severity;
use crate::runtime::{FilteredAdvice, SafetyFilter};

// ============================================================================
// Input Guardrails
// ============================================================================

pub const VAGUE_REPLY: &str =
    "Can you describe your symptoms in more detail? For example, any pain, fever, nausea, or fatigue?";

pub const UNSAFE_REPLY: &str = "I can't help with that request. If you are thinking about harming yourself, \
please contact your local emergency number or a crisis line right away.";

/// Shown alongside the dialogue whenever a symptom description mentions self-harm
pub const CRISIS_NOTE: &str = "If you are thinking about harming yourself or have taken too much of a medicine, \
please contact your local emergency number or a crisis line right away.";

static VAGUE_PHRASES: &[&str] = &[
    "i feel bad",
    "i feel weird",
    "not feeling good",
    "unwell",
    "idk what's wrong",
];

static UNSAFE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)fake (a )?fever",
        r"(?i)suicide|kill myself|end my life",
        r"(?i)overdose|take too much",
        r"(?i)how to get sick",
        r"(?i)fake (injur|illness)",
        r"(?i)how to pass a drug test",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("Invalid guardrail regex pattern"))
    .collect()
});

/// Outcome of screening a symptom description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputScreen {
    Clear,
    /// Too vague to extract anything useful
    Vague,
    /// Asks for something the assistant must not help with
    Unsafe,
}

impl InputScreen {
    pub fn reply(self) -> &'static str {
        match self {
            InputScreen::Clear => "",
            InputScreen::Vague => VAGUE_REPLY,
            InputScreen::Unsafe => UNSAFE_REPLY,
        }
    }
}

/// Screen free text. Unsafe wins over vague.
pub fn screen_input(text: &str) -> InputScreen {
    if UNSAFE_PATTERNS.iter().any(|re| re.is_match(text)) {
        return InputScreen::Unsafe;
    }
    let lower = text.to_lowercase();
    if VAGUE_PHRASES.iter().any(|p| lower.contains(p)) {
        return InputScreen::Vague;
    }
    InputScreen::Clear
}

// ============================================================================
// Red-Flag Filter
// ============================================================================

pub const EMERGENCY_ALERT: &str = "Emergency Alert: your symptoms may indicate a life-threatening emergency.\n\
Please seek immediate medical attention or go to the nearest emergency facility.\n\n\
This assistant cannot provide a safe diagnosis in emergencies.";

static RED_FLAGS: &[&str] = &[
    "chest pain",
    "shortness of breath",
    "loss of consciousness",
    "uncontrolled bleeding",
    "seizure",
    "stroke",
    "numbness",
    "slurred speech",
    "severe abdominal pain",
    "suicidal thoughts",
    "blurred vision",
    "confusion",
    "high fever in infant",
];

/// Default safety filter: emergency when severity is severe or any red-flag
/// phrase appears in the joined symptom text
#[derive(Debug, Clone, Copy, Default)]
pub struct RedFlagFilter;

impl RedFlagFilter {
    pub fn is_emergency(symptoms: &BTreeSet<String>, severity: Option<&Severity>) -> bool {
        if severity == Some(&Severity::Severe) {
            return true;
        }
        let joined = symptoms
            .iter()
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        RED_FLAGS.iter().any(|flag| joined.contains(flag))
    }
}

impl SafetyFilter for RedFlagFilter {
    fn filter(
        &self,
        symptoms: &BTreeSet<String>,
        severity: Option<&Severity>,
        advice: String,
    ) -> FilteredAdvice {
        if Self::is_emergency(symptoms, severity) {
            tracing::info!(symptoms = ?symptoms, "Red flag detected, replacing advice");
            return FilteredAdvice {
                text: EMERGENCY_ALERT.to_string(),
                emergency: true,
            };
        }
        FilteredAdvice {
            text: advice,
            emergency: false,
        }
    }
}
