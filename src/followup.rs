//! Post-intake follow-up questions
//!
//! Once the intake is complete and advice was given, the patient may keep
//! asking questions until they say goodbye. The model reply is checked and
//! softened here; the model call itself lives in the advice generators.

use crate::model::FollowUpRequest;
use std::collections::BTreeSet;

/// Earlier turns sent along with each question
pub const HISTORY_TURNS: usize = 5;

pub const FOLLOW_UP_INVITE: &str =
    "You may now ask follow-up questions about your condition. Say 'exit' when you are done.";

pub const GOODBYE: &str = "Take care! I'm always here if you need me.";

/// Used when the model fails or dodges the question
pub const FALLBACK_REPLY: &str = "I'm not sure I can confidently answer that based on the information available. \
It's best to consult a licensed healthcare provider for this particular concern.";

const REASSURANCE: &str = "If you're ever unsure or your symptoms change, it's perfectly okay to check in with a doctor. \
You're doing the right thing by staying informed and taking care of yourself.";

const RISK_NOTE: &str = "Just to be safe: symptoms like chest pain, trouble breathing, or confusion \
can sometimes signal a serious issue. I recommend speaking to a doctor or visiting a clinic promptly.";

const EXIT_WORDS: &[&str] = &["exit", "quit", "thank you", "bye"];

const WEAK_PHRASES: &[&str] = &[
    "i'm just an ai",
    "i cannot help with that",
    "i don't know",
    "i'm not sure",
    "as an ai",
    "i am an ai language model",
];

const SOFT_RED_FLAGS: &[&str] = &[
    "chest pain",
    "shortness of breath",
    "difficulty breathing",
    "confusion",
    "loss of consciousness",
    "severe headache",
    "blurred vision",
    "uncontrolled bleeding",
    "numbness",
    "stiff neck",
    "blue lips",
    "not responding",
    "can't wake up",
];

/// The patient is ending the follow-up conversation
pub fn is_exit(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    EXIT_WORDS.contains(&text.as_str())
}

/// Opening line matched to the reported symptom group
pub fn empathy_line(symptoms: &BTreeSet<String>) -> Option<&'static str> {
    if symptoms.is_empty() {
        return None;
    }
    let line = if mentions(symptoms, &["fever", "chills", "body ache", "headache"]) {
        "I know that kind of discomfort can really wear you down. Let's manage it safely."
    } else if mentions(symptoms, &["rash", "itching", "redness"]) {
        "I understand skin issues can feel alarming. Let's look at it calmly together."
    } else if mentions(symptoms, &["nausea", "vomiting", "stomach pain"]) {
        "I know stomach issues are never pleasant. I'll help guide you through."
    } else if mentions(symptoms, &["cough", "sore throat", "cold", "flu"]) {
        "That sounds uncomfortable. Let me help you feel more in control."
    } else {
        "I'm here to support you with any concerns you're feeling."
    };
    Some(line)
}

fn mentions(symptoms: &BTreeSet<String>, group: &[&str]) -> bool {
    group.iter().any(|s| symptoms.contains(*s))
}

/// Empty, or a non-answer the patient should not be shown
pub fn is_weak_reply(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower.is_empty() || WEAK_PHRASES.iter().any(|p| lower.contains(p))
}

fn with_reassurance(text: &str) -> String {
    let text = text.trim();
    if text
        .to_lowercase()
        .contains("does not replace professional medical advice")
    {
        return text.to_string();
    }
    format!("{text}\n\n{REASSURANCE}")
}

/// Caution note when the question or the reported symptoms mention a red flag
pub fn soft_risk_note(question: &str, symptoms: &BTreeSet<String>) -> Option<&'static str> {
    let mut haystack = question.to_lowercase();
    for symptom in symptoms {
        haystack.push(' ');
        haystack.push_str(symptom);
    }
    SOFT_RED_FLAGS
        .iter()
        .any(|flag| haystack.contains(flag))
        .then_some(RISK_NOTE)
}

/// Turn the raw model output (if any) into the reply shown to the patient
pub fn finish_reply(raw: Option<&str>, request: &FollowUpRequest) -> String {
    let mut reply = match raw {
        Some(text) if !is_weak_reply(text) => with_reassurance(text),
        _ => FALLBACK_REPLY.to_string(),
    };
    if let Some(note) = soft_risk_note(&request.question, &request.symptoms) {
        reply.push_str("\n\n");
        reply.push_str(note);
    }
    reply
}
