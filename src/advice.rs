//! Advice generators
//!
//! `TemplateAdvisor` renders fixed prose from the intake answers and needs
//! nothing external. `LlmAdvisor` asks a language model and falls back to
//! fixed text on error or timeout. Both sit behind `AdviceGenerator`; the
//! safety filter runs on whatever they return.
//!
//! Follow-up questions take the same route. Without a model there is no
//! answer and the patient gets the fixed follow-up fallback.

use crate::followup::empathy_line;
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, LlmService};
use crate::model::{AdviceRequest, FollowUpRequest, TriageLevel};
use crate::runtime::{Advice, AdviceGenerator};
use async_trait::async_trait;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::timeout;

/// Returned when the model fails, times out or answers with nothing
pub const FALLBACK_ADVICE: &str = "I'm not able to give tailored guidance right now. \
Please follow the next step above, and consult a licensed healthcare provider if your symptoms change or worsen.";

const DISCLAIMER: &str = "This guidance is general information and does not replace professional medical advice.";

static ESI_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*\**final esi level:?\**[ \t]*(\d)\**[ \t]*$\n?")
        .expect("Invalid ESI tag regex")
});

// ============================================================================
// Template Advisor
// ============================================================================

/// Deterministic advice built from the intake answers
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateAdvisor;

impl TemplateAdvisor {
    pub fn render(request: &AdviceRequest) -> String {
        let mut out = String::new();

        match request.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                let _ = write!(out, "Thank you, {name}. ");
            }
            None => out.push_str("Thank you. "),
        }

        if request.symptoms.is_empty() {
            out.push_str("I couldn't match your description to specific symptoms.");
        } else {
            let symptoms = request.symptoms.iter().cloned().collect::<Vec<_>>().join(", ");
            let _ = write!(out, "You reported {symptoms}");
            if let Some(severity) = &request.severity {
                let _ = write!(out, " at a {severity} level");
            }
            if let Some(duration) = request.duration.as_deref().filter(|d| !d.trim().is_empty()) {
                let _ = write!(out, " ({})", duration.trim());
            }
            out.push('.');
        }

        let _ = write!(out, "\n\n{}", level_guidance(request.triage.level));

        let care = self_care_tips(request);
        if !care.is_empty() {
            out.push_str("\n\nWhile you wait:");
            for tip in care {
                let _ = write!(out, "\n- {tip}");
            }
        }

        let _ = write!(out, "\n\n{DISCLAIMER}");
        out
    }
}

fn level_guidance(level: TriageLevel) -> &'static str {
    match level {
        TriageLevel::Resuscitation | TriageLevel::Emergent => {
            "Your answers point to a situation that needs prompt in-person care. \
             Please do not wait for your symptoms to settle on their own."
        }
        TriageLevel::Urgent => {
            "Your symptoms should be looked at by a clinician today."
        }
        TriageLevel::LessUrgent => {
            "This does not appear to be an emergency, but booking a consultation is a good idea."
        }
        TriageLevel::NonUrgent => {
            "Your symptoms sound manageable at home for now. Keep an eye on how they develop."
        }
    }
}

fn self_care_tips(request: &AdviceRequest) -> Vec<&'static str> {
    let has = |s: &str| request.symptoms.contains(s);
    let mut tips = Vec::new();
    if has("fever") || has("chills") {
        tips.push("Rest and drink plenty of fluids.");
    }
    if has("cough") || has("sore throat") || has("runny nose") {
        tips.push("Warm drinks and humidified air can ease throat and airway irritation.");
    }
    if has("vomiting") || has("diarrhea") || has("nausea") {
        tips.push("Take small, frequent sips of water or an oral rehydration solution.");
    }
    if has("headache") {
        tips.push("Rest in a quiet, dim room and avoid screens.");
    }
    if has("rash") {
        tips.push("Keep the area clean and avoid scratching.");
    }
    tips
}

#[async_trait]
impl AdviceGenerator for TemplateAdvisor {
    async fn generate_advice(&self, request: &AdviceRequest) -> Advice {
        Advice::plain(Self::render(request))
    }

    async fn answer_follow_up(&self, _request: &FollowUpRequest) -> Option<String> {
        None
    }
}

// ============================================================================
// LLM Advisor
// ============================================================================

const ADVICE_SYSTEM_PROMPT: &str = r"You are a cautious, empathetic triage nurse assistant speaking directly to the patient.
Give short, general health guidance based on the intake below. Do not diagnose. Do not recommend prescription drugs.
Use the Emergency Severity Index (levels 1-5, 1 most urgent) to judge urgency.
End your reply with the tag on its own line: Final ESI Level: N";

const FOLLOW_UP_SYSTEM_PROMPT: &str = r"You are a professional, cautious and empathetic nurse assistant speaking directly to the patient after their intake.
Answer their question with short, calm, first-person general guidance personalized to the context below.
Do not diagnose, do not recommend prescription drugs and do not guarantee outcomes.
End with a brief note that this is not medical advice.";

/// Advice from a language model, bounded by a deadline
pub struct LlmAdvisor {
    llm: Arc<dyn LlmService>,
    deadline: Duration,
}

impl LlmAdvisor {
    pub fn new(llm: Arc<dyn LlmService>, deadline: Duration) -> Self {
        Self { llm, deadline }
    }

    fn build_request(request: &AdviceRequest) -> LlmRequest {
        let mut prompt = String::from("Patient intake:\n");
        if let Some(name) = &request.name {
            let _ = writeln!(prompt, "Name: {name}");
        }
        if let Some(age) = &request.age {
            let _ = writeln!(prompt, "Age: {age}");
        }
        let symptoms = if request.symptoms.is_empty() {
            "none recognized".to_string()
        } else {
            request.symptoms.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        let _ = writeln!(prompt, "Symptoms: {symptoms}");
        if let Some(severity) = &request.severity {
            let _ = writeln!(prompt, "Severity: {severity}");
        }
        if let Some(duration) = &request.duration {
            let _ = writeln!(prompt, "Duration: {duration}");
        }
        let _ = writeln!(
            prompt,
            "Rule-based triage: level {} ({}). {}",
            request.triage.level.number(),
            request.triage.level.label(),
            request.triage.reason
        );

        LlmRequest::single(
            Some(ADVICE_SYSTEM_PROMPT.to_string()),
            vec![ContentBlock::text(prompt)],
        )
        .with_max_tokens(600)
    }

    fn build_follow_up(request: &FollowUpRequest) -> LlmRequest {
        let mut system = format!("{FOLLOW_UP_SYSTEM_PROMPT}\n\nPatient info:\n");
        let _ = writeln!(system, "- Name: {}", request.name.as_deref().unwrap_or("Unknown"));
        let _ = writeln!(system, "- Age: {}", request.age.as_deref().unwrap_or("Unknown"));
        let _ = writeln!(system, "- Sex: {}", request.sex.as_deref().unwrap_or("Unspecified"));
        let symptoms = request.symptoms.iter().cloned().collect::<Vec<_>>().join(", ");
        let _ = writeln!(system, "- Reported symptoms: {symptoms}");
        if let Some(triage) = &request.triage {
            let _ = writeln!(
                system,
                "- Rule-based triage: level {} ({})",
                triage.level.number(),
                triage.level.label()
            );
        }
        let name = request.name.as_deref().unwrap_or("there");
        let _ = write!(system, "\nGreet the patient as {name}.");
        if let Some(line) = empathy_line(&request.symptoms) {
            let _ = write!(system, " Set the tone with: {line}");
        }

        let mut messages = Vec::with_capacity(request.history.len() * 2 + 1);
        for turn in &request.history {
            messages.push(LlmMessage::user(turn.question.clone()));
            messages.push(LlmMessage::assistant(turn.answer.clone()));
        }
        messages.push(LlmMessage::user(request.question.clone()));

        LlmRequest {
            system: Some(system),
            messages,
            max_tokens: Some(500),
        }
    }
}

/// Remove the `Final ESI Level: N` line, returning the remaining prose and the level
pub fn split_esi_tag(text: &str) -> (String, Option<u8>) {
    let level = ESI_TAG
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .filter(|n| TriageLevel::from_number(*n).is_some());
    let prose = ESI_TAG.replace_all(text, "").trim().to_string();
    (prose, level)
}

fn advice_from_response(response: &LlmResponse) -> Advice {
    let (text, advisory_level) = split_esi_tag(&response.text());
    if text.is_empty() {
        return Advice {
            text: FALLBACK_ADVICE.to_string(),
            advisory_level,
        };
    }
    Advice {
        text,
        advisory_level,
    }
}

#[async_trait]
impl AdviceGenerator for LlmAdvisor {
    async fn generate_advice(&self, request: &AdviceRequest) -> Advice {
        let llm_request = Self::build_request(request);
        match timeout(self.deadline, self.llm.complete(&llm_request)).await {
            Ok(Ok(response)) => advice_from_response(&response),
            Ok(Err(e)) => {
                tracing::warn!(error = %e.message, "Advice generation failed, using fallback");
                Advice::plain(FALLBACK_ADVICE)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.deadline.as_secs(),
                    "Advice generation timed out, using fallback"
                );
                Advice::plain(FALLBACK_ADVICE)
            }
        }
    }

    async fn answer_follow_up(&self, request: &FollowUpRequest) -> Option<String> {
        let llm_request = Self::build_follow_up(request);
        match timeout(self.deadline, self.llm.complete(&llm_request)).await {
            Ok(Ok(response)) => Some(response.text()),
            Ok(Err(e)) => {
                tracing::warn!(error = %e.message, "Follow-up answer failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.deadline.as_secs(),
                    "Follow-up answer timed out"
                );
                None
            }
        }
    }
}
