//! Final assessment report

use serde::Serialize;
use std::fmt::Write;

use crate::model::{TriageResult, VisualFinding};
use crate::state_machine::ConversationMemory;

pub const VISUAL_DISCLAIMER: &str = "This result is an automated prediction and not a diagnosis. \
Consult a healthcare provider for clinical decisions.";

/// Snapshot of a finished (or in-progress) intake for display
#[derive(Debug, Clone, Serialize)]
pub struct IntakeSummary {
    pub name: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub symptoms: Vec<String>,
    pub severity: Option<String>,
    pub duration: Option<String>,
    pub extra_info: Option<String>,
    pub reasoning: Option<String>,
    pub triage: Option<TriageResult>,
    pub advice: Option<String>,
    pub emergency: bool,
    pub visual_result: Option<VisualFinding>,
    pub advisory_level: Option<u8>,
}

impl IntakeSummary {
    pub fn from_memory(memory: &ConversationMemory) -> Self {
        Self {
            name: memory.name.clone(),
            age: memory.age.clone(),
            sex: memory.sex.clone(),
            symptoms: memory.symptoms.iter().cloned().collect(),
            severity: memory.severity.as_ref().map(ToString::to_string),
            duration: memory.duration.clone(),
            extra_info: memory.extra_info.clone(),
            reasoning: memory.reasoning.clone(),
            triage: memory.triage.clone(),
            advice: memory.advice.clone(),
            emergency: memory.emergency,
            visual_result: memory.visual_result.clone(),
            advisory_level: memory.advisory_level,
        }
    }

    /// Plain-text report shown to the patient when the intake completes
    pub fn render(&self) -> String {
        let mut out = String::new();
        let or = |value: &Option<String>, fallback: &str| {
            value.clone().unwrap_or_else(|| fallback.to_string())
        };

        // Writing into a String cannot fail
        let _ = writeln!(out, "FINAL ASSESSMENT REPORT");
        let _ = writeln!(out, "-------------------------------");
        let _ = writeln!(out, "Patient Name: {}", or(&self.name, "Unknown"));
        let _ = writeln!(
            out,
            "Age: {} | Sex: {}",
            or(&self.age, "Unknown"),
            or(&self.sex, "Unknown")
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Reported Symptoms: {}", self.symptoms.join(", "));
        let _ = writeln!(
            out,
            "Severity Level: {}",
            self.severity.as_deref().map_or_else(|| "Unknown".to_string(), capitalize)
        );
        let _ = writeln!(out, "Duration: {}", or(&self.duration, "Not specified"));
        let _ = writeln!(out, "Additional Notes: {}", or(&self.extra_info, "None provided"));

        if let Some(reasoning) = &self.reasoning {
            let _ = writeln!(out, "\nSymptom Interpretation:\n{reasoning}");
        }

        if let Some(triage) = &self.triage {
            let _ = writeln!(out, "\nTriage Level: {}", triage.level);
            let _ = writeln!(out, "Reason: {}", triage.reason);
            let _ = writeln!(out, "Next Step: {}", triage.recommendation);
        }

        let advice = self.advice.as_deref().unwrap_or("");
        if self.emergency {
            let _ = writeln!(out, "\nEMERGENCY DETECTED!\n-------------------------------\n{advice}");
        } else {
            let _ = writeln!(out, "\nHealth Guidance:\n{advice}");
        }

        if let Some(finding) = &self.visual_result {
            let _ = writeln!(out, "\nVisual Symptom Analysis:");
            let _ = writeln!(out, "Predicted Condition: {}", finding.label);
            let _ = writeln!(out, "Confidence Score: {:.2}", finding.confidence);
            let _ = writeln!(out, "{VISUAL_DISCLAIMER}");
        }

        out.push_str("-------------------------------");
        out
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
