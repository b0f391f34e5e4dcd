//! Effects produced by state transitions

use crate::model::{AdviceRequest, FollowUpRequest, PatientVisit};

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Text shown to the patient before the next prompt
    Reply { text: String },

    /// Run entity extraction over a symptom description
    ExtractSymptoms { text: String },

    /// Bump the public symptom trend counters
    RecordSymptomTrend { symptoms: Vec<String> },

    /// Classify an uploaded image
    AnalyzeImage { path: String },

    /// Produce advice prose, then pass it through the safety filter
    GenerateAdvice { request: AdviceRequest },

    /// Answer a post-intake question
    AnswerFollowUp { request: FollowUpRequest },

    /// Persist the new state
    PersistState,

    /// Append the finished intake to the patient's visit history
    RecordVisit { visit: PatientVisit },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }
}
