//! Events that can occur during an intake

use crate::model::{SymptomRecord, VisualFinding};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserAnswer {
        text: String,
    },
    FollowUpQuestion {
        text: String,
    },

    // Collaborator events
    SymptomsExtracted {
        /// Description the record was extracted from
        text: String,
        record: SymptomRecord,
    },
    ImageAnalyzed {
        finding: VisualFinding,
    },
    AdviceReady {
        advice: String,
        emergency: bool,
        /// Level suggested by the advice text, never authoritative
        advisory_level: Option<u8>,
    },
    FollowUpAnswered {
        question: String,
        answer: String,
    },
}

impl Event {
    pub fn answer(text: impl Into<String>) -> Self {
        Event::UserAnswer { text: text.into() }
    }

    pub fn follow_up(text: impl Into<String>) -> Self {
        Event::FollowUpQuestion { text: text.into() }
    }
}
