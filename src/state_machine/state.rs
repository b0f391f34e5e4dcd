//! Intake state types

use crate::model::{
    severity_or_none, FollowUpTurn, PatientProfile, Severity, SymptomRecord, TriageResult,
    VisualFinding,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Slots
// ============================================================================

/// One question of the intake dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Name,
    Age,
    Sex,
    Symptoms,
    Severity,
    Duration,
    ExtraInfo,
}

impl Slot {
    /// Fixed question order
    pub const ORDER: [Slot; 7] = [
        Slot::Name,
        Slot::Age,
        Slot::Sex,
        Slot::Symptoms,
        Slot::Severity,
        Slot::Duration,
        Slot::ExtraInfo,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Slot::Name => "name",
            Slot::Age => "age",
            Slot::Sex => "sex",
            Slot::Symptoms => "symptoms",
            Slot::Severity => "severity",
            Slot::Duration => "duration",
            Slot::ExtraInfo => "extra_info",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Slot::Name => "May I know your name?",
            Slot::Age => "How old are you?",
            Slot::Sex => "What is your sex? (male, female, other)",
            Slot::Symptoms => "What symptoms are you experiencing?",
            Slot::Severity => "How severe are they? (mild, moderate, severe)",
            Slot::Duration => "How long have you had these symptoms?",
            Slot::ExtraInfo => "Do you have any other health issues you'd like to mention?",
        }
    }
}

pub const IMAGE_OFFER_PROMPT: &str =
    "Would you like to upload an image (rash, swelling, etc.) for visual analysis? (yes/no)";

pub const IMAGE_PATH_PROMPT: &str =
    "Please enter the image file name, relative to the upload folder (e.g. rash.jpg):";

// ============================================================================
// Conversation Memory
// ============================================================================

/// Everything collected so far, one typed field per slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    pub name: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    #[serde(default)]
    pub symptoms: BTreeSet<String>,
    #[serde(default, deserialize_with = "severity_or_none")]
    pub severity: Option<Severity>,
    pub duration: Option<String>,
    pub extra_info: Option<String>,

    // Derived once every slot is filled
    pub triage: Option<TriageResult>,
    pub reasoning: Option<String>,
    pub advice: Option<String>,
    #[serde(default)]
    pub emergency: bool,
    pub visual_result: Option<VisualFinding>,
    pub advisory_level: Option<u8>,

    // Post-intake questions, oldest first
    #[serde(default)]
    pub follow_ups: Vec<FollowUpTurn>,
    #[serde(default)]
    pub follow_up_closed: bool,
}

impl ConversationMemory {
    pub fn is_filled(&self, slot: Slot) -> bool {
        match slot {
            Slot::Name => self.name.is_some(),
            Slot::Age => self.age.is_some(),
            Slot::Sex => self.sex.is_some(),
            Slot::Symptoms => !self.symptoms.is_empty(),
            Slot::Severity => self.severity.is_some(),
            Slot::Duration => self.duration.is_some(),
            Slot::ExtraInfo => self.extra_info.is_some(),
        }
    }

    /// Store a free-text answer. Blank answers leave the slot empty.
    pub fn store_answer(&mut self, slot: Slot, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let value = Some(text.to_string());
        match slot {
            Slot::Name => self.name = value,
            Slot::Age => self.age = value,
            Slot::Sex => self.sex = value,
            Slot::Symptoms => self.symptoms = crate::model::normalize_set([text]),
            Slot::Severity => self.severity = Severity::parse(text),
            Slot::Duration => self.duration = value,
            Slot::ExtraInfo => self.extra_info = value,
        }
    }

    /// Merge an extraction result. Only non-empty parts overwrite.
    pub fn store_extraction(&mut self, record: &SymptomRecord) {
        if !record.symptoms.is_empty() {
            self.symptoms.clone_from(&record.symptoms);
        }
        if let Some(severity) = &record.severity {
            self.severity = Some(severity.clone());
        }
        if let Some(duration) = &record.duration {
            self.duration = Some(duration.clone());
        }
    }

    /// The clinical slots as a record for the classifier
    pub fn symptom_record(&self) -> SymptomRecord {
        SymptomRecord {
            symptoms: self.symptoms.clone(),
            severity: self.severity.clone(),
            duration: self.duration.clone(),
        }
    }
}

// ============================================================================
// Intake State
// ============================================================================

/// Where the dialogue currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeState {
    /// Waiting for the answer to `Slot::ORDER[current_index]`
    #[default]
    AwaitingAnswer,

    /// Symptom description handed to the extractor
    ExtractingSymptoms,

    /// Asked whether the patient wants to upload an image
    OfferingImage,

    /// Waiting for the image file name
    AwaitingImagePath,

    /// Image handed to the classifier
    AnalyzingImage,

    /// Advice requested, safety filter pending
    GeneratingAdvice,

    /// Intake finished; follow-up questions are still accepted
    Complete,

    /// Follow-up question handed to the advice generator
    AnsweringFollowUp,
}

impl IntakeState {
    /// A collaborator call is in flight; user input is rejected
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            IntakeState::ExtractingSymptoms
                | IntakeState::AnalyzingImage
                | IntakeState::GeneratingAdvice
                | IntakeState::AnsweringFollowUp
        )
    }
}

/// Full intake: state, question cursor and collected memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Intake {
    pub state: IntakeState,
    /// Index into `Slot::ORDER`. Never decreases.
    pub current_index: usize,
    pub memory: ConversationMemory,
}

impl Intake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot the cursor points at, `None` once every slot is answered
    pub fn current_slot(&self) -> Option<Slot> {
        Slot::ORDER.get(self.current_index).copied()
    }

    /// Question to show for the current state, `None` while busy or once done
    pub fn next_prompt(&self) -> Option<&'static str> {
        match self.state {
            IntakeState::AwaitingAnswer => self.current_slot().map(Slot::prompt),
            IntakeState::OfferingImage => Some(IMAGE_OFFER_PROMPT),
            IntakeState::AwaitingImagePath => Some(IMAGE_PATH_PROMPT),
            IntakeState::ExtractingSymptoms
            | IntakeState::AnalyzingImage
            | IntakeState::GeneratingAdvice
            | IntakeState::Complete
            | IntakeState::AnsweringFollowUp => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self.state,
            IntakeState::Complete | IntakeState::AnsweringFollowUp
        )
    }

    /// Follow-up questions are accepted: advice was given and the patient
    /// has not said goodbye
    pub fn accepts_follow_up(&self) -> bool {
        self.state == IntakeState::Complete
            && self.memory.advice.is_some()
            && !self.memory.follow_up_closed
    }
}

// ============================================================================
// Context
// ============================================================================

/// Immutable per-session configuration
#[derive(Debug, Clone)]
pub struct IntakeContext {
    pub session_id: String,
    /// Risk profile, fixed for the whole session
    pub profile: Option<PatientProfile>,
    /// Offer the image sub-dialogue after the last slot
    pub image_step: bool,
}

impl IntakeContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            profile: None,
            image_step: false,
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: Option<PatientProfile>) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_image_step(mut self, enabled: bool) -> Self {
        self.image_step = enabled;
        self
    }
}
