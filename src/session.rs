//! Append-only session audit log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{PatientProfile, SymptomRecord, TriageResult};

/// One accepted turn of the dialogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEntry {
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    pub system_output: String,
    #[serde(default)]
    pub extracted_symptoms: Option<SymptomRecord>,
    #[serde(default)]
    pub triage_result: Option<TriageResult>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl TurnEntry {
    pub fn new(user_input: impl Into<String>, system_output: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user_input: user_input.into(),
            system_output: system_output.into(),
            extracted_symptoms: None,
            triage_result: None,
            reasoning: None,
        }
    }
}

/// Audit record of one intake session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub profile: Option<PatientProfile>,
    #[serde(default)]
    pub entries: Vec<TurnEntry>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, profile: Option<PatientProfile>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            profile,
            entries: Vec::new(),
        }
    }

    /// Entries are never edited or removed once appended
    pub fn append(&mut self, entry: TurnEntry) {
        self.entries.push(entry);
    }
}
