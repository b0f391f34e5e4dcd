//! Database schema and row types

use crate::model::PatientProfile;
use crate::state_machine::Intake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    profile TEXT,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);

CREATE TABLE IF NOT EXISTS session_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    sequence_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    user_input TEXT NOT NULL,
    system_output TEXT NOT NULL,
    extracted_symptoms TEXT,
    triage_result TEXT,
    reasoning TEXT,

    UNIQUE (session_id, sequence_id),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_session ON session_entries(session_id, sequence_id);

CREATE TABLE IF NOT EXISTS symptom_counts (
    symptom TEXT PRIMARY KEY,
    count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS patients (
    patient_key TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    age TEXT NOT NULL,
    sex TEXT NOT NULL,
    visits INTEGER NOT NULL DEFAULT 0,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patient_symptoms (
    patient_key TEXT NOT NULL,
    symptom TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,

    PRIMARY KEY (patient_key, symptom),
    FOREIGN KEY (patient_key) REFERENCES patients(patient_key) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY,
    profile TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Session header row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub profile: Option<PatientProfile>,
    pub state: Intake,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How often a symptom has appeared across completed intakes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomTrend {
    pub symptom: String,
    pub count: i64,
}

/// Visit history for one patient key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub patient_key: String,
    pub name: String,
    pub age: String,
    pub sex: String,
    pub visits: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// At most three, most frequent first
    pub top_symptoms: Vec<String>,
}
