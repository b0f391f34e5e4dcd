//! Trait abstractions for runtime I/O
//!
//! The executor only talks to collaborators through these traits, so every
//! one of them can be swapped for a mock in tests.

use crate::model::{
    AdviceRequest, FollowUpRequest, PatientProfile, PatientVisit, Severity, SymptomRecord,
    VisualFinding,
};
use crate::session::{SessionRecord, TurnEntry};
use crate::state_machine::Intake;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Turns a free-text description into a symptom record
#[async_trait]
pub trait SymptomExtractor: Send + Sync {
    /// Never fails; an empty record means nothing was recognized
    async fn extract(&self, text: &str) -> SymptomRecord;
}

/// Advice prose plus any level the prose itself suggested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advice {
    pub text: String,
    pub advisory_level: Option<u8>,
}

impl Advice {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            advisory_level: None,
        }
    }
}

/// Produces patient-facing advice
#[async_trait]
pub trait AdviceGenerator: Send + Sync {
    /// Never fails; implementations fall back to fixed text
    async fn generate_advice(&self, request: &AdviceRequest) -> Advice;

    /// Raw answer to a post-intake question, `None` when none could be produced
    async fn answer_follow_up(&self, request: &FollowUpRequest) -> Option<String>;
}

/// Advice after the safety filter has had its say
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredAdvice {
    pub text: String,
    pub emergency: bool,
}

/// Last check before advice reaches the patient
pub trait SafetyFilter: Send + Sync {
    fn filter(
        &self,
        symptoms: &BTreeSet<String>,
        severity: Option<&Severity>,
        advice: String,
    ) -> FilteredAdvice;
}

/// Labels an uploaded image
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Returns `VisualFinding::error()` on any failure
    async fn classify(&self, path: &str) -> VisualFinding;
}

/// Persistence for sessions, history and profiles
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create the session row (entries are appended separately)
    async fn create_session(&self, record: &SessionRecord) -> Result<(), String>;

    /// Load a session header with all its entries, in order
    async fn load_session(&self, session_id: &str) -> Result<SessionRecord, String>;

    async fn append_entry(&self, session_id: &str, entry: &TurnEntry) -> Result<(), String>;

    async fn load_entries(&self, session_id: &str) -> Result<Vec<TurnEntry>, String>;

    /// Persist the full intake as JSON
    async fn save_state(&self, session_id: &str, intake: &Intake) -> Result<(), String>;

    async fn load_state(&self, session_id: &str) -> Result<Intake, String>;

    /// Bump the per-symptom trend counters
    async fn record_symptoms(&self, symptoms: &[String]) -> Result<(), String>;

    async fn record_visit(&self, visit: &PatientVisit) -> Result<(), String>;

    async fn load_profile(&self, user_id: &str) -> Result<Option<PatientProfile>, String>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SymptomExtractor + ?Sized> SymptomExtractor for Arc<T> {
    async fn extract(&self, text: &str) -> SymptomRecord {
        (**self).extract(text).await
    }
}

#[async_trait]
impl<T: AdviceGenerator + ?Sized> AdviceGenerator for Arc<T> {
    async fn generate_advice(&self, request: &AdviceRequest) -> Advice {
        (**self).generate_advice(request).await
    }

    async fn answer_follow_up(&self, request: &FollowUpRequest) -> Option<String> {
        (**self).answer_follow_up(request).await
    }
}

impl<T: SafetyFilter + ?Sized> SafetyFilter for Arc<T> {
    fn filter(
        &self,
        symptoms: &BTreeSet<String>,
        severity: Option<&Severity>,
        advice: String,
    ) -> FilteredAdvice {
        (**self).filter(symptoms, severity, advice)
    }
}

#[async_trait]
impl<T: ImageClassifier + ?Sized> ImageClassifier for Arc<T> {
    async fn classify(&self, path: &str) -> VisualFinding {
        (**self).classify(path).await
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), String> {
        (**self).create_session(record).await
    }

    async fn load_session(&self, session_id: &str) -> Result<SessionRecord, String> {
        (**self).load_session(session_id).await
    }

    async fn append_entry(&self, session_id: &str, entry: &TurnEntry) -> Result<(), String> {
        (**self).append_entry(session_id, entry).await
    }

    async fn load_entries(&self, session_id: &str) -> Result<Vec<TurnEntry>, String> {
        (**self).load_entries(session_id).await
    }

    async fn save_state(&self, session_id: &str, intake: &Intake) -> Result<(), String> {
        (**self).save_state(session_id, intake).await
    }

    async fn load_state(&self, session_id: &str) -> Result<Intake, String> {
        (**self).load_state(session_id).await
    }

    async fn record_symptoms(&self, symptoms: &[String]) -> Result<(), String> {
        (**self).record_symptoms(symptoms).await
    }

    async fn record_visit(&self, visit: &PatientVisit) -> Result<(), String> {
        (**self).record_visit(visit).await
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<PatientProfile>, String> {
        (**self).load_profile(user_id).await
    }
}

/// The collaborator set every session runs with, built once at startup
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn SymptomExtractor>,
    pub advisor: Arc<dyn AdviceGenerator>,
    pub safety: Arc<dyn SafetyFilter>,
    pub vision: Arc<dyn ImageClassifier>,
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;

/// Adapter to use Database as a `SessionStore`
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for DatabaseStorage {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), String> {
        self.db.create_session(record).map_err(|e| e.to_string())
    }

    async fn load_session(&self, session_id: &str) -> Result<SessionRecord, String> {
        self.db.get_session_record(session_id).map_err(|e| e.to_string())
    }

    async fn append_entry(&self, session_id: &str, entry: &TurnEntry) -> Result<(), String> {
        self.db
            .append_entry(session_id, entry)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn load_entries(&self, session_id: &str) -> Result<Vec<TurnEntry>, String> {
        self.db.get_entries(session_id).map_err(|e| e.to_string())
    }

    async fn save_state(&self, session_id: &str, intake: &Intake) -> Result<(), String> {
        self.db
            .update_session_state(session_id, intake)
            .map_err(|e| e.to_string())
    }

    async fn load_state(&self, session_id: &str) -> Result<Intake, String> {
        let session = self.db.get_session(session_id).map_err(|e| e.to_string())?;
        Ok(session.state)
    }

    async fn record_symptoms(&self, symptoms: &[String]) -> Result<(), String> {
        self.db.increment_symptoms(symptoms).map_err(|e| e.to_string())
    }

    async fn record_visit(&self, visit: &PatientVisit) -> Result<(), String> {
        self.db.record_visit(visit).map_err(|e| e.to_string())
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<PatientProfile>, String> {
        self.db.get_profile(user_id).map_err(|e| e.to_string())
    }
}
