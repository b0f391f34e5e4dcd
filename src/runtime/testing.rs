//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::executor::IntakeRuntime;
use super::traits::*;
use crate::model::{
    AdviceRequest, FollowUpRequest, PatientProfile, PatientVisit, SymptomRecord, VisualFinding,
};
use crate::safety::RedFlagFilter;
use crate::session::{SessionRecord, TurnEntry};
use crate::state_machine::{Intake, IntakeContext};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock Collaborators
// ============================================================================

/// Extractor that returns queued records, then empty ones
#[derive(Default)]
pub struct MockExtractor {
    records: Mutex<VecDeque<SymptomRecord>>,
    /// Texts it was asked to extract from
    pub calls: Mutex<Vec<String>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, record: SymptomRecord) {
        self.records.lock().unwrap().push_back(record);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SymptomExtractor for MockExtractor {
    async fn extract(&self, text: &str) -> SymptomRecord {
        self.calls.lock().unwrap().push(text.to_string());
        self.records.lock().unwrap().pop_front().unwrap_or_default()
    }
}

/// Advisor that always answers with the same text
pub struct MockAdvisor {
    advice: Advice,
    follow_up_answer: Option<String>,
    /// Requests it received
    pub requests: Mutex<Vec<AdviceRequest>>,
    /// Follow-up questions it was asked
    pub questions: Mutex<Vec<FollowUpRequest>>,
}

impl MockAdvisor {
    pub fn new(text: &str) -> Self {
        Self {
            advice: Advice::plain(text),
            follow_up_answer: None,
            requests: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_advisory_level(mut self, level: u8) -> Self {
        self.advice.advisory_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_follow_up_answer(mut self, text: &str) -> Self {
        self.follow_up_answer = Some(text.to_string());
        self
    }
}

#[async_trait]
impl AdviceGenerator for MockAdvisor {
    async fn generate_advice(&self, request: &AdviceRequest) -> Advice {
        self.requests.lock().unwrap().push(request.clone());
        self.advice.clone()
    }

    async fn answer_follow_up(&self, request: &FollowUpRequest) -> Option<String> {
        self.questions.lock().unwrap().push(request.clone());
        self.follow_up_answer.clone()
    }
}

/// Image classifier with a fixed answer
pub struct MockImageClassifier {
    finding: VisualFinding,
    pub paths: Mutex<Vec<String>>,
}

impl MockImageClassifier {
    pub fn new(finding: VisualFinding) -> Self {
        Self {
            finding,
            paths: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ImageClassifier for MockImageClassifier {
    async fn classify(&self, path: &str) -> VisualFinding {
        self.paths.lock().unwrap().push(path.to_string());
        self.finding.clone()
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, SessionRecord>,
    states: HashMap<String, Intake>,
    symptom_counts: BTreeMap<String, u64>,
    visits: Vec<PatientVisit>,
    profiles: HashMap<String, PatientProfile>,
}

/// `SessionStore` backed by plain maps
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, user_id: &str, profile: PatientProfile) -> Self {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .insert(user_id.to_string(), profile);
        self
    }

    pub fn symptom_counts(&self) -> BTreeMap<String, u64> {
        self.inner.lock().unwrap().symptom_counts.clone()
    }

    pub fn visits(&self) -> Vec<PatientVisit> {
        self.inner.lock().unwrap().visits.clone()
    }

    pub fn saved_state(&self, session_id: &str) -> Option<Intake> {
        self.inner.lock().unwrap().states.get(session_id).cloned()
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), String> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> Result<SessionRecord, String> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| format!("Session not found: {session_id}"))
    }

    async fn append_entry(&self, session_id: &str, entry: &TurnEntry) -> Result<(), String> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| format!("Session not found: {session_id}"))?;
        session.append(entry.clone());
        Ok(())
    }

    async fn load_entries(&self, session_id: &str) -> Result<Vec<TurnEntry>, String> {
        Ok(self.load_session(session_id).await?.entries)
    }

    async fn save_state(&self, session_id: &str, intake: &Intake) -> Result<(), String> {
        self.inner
            .lock()
            .unwrap()
            .states
            .insert(session_id.to_string(), intake.clone());
        Ok(())
    }

    async fn load_state(&self, session_id: &str) -> Result<Intake, String> {
        self.saved_state(session_id)
            .ok_or_else(|| format!("No state for session: {session_id}"))
    }

    async fn record_symptoms(&self, symptoms: &[String]) -> Result<(), String> {
        let mut inner = self.inner.lock().unwrap();
        for symptom in symptoms {
            *inner.symptom_counts.entry(symptom.to_lowercase()).or_default() += 1;
        }
        Ok(())
    }

    async fn record_visit(&self, visit: &PatientVisit) -> Result<(), String> {
        self.inner.lock().unwrap().visits.push(visit.clone());
        Ok(())
    }

    async fn load_profile(&self, user_id: &str) -> Result<Option<PatientProfile>, String> {
        Ok(self.inner.lock().unwrap().profiles.get(user_id).cloned())
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Wires mocks into a runtime and keeps handles to them for assertions
pub struct TestRuntime {
    pub runtime: IntakeRuntime<Arc<InMemoryStore>>,
    pub store: Arc<InMemoryStore>,
    pub extractor: Arc<MockExtractor>,
    pub advisor: Arc<MockAdvisor>,
    pub vision: Arc<MockImageClassifier>,
}

impl TestRuntime {
    pub fn new(profile: Option<PatientProfile>, image_step: bool) -> Self {
        Self::with_advisor(profile, image_step, MockAdvisor::new("Rest and stay hydrated."))
    }

    pub fn with_advisor(profile: Option<PatientProfile>, image_step: bool, advisor: MockAdvisor) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let extractor = Arc::new(MockExtractor::new());
        let advisor = Arc::new(advisor);
        let vision = Arc::new(MockImageClassifier::new(VisualFinding::new("eczema", 0.8)));

        let collaborators = Collaborators {
            extractor: extractor.clone(),
            advisor: advisor.clone(),
            safety: Arc::new(RedFlagFilter),
            vision: vision.clone(),
        };
        let context = IntakeContext::new("test-session")
            .with_profile(profile.clone())
            .with_image_step(image_step);
        let record = SessionRecord::new("test-session", profile);

        let runtime = IntakeRuntime::new(
            context,
            Intake::new(),
            record,
            store.clone(),
            collaborators,
        );
        Self {
            runtime,
            store,
            extractor,
            advisor,
            vision,
        }
    }

    /// Create the session row so appended entries have somewhere to go
    pub async fn persisted(self) -> Self {
        self.store.create_session(self.runtime.record()).await.unwrap();
        self
    }

    /// Answer name, age and sex
    pub async fn answer_demographics(&mut self) {
        for text in ["Ana", "34", "female"] {
            self.runtime.receive_input(text).await.unwrap();
        }
    }

    /// Run a full dialogue with `record` as the extraction result
    pub async fn complete_with(&mut self, record: SymptomRecord) -> super::TurnOutcome {
        self.answer_demographics().await;
        self.extractor.queue(record);
        let mut outcome = self.runtime.receive_input("symptom description").await.unwrap();
        while let Some(prompt) = outcome.prompt.clone() {
            let answer = if prompt.contains("severe") {
                "mild"
            } else if prompt.contains("How long") {
                "2 days"
            } else {
                "no"
            };
            outcome = self.runtime.receive_input(answer).await.unwrap();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::followup::{FALLBACK_REPLY, GOODBYE};
    use crate::model::{Severity, TriageLevel};
    use crate::runtime::{RuntimeError, RuntimeManager};
    use crate::safety::{CRISIS_NOTE, EMERGENCY_ALERT, UNSAFE_REPLY};
    use crate::state_machine::{ConversationMemory, IntakeState, TransitionError};
    use crate::triage::classify;
    use std::time::Duration;

    // ------------------------------------------------------------------------
    // End-to-end scenarios
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_scenario_chest_pain_without_profile() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        let outcome = rt
            .complete_with(SymptomRecord::new(["chest pain"]).with_severity(Severity::Severe))
            .await;

        assert!(outcome.complete);
        let triage = outcome.triage.unwrap();
        assert_eq!(triage.level, TriageLevel::Emergent);
        assert!(triage.reason.contains("cardiac"));
        assert!(outcome.emergency);
        assert!(outcome.reply.contains(EMERGENCY_ALERT));
    }

    #[tokio::test]
    async fn test_scenario_high_fever() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        let outcome = rt
            .complete_with(SymptomRecord::new(["fever"]).with_severity(Severity::High))
            .await;
        assert_eq!(outcome.triage.unwrap().level, TriageLevel::Urgent);
        assert!(!outcome.emergency);
        assert!(outcome.reply.contains("Rest and stay hydrated."));
    }

    #[tokio::test]
    async fn test_scenario_asthma_profile() {
        let profile = PatientProfile::new(30, ["asthma"], Vec::<String>::new());
        let mut rt = TestRuntime::new(Some(profile), false).persisted().await;
        let outcome = rt
            .complete_with(SymptomRecord::new(["shortness of breath"]))
            .await;
        let triage = outcome.triage.unwrap();
        assert_eq!(triage.level, TriageLevel::Emergent);
        assert!(triage.reason.contains("asthma"));
    }

    #[tokio::test]
    async fn test_scenario_cardiac_risk_profile() {
        let profile = PatientProfile::new(58, ["heart disease"], Vec::<String>::new());
        let mut rt = TestRuntime::new(Some(profile), false).persisted().await;
        let outcome = rt.complete_with(SymptomRecord::new(["chest pain"])).await;
        assert_eq!(outcome.triage.unwrap().level, TriageLevel::Resuscitation);
    }

    #[test]
    fn test_scenario_no_symptoms() {
        let result = classify(&SymptomRecord::default(), None);
        assert_eq!(result.level, TriageLevel::NonUrgent);
        assert_eq!(result.reason, "symptoms unclear or not recognized");
    }

    // ------------------------------------------------------------------------
    // Executor behaviour
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_unrecognized_symptoms_retry_until_recognized() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        rt.answer_demographics().await;

        for _ in 0..3 {
            let outcome = rt.runtime.receive_input("blah").await.unwrap();
            assert_eq!(outcome.current_index, 3);
            assert!(outcome.reply.contains("couldn't detect any symptoms"));
        }

        rt.extractor.queue(SymptomRecord::new(["cough"]));
        let outcome = rt.runtime.receive_input("a cough").await.unwrap();
        assert_eq!(outcome.current_index, 4);
        assert_eq!(rt.extractor.call_count(), 4);
    }

    #[tokio::test]
    async fn test_vague_wording_with_red_flags_reaches_extraction() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        rt.answer_demographics().await;
        rt.extractor
            .queue(SymptomRecord::new(["chest pain", "shortness of breath"]));
        let text = "I feel bad, I have chest pain and shortness of breath";
        let outcome = rt.runtime.receive_input(text).await.unwrap();

        assert_eq!(rt.extractor.calls.lock().unwrap().as_slice(), [text]);
        assert!(!outcome.reply.contains("more detail"));
        assert_eq!(outcome.current_index, 4);
        assert!(rt.runtime.intake().memory.symptoms.contains("chest pain"));
    }

    #[tokio::test]
    async fn test_vague_input_without_symptoms_asks_for_detail() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        rt.answer_demographics().await;
        let outcome = rt.runtime.receive_input("I feel bad").await.unwrap();
        assert_eq!(rt.extractor.call_count(), 1);
        assert!(outcome.reply.contains("more detail"));
        assert_eq!(outcome.prompt.as_deref(), Some("What symptoms are you experiencing?"));
    }

    #[tokio::test]
    async fn test_empty_symptom_answer_skips_extraction() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        rt.answer_demographics().await;
        let outcome = rt.runtime.receive_input("   ").await.unwrap();
        assert_eq!(rt.extractor.call_count(), 0);
        assert!(outcome.reply.contains("couldn't detect any symptoms"));
        assert_eq!(outcome.current_index, 3);
    }

    #[tokio::test]
    async fn test_overdose_mention_is_extracted_with_crisis_note() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        rt.answer_demographics().await;
        rt.extractor.queue(SymptomRecord::new(["nausea"]));
        let outcome = rt
            .runtime
            .receive_input("I took an overdose of pills and now have nausea")
            .await
            .unwrap();
        assert_eq!(rt.extractor.call_count(), 1);
        assert!(outcome.reply.starts_with(CRISIS_NOTE));
        assert_eq!(outcome.current_index, 4);
    }

    #[tokio::test]
    async fn test_completion_side_effects() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        rt.complete_with(SymptomRecord::new(["Cough", "fatigue"])).await;

        let counts = rt.store.symptom_counts();
        assert_eq!(counts.get("cough"), Some(&1));
        assert_eq!(counts.get("fatigue"), Some(&1));

        let visits = rt.store.visits();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].patient_key(), "ana_34_female");

        let saved = rt.store.saved_state("test-session").unwrap();
        assert_eq!(saved.state, IntakeState::Complete);

        let err = rt.runtime.receive_input("hello?").await.unwrap_err();
        assert_eq!(err, TransitionError::AlreadyComplete);
    }

    #[tokio::test]
    async fn test_entries_are_appended_in_order() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        rt.complete_with(SymptomRecord::new(["headache"]).with_duration("long"))
            .await;

        let entries = &rt.runtime.record().entries;
        let inputs: Vec<&str> = entries.iter().map(|e| e.user_input.as_str()).collect();
        assert_eq!(inputs[..4], ["Ana", "34", "female", "symptom description"]);
        assert!(entries[3].extracted_symptoms.is_some());
        assert_eq!(entries.iter().filter(|e| e.triage_result.is_some()).count(), 1);

        let stored = rt.store.load_entries("test-session").await.unwrap();
        assert_eq!(&stored, entries);
    }

    #[tokio::test]
    async fn test_image_step_runs_classifier() {
        let mut rt = TestRuntime::new(None, true).persisted().await;
        rt.answer_demographics().await;
        rt.extractor.queue(
            SymptomRecord::new(["rash"])
                .with_severity(Severity::Mild)
                .with_duration("3 days"),
        );
        rt.runtime.receive_input("itchy rash").await.unwrap();
        let offer = rt.runtime.receive_input("nothing else").await.unwrap();
        assert_eq!(offer.state, IntakeState::OfferingImage);

        rt.runtime.receive_input("yes").await.unwrap();
        let done = rt.runtime.receive_input("rash.jpg").await.unwrap();
        assert!(done.complete);
        assert!(done.reply.contains("Predicted Condition: eczema"));
        assert_eq!(rt.vision.paths.lock().unwrap().as_slice(), ["rash.jpg"]);
    }

    #[tokio::test]
    async fn test_advisory_level_never_overrides_triage() {
        let advisor = MockAdvisor::new("See a doctor.").with_advisory_level(1);
        let mut rt = TestRuntime::with_advisor(None, false, advisor).persisted().await;
        let outcome = rt.complete_with(SymptomRecord::new(["cough"])).await;
        assert_eq!(outcome.triage.unwrap().level, TriageLevel::NonUrgent);
        assert_eq!(rt.runtime.intake().memory.advisory_level, Some(1));
        assert_eq!(rt.advisor.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_conversation() {
        let advisor = MockAdvisor::new("Rest.").with_follow_up_answer("Light walks are fine.");
        let mut rt = TestRuntime::with_advisor(None, false, advisor).persisted().await;
        let done = rt.complete_with(SymptomRecord::new(["cough"])).await;
        assert!(done.follow_up_open);
        assert!(done.reply.contains("follow-up questions"));

        let answered = rt.runtime.receive_follow_up("Can I exercise?").await.unwrap();
        assert!(answered.reply.starts_with("Light walks are fine."));
        assert_eq!(answered.state, IntakeState::Complete);
        assert!(answered.follow_up_open);

        let asked = rt.advisor.questions.lock().unwrap().clone();
        assert_eq!(asked.len(), 1);
        assert_eq!(asked[0].question, "Can I exercise?");
        assert!(asked[0].symptoms.contains("cough"));

        let refused = rt.runtime.receive_follow_up("how do I overdose?").await.unwrap();
        assert_eq!(refused.reply, UNSAFE_REPLY);
        assert_eq!(rt.advisor.questions.lock().unwrap().len(), 1);

        let bye = rt.runtime.receive_follow_up("bye").await.unwrap();
        assert_eq!(bye.reply, GOODBYE);
        assert!(!bye.follow_up_open);

        let err = rt.runtime.receive_follow_up("one more").await.unwrap_err();
        assert_eq!(err, TransitionError::FollowUpClosed);
        assert_eq!(rt.runtime.intake().memory.follow_ups.len(), 1);
        assert!(rt.store.saved_state("test-session").unwrap().memory.follow_up_closed);
    }

    #[tokio::test]
    async fn test_follow_up_before_completion_is_rejected() {
        let mut rt = TestRuntime::new(None, false).persisted().await;
        let err = rt.runtime.receive_follow_up("Is it serious?").await.unwrap_err();
        assert_eq!(err, TransitionError::IntakeInProgress);
    }

    // ------------------------------------------------------------------------
    // Manager
    // ------------------------------------------------------------------------

    fn manager(store: Arc<InMemoryStore>, extractor: Arc<MockExtractor>) -> RuntimeManager {
        let collaborators = Collaborators {
            extractor,
            advisor: Arc::new(MockAdvisor::new("Rest.")),
            safety: Arc::new(RedFlagFilter),
            vision: Arc::new(MockImageClassifier::new(VisualFinding::error())),
        };
        RuntimeManager::new(store, collaborators, false)
    }

    #[tokio::test]
    async fn test_manager_loads_profile_and_answers() {
        let profile = PatientProfile::new(72, Vec::<String>::new(), Vec::<String>::new());
        let store = Arc::new(InMemoryStore::new().with_profile("u1", profile));
        let extractor = Arc::new(MockExtractor::new());
        let manager = manager(store.clone(), extractor.clone());

        let started = manager.start_session(Some("u1")).await.unwrap();
        assert!(started.profile_loaded);
        assert_eq!(started.prompt.as_deref(), Some("May I know your name?"));

        for text in ["Bo", "72", "male"] {
            manager.answer(&started.session_id, text.to_string()).await.unwrap();
        }
        extractor.queue(
            SymptomRecord::new(["fever"])
                .with_severity(Severity::Mild)
                .with_duration("1 day"),
        );
        manager
            .answer(&started.session_id, "fever".to_string())
            .await
            .unwrap();
        let outcome = manager
            .answer(&started.session_id, "none".to_string())
            .await
            .unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.triage.unwrap().level, TriageLevel::Emergent);

        let snapshot = manager.snapshot(&started.session_id).await.unwrap();
        assert_eq!(snapshot.record.entries.len(), 5);
        assert!(snapshot.prompt.is_none());
    }

    #[tokio::test]
    async fn test_manager_rehydrates_persisted_session() {
        let store = Arc::new(InMemoryStore::new());
        let extractor = Arc::new(MockExtractor::new());
        let first = manager(store.clone(), extractor.clone());
        let started = first.start_session(None).await.unwrap();
        first.answer(&started.session_id, "Cy".to_string()).await.unwrap();
        drop(first);

        let second = manager(store, extractor);
        let snapshot = second.snapshot(&started.session_id).await.unwrap();
        assert_eq!(snapshot.intake.current_index, 1);
        assert_eq!(snapshot.prompt.as_deref(), Some("How old are you?"));
        assert_eq!(snapshot.record.entries.len(), 1);
    }

    /// Memory of an intake whose slots are all answered
    fn answered_memory() -> ConversationMemory {
        let mut memory = ConversationMemory {
            name: Some("Di".to_string()),
            age: Some("40".to_string()),
            sex: Some("female".to_string()),
            severity: Some(Severity::Mild),
            duration: Some("2 days".to_string()),
            extra_info: Some("none".to_string()),
            ..ConversationMemory::default()
        };
        memory.symptoms.insert("cough".to_string());
        memory.triage = Some(classify(&memory.symptom_record(), None));
        memory
    }

    /// Persist a session as if the process stopped while it was in `intake`
    async fn stored_session(store: &InMemoryStore, session_id: &str, intake: Intake) {
        store
            .create_session(&SessionRecord::new(session_id, None))
            .await
            .unwrap();
        store.save_state(session_id, &intake).await.unwrap();
    }

    async fn wait_for_eviction(manager: &RuntimeManager) {
        for _ in 0..200 {
            if manager.active_sessions().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session actor still registered");
    }

    #[tokio::test]
    async fn test_rehydrate_resumes_interrupted_advice() {
        let store = Arc::new(InMemoryStore::new());
        let intake = Intake {
            state: IntakeState::GeneratingAdvice,
            current_index: 7,
            memory: answered_memory(),
        };
        stored_session(&store, "s-advice", intake).await;
        let manager = manager(store.clone(), Arc::new(MockExtractor::new()));

        let snapshot = manager.snapshot("s-advice").await.unwrap();
        assert_eq!(snapshot.intake.state, IntakeState::Complete);
        assert_eq!(snapshot.intake.memory.advice.as_deref(), Some("Rest."));
        assert_eq!(store.visits().len(), 1);
        assert_eq!(store.saved_state("s-advice").unwrap().state, IntakeState::Complete);
        assert!(snapshot.record.entries.last().unwrap().system_output.contains("Rest."));

        let err = manager.answer("s-advice", "hello?".to_string()).await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Transition(TransitionError::AlreadyComplete)
        ));
    }

    #[tokio::test]
    async fn test_rehydrate_interrupted_extraction_asks_again() {
        let store = Arc::new(InMemoryStore::new());
        let mut memory = answered_memory();
        memory.symptoms.clear();
        memory.severity = None;
        memory.duration = None;
        memory.extra_info = None;
        memory.triage = None;
        let intake = Intake {
            state: IntakeState::ExtractingSymptoms,
            current_index: 3,
            memory,
        };
        stored_session(&store, "s-extract", intake).await;
        let extractor = Arc::new(MockExtractor::new());
        let manager = manager(store.clone(), extractor.clone());

        let snapshot = manager.snapshot("s-extract").await.unwrap();
        assert_eq!(snapshot.intake.state, IntakeState::AwaitingAnswer);
        assert_eq!(snapshot.prompt.as_deref(), Some("What symptoms are you experiencing?"));
        assert_eq!(
            store.saved_state("s-extract").unwrap().state,
            IntakeState::AwaitingAnswer
        );

        extractor.queue(SymptomRecord::new(["headache"]));
        let outcome = manager.answer("s-extract", "headache".to_string()).await.unwrap();
        assert_eq!(outcome.current_index, 4);
    }

    #[tokio::test]
    async fn test_rehydrate_interrupted_image_reoffers() {
        let store = Arc::new(InMemoryStore::new());
        let intake = Intake {
            state: IntakeState::AnalyzingImage,
            current_index: 7,
            memory: answered_memory(),
        };
        stored_session(&store, "s-image", intake).await;
        let manager = manager(store, Arc::new(MockExtractor::new()));

        let snapshot = manager.snapshot("s-image").await.unwrap();
        assert_eq!(snapshot.intake.state, IntakeState::OfferingImage);
        assert!(snapshot.prompt.is_some());

        let outcome = manager.answer("s-image", "no".to_string()).await.unwrap();
        assert!(outcome.complete);
    }

    #[tokio::test]
    async fn test_rehydrate_idle_image_states() {
        let store = Arc::new(InMemoryStore::new());
        for (id, state) in [
            ("s-offer", IntakeState::OfferingImage),
            ("s-path", IntakeState::AwaitingImagePath),
        ] {
            let intake = Intake {
                state,
                current_index: 7,
                memory: answered_memory(),
            };
            stored_session(&store, id, intake).await;
        }
        let manager = manager(store, Arc::new(MockExtractor::new()));

        let offer = manager.snapshot("s-offer").await.unwrap();
        assert_eq!(offer.intake.state, IntakeState::OfferingImage);
        let outcome = manager.answer("s-offer", "no".to_string()).await.unwrap();
        assert!(outcome.complete);

        let path = manager.snapshot("s-path").await.unwrap();
        assert_eq!(path.intake.state, IntakeState::AwaitingImagePath);
        let outcome = manager.answer("s-path", "rash.jpg".to_string()).await.unwrap();
        assert!(outcome.complete);
        assert!(outcome.reply.contains("Rest."));
    }

    #[tokio::test]
    async fn test_rehydrate_interrupted_follow_up() {
        let store = Arc::new(InMemoryStore::new());
        let mut memory = answered_memory();
        memory.advice = Some("Rest.".to_string());
        let intake = Intake {
            state: IntakeState::AnsweringFollowUp,
            current_index: 7,
            memory,
        };
        stored_session(&store, "s-follow", intake).await;
        let manager = manager(store, Arc::new(MockExtractor::new()));

        let outcome = manager
            .follow_up("s-follow", "Can I go to work?".to_string())
            .await
            .unwrap();
        assert_eq!(outcome.state, IntakeState::Complete);
        assert!(outcome.reply.starts_with(FALLBACK_REPLY));
        assert!(outcome.follow_up_open);
    }

    #[tokio::test]
    async fn test_completed_session_actor_is_evicted() {
        let store = Arc::new(InMemoryStore::new());
        let extractor = Arc::new(MockExtractor::new());
        let manager = manager(store, extractor.clone());
        let started = manager.start_session(None).await.unwrap();
        let id = started.session_id;

        for text in ["Ed", "50", "male"] {
            manager.answer(&id, text.to_string()).await.unwrap();
        }
        assert_eq!(manager.active_sessions().await, 1);

        extractor.queue(
            SymptomRecord::new(["cough"])
                .with_severity(Severity::Mild)
                .with_duration("2 days"),
        );
        manager.answer(&id, "cough".to_string()).await.unwrap();
        let done = manager.answer(&id, "none".to_string()).await.unwrap();
        assert!(done.complete);
        wait_for_eviction(&manager).await;

        let snapshot = manager.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.intake.state, IntakeState::Complete);
        let outcome = manager.follow_up(&id, "Should I rest?".to_string()).await.unwrap();
        assert!(outcome.follow_up_open);
        wait_for_eviction(&manager).await;
    }

    #[tokio::test]
    async fn test_manager_unknown_session() {
        let manager = manager(Arc::new(InMemoryStore::new()), Arc::new(MockExtractor::new()));
        let err = manager.answer("missing", "hi".to_string()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(_)));
    }
}
