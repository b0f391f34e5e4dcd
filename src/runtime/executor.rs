//! Per-session intake executor

use super::traits::{Collaborators, SessionStore};
use crate::followup::finish_reply;
use crate::model::{SymptomRecord, TriageResult};
use crate::session::{SessionRecord, TurnEntry};
use crate::state_machine::{
    advice_request, transition, Effect, Event, Intake, IntakeContext, IntakeState,
    TransitionError,
};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

/// What the patient sees after one turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    /// Messages produced while handling the answer, possibly empty
    pub reply: String,
    /// Next question, `None` once complete
    pub prompt: Option<String>,
    pub state: IntakeState,
    pub current_index: usize,
    pub complete: bool,
    pub triage: Option<TriageResult>,
    pub emergency: bool,
    /// Follow-up questions are accepted
    pub follow_up_open: bool,
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub intake: Intake,
    pub record: SessionRecord,
    pub prompt: Option<String>,
}

/// Commands accepted by a session actor
#[derive(Debug)]
pub enum SessionCommand {
    Answer {
        text: String,
        reply: oneshot::Sender<Result<TurnOutcome, TransitionError>>,
    },
    FollowUp {
        text: String,
        reply: oneshot::Sender<Result<TurnOutcome, TransitionError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Side output gathered while the effects of one turn run
#[derive(Default)]
struct TurnScratch {
    replies: Vec<String>,
    extracted: Option<SymptomRecord>,
}

/// Owns one session: its intake, its audit record and its collaborators
pub struct IntakeRuntime<S>
where
    S: SessionStore + 'static,
{
    context: IntakeContext,
    intake: Intake,
    record: SessionRecord,
    storage: S,
    collaborators: Collaborators,
}

impl<S> IntakeRuntime<S>
where
    S: SessionStore + 'static,
{
    pub fn new(
        context: IntakeContext,
        intake: Intake,
        record: SessionRecord,
        storage: S,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            context,
            intake,
            record,
            storage,
            collaborators,
        }
    }

    pub fn intake(&self) -> &Intake {
        &self.intake
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            intake: self.intake.clone(),
            record: self.record.clone(),
            prompt: self.intake.next_prompt().map(str::to_string),
        }
    }

    /// Actor loop. Each command runs to completion before the next is read.
    ///
    /// Once the intake is complete the channel is closed: queued commands are
    /// still served, then the actor exits and later requests rehydrate it.
    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        tracing::info!(session_id = %self.context.session_id, "Starting intake runtime");

        // Restarted while advice was being generated
        if self.intake.state == IntakeState::GeneratingAdvice {
            tracing::info!(session_id = %self.context.session_id, "Resuming interrupted advice generation");
            if let Err(e) = self.resume_advice().await {
                tracing::error!(session_id = %self.context.session_id, error = %e, "Failed to resume advice");
            }
        }

        while let Some(command) = commands.recv().await {
            match command {
                SessionCommand::Answer { text, reply } => {
                    let outcome = self.receive_input(&text).await;
                    let _ = reply.send(outcome);
                }
                SessionCommand::FollowUp { text, reply } => {
                    let outcome = self.receive_follow_up(&text).await;
                    let _ = reply.send(outcome);
                }
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
            if self.intake.is_complete() {
                commands.close();
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Intake runtime stopped");
    }

    /// Handle one patient answer, including every collaborator call it chains
    pub async fn receive_input(&mut self, text: &str) -> Result<TurnOutcome, TransitionError> {
        self.process_events(text, vec![Event::answer(text)], TurnScratch::default())
            .await
    }

    /// Handle one post-intake question
    pub async fn receive_follow_up(&mut self, text: &str) -> Result<TurnOutcome, TransitionError> {
        self.process_events(text, vec![Event::follow_up(text)], TurnScratch::default())
            .await
    }

    /// Repeat the advice call for an intake persisted mid-generation. The
    /// final report is logged as a turn with no patient input.
    pub async fn resume_advice(&mut self) -> Result<TurnOutcome, TransitionError> {
        let mut scratch = TurnScratch::default();
        let request = advice_request(&self.intake.memory);
        let events = self
            .execute_effect(Effect::GenerateAdvice { request }, &mut scratch)
            .await
            .into_iter()
            .collect();
        self.process_events("", events, scratch).await
    }

    async fn process_events(
        &mut self,
        text: &str,
        mut events_to_process: Vec<Event>,
        mut scratch: TurnScratch,
    ) -> Result<TurnOutcome, TransitionError> {
        let triaged_before = self.intake.memory.triage.is_some();

        // Process events in a loop to handle chained effects
        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(&self.intake, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(session_id = %self.context.session_id, error = %e, "Answer rejected");
                    return Err(e);
                }
            };

            self.intake = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect, &mut scratch).await {
                    events_to_process.push(generated_event);
                }
            }
        }

        let reply = scratch.replies.join("\n\n");
        let prompt = self.intake.next_prompt().map(str::to_string);
        let system_output = [Some(reply.as_str()), prompt.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut entry = TurnEntry::new(text, system_output);
        entry.extracted_symptoms = scratch.extracted;
        if !triaged_before {
            entry.triage_result.clone_from(&self.intake.memory.triage);
            entry.reasoning.clone_from(&self.intake.memory.reasoning);
        }
        if let Err(e) = self
            .storage
            .append_entry(&self.context.session_id, &entry)
            .await
        {
            tracing::warn!(session_id = %self.context.session_id, error = %e, "Failed to persist turn");
        }
        self.record.append(entry);

        let memory = &self.intake.memory;
        Ok(TurnOutcome {
            reply,
            prompt,
            state: self.intake.state,
            current_index: self.intake.current_index,
            complete: self.intake.is_complete(),
            triage: memory.triage.clone(),
            emergency: memory.emergency,
            follow_up_open: self.intake.accepts_follow_up(),
        })
    }

    async fn execute_effect(&self, effect: Effect, scratch: &mut TurnScratch) -> Option<Event> {
        let session_id = &self.context.session_id;
        match effect {
            Effect::Reply { text } => {
                scratch.replies.push(text);
                None
            }

            Effect::ExtractSymptoms { text } => {
                let record = self.collaborators.extractor.extract(&text).await;
                tracing::info!(
                    session_id = %session_id,
                    symptoms = ?record.symptoms,
                    "Symptoms extracted"
                );
                scratch.extracted = Some(record.clone());
                Some(Event::SymptomsExtracted { text, record })
            }

            Effect::RecordSymptomTrend { symptoms } => {
                if let Err(e) = self.storage.record_symptoms(&symptoms).await {
                    tracing::warn!(session_id = %session_id, error = %e, "Failed to record symptom trend");
                }
                None
            }

            Effect::AnalyzeImage { path } => {
                let finding = self.collaborators.vision.classify(&path).await;
                tracing::info!(
                    session_id = %session_id,
                    label = %finding.label,
                    confidence = finding.confidence,
                    "Image classified"
                );
                Some(Event::ImageAnalyzed { finding })
            }

            Effect::GenerateAdvice { request } => {
                let advice = self.collaborators.advisor.generate_advice(&request).await;
                let filtered = self.collaborators.safety.filter(
                    &request.symptoms,
                    request.severity.as_ref(),
                    advice.text,
                );
                Some(Event::AdviceReady {
                    advice: filtered.text,
                    emergency: filtered.emergency,
                    advisory_level: advice.advisory_level,
                })
            }

            Effect::AnswerFollowUp { request } => {
                let raw = self.collaborators.advisor.answer_follow_up(&request).await;
                let answer = finish_reply(raw.as_deref(), &request);
                tracing::info!(
                    session_id = %session_id,
                    answered = raw.is_some(),
                    "Follow-up answered"
                );
                Some(Event::FollowUpAnswered {
                    question: request.question,
                    answer,
                })
            }

            Effect::PersistState => {
                if let Err(e) = self.storage.save_state(session_id, &self.intake).await {
                    tracing::warn!(session_id = %session_id, error = %e, "Failed to persist state");
                }
                None
            }

            Effect::RecordVisit { visit } => {
                if let Some(triage) = &self.intake.memory.triage {
                    tracing::info!(
                        session_id = %session_id,
                        level = triage.level.number(),
                        emergency = self.intake.memory.emergency,
                        "Intake complete"
                    );
                }
                if let Err(e) = self.storage.record_visit(&visit).await {
                    tracing::warn!(session_id = %session_id, error = %e, "Failed to record visit");
                }
                None
            }
        }
    }
}
