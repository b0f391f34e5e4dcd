//! Runtime for executing intake sessions
//!
//! Every session is an actor: one tokio task owning the `Intake` and its
//! `SessionRecord`, fed through an mpsc channel. The manager maps session
//! ids to actor handles and rehydrates sessions from storage on demand.
//! Actors of completed sessions exit after each request and drop out of the
//! map.

mod executor;
mod recovery;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{IntakeRuntime, SessionCommand, SessionSnapshot, TurnOutcome};
pub use traits::*;

use crate::session::SessionRecord;
use crate::state_machine::{Intake, IntakeContext, TransitionError};
use recovery::RecoveryReason;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Errors surfaced by the session manager
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Session actor stopped")]
    ActorStopped,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub command_tx: mpsc::Sender<SessionCommand>,
}

/// Returned when a session is opened
#[derive(Debug, Clone, Serialize)]
pub struct SessionStarted {
    pub session_id: String,
    pub prompt: Option<String>,
    pub profile_loaded: bool,
}

/// Manager for all intake sessions
pub struct RuntimeManager {
    storage: Arc<dyn SessionStore>,
    collaborators: Collaborators,
    image_step: bool,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl RuntimeManager {
    pub fn new(storage: Arc<dyn SessionStore>, collaborators: Collaborators, image_step: bool) -> Self {
        Self {
            storage,
            collaborators,
            image_step,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Open a new session, optionally bound to a stored risk profile
    pub async fn start_session(&self, user_id: Option<&str>) -> Result<SessionStarted, RuntimeError> {
        let profile = match user_id {
            Some(user_id) => self.storage.load_profile(user_id).await.unwrap_or_else(|e| {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to load profile, continuing without");
                None
            }),
            None => None,
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        let record = SessionRecord::new(&session_id, profile.clone());
        self.storage
            .create_session(&record)
            .await
            .map_err(RuntimeError::Storage)?;

        let intake = Intake::new();
        self.storage
            .save_state(&session_id, &intake)
            .await
            .map_err(RuntimeError::Storage)?;

        tracing::info!(
            session_id = %session_id,
            has_profile = profile.is_some(),
            "Session started"
        );

        let prompt = intake.next_prompt().map(str::to_string);
        self.spawn(&session_id, intake, record).await;

        Ok(SessionStarted {
            session_id,
            prompt,
            profile_loaded: profile.is_some(),
        })
    }

    /// Feed one patient answer to a session
    pub async fn answer(&self, session_id: &str, text: String) -> Result<TurnOutcome, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(session_id, SessionCommand::Answer { text, reply })
            .await?;
        Ok(rx.await.map_err(|_| RuntimeError::ActorStopped)??)
    }

    /// Ask a question about a completed intake
    pub async fn follow_up(&self, session_id: &str, text: String) -> Result<TurnOutcome, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(session_id, SessionCommand::FollowUp { text, reply })
            .await?;
        Ok(rx.await.map_err(|_| RuntimeError::ActorStopped)??)
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(session_id, SessionCommand::Snapshot { reply })
            .await?;
        rx.await.map_err(|_| RuntimeError::ActorStopped)
    }

    /// Number of session actors currently running
    #[cfg(test)]
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Deliver a command, rehydrating once if the actor wound down meanwhile
    async fn dispatch(&self, session_id: &str, mut command: SessionCommand) -> Result<(), RuntimeError> {
        for _ in 0..2 {
            let handle = self.get_or_rehydrate(session_id).await?;
            match handle.command_tx.send(command).await {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(returned)) => {
                    command = returned;
                    let mut sessions = self.sessions.write().await;
                    if sessions
                        .get(session_id)
                        .is_some_and(|h| h.command_tx.same_channel(&handle.command_tx))
                    {
                        sessions.remove(session_id);
                    }
                }
            }
        }
        Err(RuntimeError::ActorStopped)
    }

    /// Get the running actor, or rebuild it from the persisted snapshot
    async fn get_or_rehydrate(&self, session_id: &str) -> Result<SessionHandle, RuntimeError> {
        {
            let sessions = self.sessions.read().await;
            if let Some(handle) = sessions.get(session_id) {
                return Ok(handle.clone());
            }
        }

        let record = self
            .storage
            .load_session(session_id)
            .await
            .map_err(|_| RuntimeError::SessionNotFound(session_id.to_string()))?;
        let stored = self
            .storage
            .load_state(session_id)
            .await
            .map_err(RuntimeError::Storage)?;

        let decision = recovery::resume_state(stored);
        tracing::info!(
            session_id = %session_id,
            entries = record.entries.len(),
            state = ?decision.intake.state,
            "Rehydrating session"
        );
        if decision.reason != RecoveryReason::Idle {
            tracing::info!(session_id = %session_id, reason = ?decision.reason, "Recovering interrupted session");
        }
        if decision.changes_state() {
            if let Err(e) = self.storage.save_state(session_id, &decision.intake).await {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to persist recovered state");
            }
        }
        Ok(self.spawn(session_id, decision.intake, record).await)
    }

    async fn spawn(&self, session_id: &str, intake: Intake, record: SessionRecord) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        // Another request may have rehydrated the same session meanwhile
        if let Some(handle) = sessions.get(session_id) {
            return handle.clone();
        }

        let context = IntakeContext::new(session_id)
            .with_profile(record.profile.clone())
            .with_image_step(self.image_step);
        let (command_tx, command_rx) = mpsc::channel(32);
        let runtime = IntakeRuntime::new(
            context,
            intake,
            record,
            Arc::clone(&self.storage),
            self.collaborators.clone(),
        );

        let id = session_id.to_string();
        let registry = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            runtime.run(command_rx).await;
            let mut sessions = registry.write().await;
            // A newer actor may already serve this id
            if sessions.get(&id).is_some_and(|h| h.command_tx.is_closed()) {
                sessions.remove(&id);
            }
            tracing::info!(session_id = %id, "Session actor finished");
        });

        let handle = SessionHandle { command_tx };
        sessions.insert(session_id.to_string(), handle.clone());
        handle
    }
}
