//! Deterministic triage rules
//!
//! Maps a structured symptom record (plus an optional risk profile) to an
//! urgency level. Everything here is pure and safe to call from any task.

mod classifier;
mod escalation;
mod reasoning;

#[cfg(test)]
mod proptests;

pub use classifier::classify;
pub use reasoning::interpret_symptoms;
