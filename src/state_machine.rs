//! Intake state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions: the
//! transition function decides, the runtime performs the effects it returns.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConversationMemory, Intake, IntakeContext, IntakeState};
pub use transition::{advice_request, transition, TransitionError};
