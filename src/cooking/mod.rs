//! Guided cooking sessions.
//!
//! Domain types for recipes, sessions and failure history, plus the
//! [`CookingSessionMachine`] that drives a cook through a recipe.

mod machine;
mod types;

pub use machine::{AdvanceOutcome, CookingSessionMachine, StepView, VoiceAction, VoiceCommandOutcome};
pub use types::*;
