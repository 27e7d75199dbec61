// Handoff workflow: types, transition table and the transactional engine

pub mod engine;
pub mod state_machine;
pub mod types;

#[cfg(test)]
mod tests;

pub use engine::HandoffService;
pub use state_machine::{plan_transition, validate_command, HandoffCommand, TransitionPlan};
pub use types::{Handoff, HandoffAction, HandoffEvent, HandoffId, HandoffState, NewHandoffEvent};
