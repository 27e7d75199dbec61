// Handoff transition table
//
// Pure: evaluates a command against a snapshot of the handoff and produces
// the next handoff value plus its audit event. Persistence lives in the
// engine.

use serde::{Deserialize, Serialize};

use super::types::{Handoff, HandoffAction, HandoffId, HandoffState, NewHandoffEvent};
use crate::errors::HandoffError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandoffCommand {
    Create {
        owner: String,
    },
    Initiate {
        handoff_id: HandoffId,
        actor: String,
        receiving_party: String,
    },
    Accept {
        handoff_id: HandoffId,
        actor: String,
    },
    Decline {
        handoff_id: HandoffId,
        actor: String,
    },
}

impl HandoffCommand {
    pub fn action(&self) -> HandoffAction {
        match self {
            HandoffCommand::Create { .. } => HandoffAction::Create,
            HandoffCommand::Initiate { .. } => HandoffAction::Initiate,
            HandoffCommand::Accept { .. } => HandoffAction::Accept,
            HandoffCommand::Decline { .. } => HandoffAction::Decline,
        }
    }

    /// Target handoff, `None` for `Create`
    pub fn handoff_id(&self) -> Option<HandoffId> {
        match self {
            HandoffCommand::Create { .. } => None,
            HandoffCommand::Initiate { handoff_id, .. }
            | HandoffCommand::Accept { handoff_id, .. }
            | HandoffCommand::Decline { handoff_id, .. } => Some(*handoff_id),
        }
    }

    pub fn actor(&self) -> &str {
        match self {
            HandoffCommand::Create { owner } => owner,
            HandoffCommand::Initiate { actor, .. }
            | HandoffCommand::Accept { actor, .. }
            | HandoffCommand::Decline { actor, .. } => actor,
        }
    }
}

/// Outcome of a legal transition, ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub next: Handoff,
    pub event: NewHandoffEvent,
}

/// Rejects blank party identifiers before any transaction is opened
pub fn validate_command(command: &HandoffCommand) -> Result<(), HandoffError> {
    let actor_field = match command {
        HandoffCommand::Create { .. } => "owner",
        _ => "actor",
    };
    require_party(actor_field, command.actor())?;

    if let HandoffCommand::Initiate {
        receiving_party, ..
    } = command
    {
        require_party("receiving party", receiving_party)?;
    }
    Ok(())
}

fn require_party(field: &str, value: &str) -> Result<(), HandoffError> {
    if value.trim().is_empty() {
        return Err(HandoffError::InvalidParty {
            reason: format!("{field} must not be empty"),
        });
    }
    Ok(())
}

/// Evaluates `command` against `current`.
///
/// Preconditions are checked in a fixed order: state first, then actor, so a
/// caller can tell "wrong phase" from "wrong party". `current` is never
/// modified.
pub fn plan_transition(
    current: &Handoff,
    command: &HandoffCommand,
) -> Result<TransitionPlan, HandoffError> {
    let action = command.action();
    let from_state = current.state;

    match command {
        HandoffCommand::Create { .. } => Err(HandoffError::InvalidStateTransition {
            action,
            current_state: from_state,
        }),

        HandoffCommand::Initiate {
            actor,
            receiving_party,
            ..
        } => {
            require_state(action, current, HandoffState::Active)?;
            if current.current_owner != *actor {
                return Err(HandoffError::UnauthorizedActor {
                    action,
                    actor: actor.clone(),
                });
            }

            let next = Handoff {
                receiving_party: Some(receiving_party.clone()),
                state: HandoffState::Pending,
                ..current.clone()
            };
            let event = NewHandoffEvent {
                handoff_id: current.id,
                action,
                actor: actor.clone(),
                from_state: Some(from_state),
                to_state: next.state,
                previous_owner: None,
                new_owner: None,
                receiving_party: Some(receiving_party.clone()),
                request_id: None,
            };
            Ok(TransitionPlan { next, event })
        }

        HandoffCommand::Accept { actor, .. } => {
            require_state(action, current, HandoffState::Pending)?;
            require_receiving_party(action, current, actor)?;

            let next = Handoff {
                current_owner: actor.clone(),
                receiving_party: None,
                state: HandoffState::Active,
                ..current.clone()
            };
            let event = NewHandoffEvent {
                handoff_id: current.id,
                action,
                actor: actor.clone(),
                from_state: Some(from_state),
                to_state: next.state,
                previous_owner: Some(current.current_owner.clone()),
                new_owner: Some(actor.clone()),
                receiving_party: None,
                request_id: None,
            };
            Ok(TransitionPlan { next, event })
        }

        HandoffCommand::Decline { actor, .. } => {
            require_state(action, current, HandoffState::Pending)?;
            require_receiving_party(action, current, actor)?;

            let next = Handoff {
                receiving_party: None,
                state: HandoffState::Active,
                ..current.clone()
            };
            let event = NewHandoffEvent {
                handoff_id: current.id,
                action,
                actor: actor.clone(),
                from_state: Some(from_state),
                to_state: next.state,
                previous_owner: None,
                new_owner: None,
                receiving_party: None,
                request_id: None,
            };
            Ok(TransitionPlan { next, event })
        }
    }
}

fn require_state(
    action: HandoffAction,
    current: &Handoff,
    expected: HandoffState,
) -> Result<(), HandoffError> {
    if current.state != expected {
        return Err(HandoffError::InvalidStateTransition {
            action,
            current_state: current.state,
        });
    }
    Ok(())
}

fn require_receiving_party(
    action: HandoffAction,
    current: &Handoff,
    actor: &str,
) -> Result<(), HandoffError> {
    if current.receiving_party.as_deref() != Some(actor) {
        return Err(HandoffError::UnauthorizedActor {
            action,
            actor: actor.to_string(),
        });
    }
    Ok(())
}
