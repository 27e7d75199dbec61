// Tests for the handoff transition table

use chrono::Utc;

use super::state_machine::{plan_transition, HandoffCommand};
use super::types::{Handoff, HandoffAction, HandoffId, HandoffState};
use crate::errors::HandoffErrorKind;

const OWNER: &str = "alice";
const RECEIVER: &str = "bob";
const STRANGER: &str = "mallory";

fn snapshot(state: HandoffState) -> Handoff {
    Handoff {
        id: HandoffId(1),
        current_owner: OWNER.to_string(),
        receiving_party: state.requires_receiving_party().then(|| RECEIVER.to_string()),
        state,
        version: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn command(action: HandoffAction, actor: &str) -> HandoffCommand {
    let handoff_id = HandoffId(1);
    let actor = actor.to_string();
    match action {
        HandoffAction::Create => HandoffCommand::Create { owner: actor },
        HandoffAction::Initiate => HandoffCommand::Initiate {
            handoff_id,
            actor,
            receiving_party: "carol".to_string(),
        },
        HandoffAction::Accept => HandoffCommand::Accept { handoff_id, actor },
        HandoffAction::Decline => HandoffCommand::Decline { handoff_id, actor },
    }
}

/// Expected outcome for every (state, action, actor) combination
fn expected(state: HandoffState, action: HandoffAction, actor: &str) -> Result<HandoffState, HandoffErrorKind> {
    use HandoffAction::*;
    use HandoffState::*;

    match (state, action) {
        (_, Create) => Err(HandoffErrorKind::InvalidStateTransition),
        (Active, Initiate) if actor == OWNER => Ok(Pending),
        (Active, Initiate) => Err(HandoffErrorKind::UnauthorizedActor),
        (Pending, Accept | Decline) if actor == RECEIVER => Ok(Active),
        (Pending, Accept | Decline) => Err(HandoffErrorKind::UnauthorizedActor),
        _ => Err(HandoffErrorKind::InvalidStateTransition),
    }
}

#[test]
fn test_full_transition_table() {
    let actions = [
        HandoffAction::Create,
        HandoffAction::Initiate,
        HandoffAction::Accept,
        HandoffAction::Decline,
    ];

    for state in HandoffState::ALL {
        for action in actions {
            for actor in [OWNER, RECEIVER, STRANGER] {
                let current = snapshot(state);
                let outcome = plan_transition(&current, &command(action, actor))
                    .map(|plan| plan.next.state)
                    .map_err(|err| err.kind());

                assert_eq!(
                    outcome,
                    expected(state, action, actor),
                    "state={state} action={action} actor={actor}"
                );
            }
        }
    }
}

#[test]
fn test_every_legal_plan_keeps_invariant_and_describes_itself() {
    for state in HandoffState::ALL {
        for actor in [OWNER, RECEIVER] {
            for action in [HandoffAction::Initiate, HandoffAction::Accept, HandoffAction::Decline] {
                let current = snapshot(state);
                let Ok(plan) = plan_transition(&current, &command(action, actor)) else {
                    continue;
                };

                plan.next.check_invariant().unwrap();
                assert_eq!(plan.event.action, action);
                assert_eq!(plan.event.actor, actor);
                assert_eq!(plan.event.from_state, Some(state));
                assert_eq!(plan.event.to_state, plan.next.state);
                assert_eq!(plan.event.handoff_id, current.id);

                let changes_owner = plan.next.current_owner != current.current_owner;
                assert_eq!(changes_owner, action == HandoffAction::Accept);
                assert_eq!(plan.event.new_owner.is_some(), changes_owner);
            }
        }
    }
}

#[test]
fn test_rejection_is_repeatable() {
    let current = snapshot(HandoffState::Active);
    let before = current.clone();
    let accept = command(HandoffAction::Accept, RECEIVER);

    let first = plan_transition(&current, &accept).unwrap_err().kind();
    let second = plan_transition(&current, &accept).unwrap_err().kind();
    assert_eq!(first, second);
    assert_eq!(current, before);
}
