// Core types for the handoff workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::HandoffError;

/// Store-assigned handoff identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandoffId(pub i64);

impl fmt::Display for HandoffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow state of a handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffState {
    /// Owned by `current_owner`, no transfer offered
    Active,
    /// Transfer offered to `receiving_party`, awaiting accept or decline
    Pending,
    /// Reserved by the schema. No transition produces it and no action is
    /// legal from it.
    Accepted,
}

impl HandoffState {
    pub const ALL: [HandoffState; 3] = [
        HandoffState::Active,
        HandoffState::Pending,
        HandoffState::Accepted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffState::Active => "active",
            HandoffState::Pending => "pending",
            HandoffState::Accepted => "accepted",
        }
    }

    /// Whether a handoff in this state must carry a receiving party
    pub fn requires_receiving_party(&self) -> bool {
        matches!(self, HandoffState::Pending)
    }
}

impl fmt::Display for HandoffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandoffState {
    type Err = HandoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(HandoffState::Active),
            "pending" => Ok(HandoffState::Pending),
            "accepted" => Ok(HandoffState::Accepted),
            other => Err(HandoffError::CorruptRecord {
                reason: format!("unknown handoff state '{other}'"),
            }),
        }
    }
}

/// Action recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffAction {
    Create,
    Initiate,
    Accept,
    Decline,
}

impl HandoffAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffAction::Create => "create",
            HandoffAction::Initiate => "initiate",
            HandoffAction::Accept => "accept",
            HandoffAction::Decline => "decline",
        }
    }
}

impl fmt::Display for HandoffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandoffAction {
    type Err = HandoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(HandoffAction::Create),
            "initiate" => Ok(HandoffAction::Initiate),
            "accept" => Ok(HandoffAction::Accept),
            "decline" => Ok(HandoffAction::Decline),
            other => Err(HandoffError::CorruptRecord {
                reason: format!("unknown handoff action '{other}'"),
            }),
        }
    }
}

/// A resource whose ownership moves between parties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    pub id: HandoffId,
    pub current_owner: String,
    /// Present only while `state` is `Pending`
    pub receiving_party: Option<String>,
    pub state: HandoffState,
    /// Bumped by every committed transition
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Handoff {
    /// Checks that `receiving_party` is set iff the handoff is pending
    pub fn check_invariant(&self) -> Result<(), HandoffError> {
        let required = self.state.requires_receiving_party();
        let present = self.receiving_party.is_some();
        if required != present {
            return Err(HandoffError::CorruptRecord {
                reason: format!(
                    "handoff {} in state '{}' {} a receiving party",
                    self.id,
                    self.state,
                    if present { "must not have" } else { "must have" }
                ),
            });
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.state == HandoffState::Pending
    }
}

/// One immutable row of the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffEvent {
    pub id: i64,
    pub handoff_id: HandoffId,
    pub action: HandoffAction,
    pub actor: String,
    /// `None` for the initial `create`
    pub from_state: Option<HandoffState>,
    pub to_state: HandoffState,
    pub previous_owner: Option<String>,
    pub new_owner: Option<String>,
    /// Target party named by an `initiate`
    pub receiving_party: Option<String>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Event content before the store assigns its id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHandoffEvent {
    pub handoff_id: HandoffId,
    pub action: HandoffAction,
    pub actor: String,
    pub from_state: Option<HandoffState>,
    pub to_state: HandoffState,
    pub previous_owner: Option<String>,
    pub new_owner: Option<String>,
    pub receiving_party: Option<String>,
    pub request_id: Option<String>,
}

impl NewHandoffEvent {
    /// Audit record for a freshly created handoff
    pub fn created(handoff: &Handoff) -> Self {
        Self {
            handoff_id: handoff.id,
            action: HandoffAction::Create,
            actor: handoff.current_owner.clone(),
            from_state: None,
            to_state: handoff.state,
            previous_owner: None,
            new_owner: None,
            receiving_party: None,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handoff(state: HandoffState, receiving_party: Option<&str>) -> Handoff {
        Handoff {
            id: HandoffId(1),
            current_owner: "alice".to_string(),
            receiving_party: receiving_party.map(str::to_string),
            state,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_state_strings_are_closed() {
        for state in HandoffState::ALL {
            assert_eq!(state.as_str().parse::<HandoffState>().unwrap(), state);
        }
        assert!("archived".parse::<HandoffState>().is_err());
        assert!("Active".parse::<HandoffState>().is_err());
    }

    #[test]
    fn test_action_strings_are_closed() {
        assert_eq!("decline".parse::<HandoffAction>().unwrap(), HandoffAction::Decline);
        assert!("revoke".parse::<HandoffAction>().is_err());
    }

    #[test]
    fn test_invariant() {
        assert!(handoff(HandoffState::Active, None).check_invariant().is_ok());
        assert!(handoff(HandoffState::Pending, Some("bob")).check_invariant().is_ok());
        assert!(handoff(HandoffState::Accepted, None).check_invariant().is_ok());

        assert!(handoff(HandoffState::Active, Some("bob")).check_invariant().is_err());
        assert!(handoff(HandoffState::Pending, None).check_invariant().is_err());
        assert!(handoff(HandoffState::Accepted, Some("bob")).check_invariant().is_err());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_string(&HandoffState::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
