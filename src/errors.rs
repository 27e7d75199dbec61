use thiserror::Error;

use crate::workflows::types::{HandoffAction, HandoffId, HandoffState};

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("Handoff {handoff_id} not found")]
    HandoffNotFound { handoff_id: HandoffId },

    #[error("Cannot {action} handoff from state '{current_state}'")]
    InvalidStateTransition {
        action: HandoffAction,
        current_state: HandoffState,
    },

    #[error("Actor '{actor}' is not authorized to {action} this handoff")]
    UnauthorizedActor { action: HandoffAction, actor: String },

    #[error("Request '{request_id}' has already been applied")]
    DuplicateAction { request_id: String },

    #[error("Invalid party: {reason}")]
    InvalidParty { reason: String },

    #[error("Corrupt handoff record: {reason}")]
    CorruptRecord { reason: String },

    #[error("Handoff {handoff_id} was modified concurrently")]
    ConcurrentModification { handoff_id: HandoffId },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Fieldless discriminant of [`HandoffError`], for comparing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandoffErrorKind {
    HandoffNotFound,
    InvalidStateTransition,
    UnauthorizedActor,
    DuplicateAction,
    InvalidParty,
    CorruptRecord,
    ConcurrentModification,
    Database,
    Migration,
}

impl HandoffErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffErrorKind::HandoffNotFound => "handoff_not_found",
            HandoffErrorKind::InvalidStateTransition => "invalid_state_transition",
            HandoffErrorKind::UnauthorizedActor => "unauthorized_actor",
            HandoffErrorKind::DuplicateAction => "duplicate_action",
            HandoffErrorKind::InvalidParty => "invalid_party",
            HandoffErrorKind::CorruptRecord => "corrupt_record",
            HandoffErrorKind::ConcurrentModification => "concurrent_modification",
            HandoffErrorKind::Database => "database",
            HandoffErrorKind::Migration => "migration",
        }
    }
}

impl HandoffError {
    pub fn kind(&self) -> HandoffErrorKind {
        match self {
            HandoffError::HandoffNotFound { .. } => HandoffErrorKind::HandoffNotFound,
            HandoffError::InvalidStateTransition { .. } => HandoffErrorKind::InvalidStateTransition,
            HandoffError::UnauthorizedActor { .. } => HandoffErrorKind::UnauthorizedActor,
            HandoffError::DuplicateAction { .. } => HandoffErrorKind::DuplicateAction,
            HandoffError::InvalidParty { .. } => HandoffErrorKind::InvalidParty,
            HandoffError::CorruptRecord { .. } => HandoffErrorKind::CorruptRecord,
            HandoffError::ConcurrentModification { .. } => HandoffErrorKind::ConcurrentModification,
            HandoffError::Database(_) => HandoffErrorKind::Database,
            HandoffError::Migration(_) => HandoffErrorKind::Migration,
        }
    }

    /// Workflow rejections are caller mistakes, not storage failures
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            HandoffError::HandoffNotFound { .. }
                | HandoffError::InvalidStateTransition { .. }
                | HandoffError::UnauthorizedActor { .. }
                | HandoffError::DuplicateAction { .. }
                | HandoffError::InvalidParty { .. }
        )
    }

    /// True when the same call may succeed if retried: lost optimistic
    /// races and lock-wait timeouts.
    pub fn is_retryable(&self) -> bool {
        match self {
            HandoffError::ConcurrentModification { .. } => true,
            HandoffError::Database(err) => is_lock_timeout(err),
            _ => false,
        }
    }
}

/// Lock-wait timeouts surface from SQLite as BUSY/LOCKED (or one of their
/// extended codes) and from the pool as an acquire timeout.
fn is_lock_timeout(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    }
}
