// Handoff Store queries
//
// Every function runs on a caller-supplied connection so the engine can
// group several of them into one transaction.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::errors::HandoffError;
use crate::workflows::types::{Handoff, HandoffEvent, HandoffId, HandoffState, NewHandoffEvent};

const HANDOFF_COLUMNS: &str =
    "id, current_owner, receiving_party, state, version, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, handoff_id, action, actor, from_state, to_state, previous_owner, \
     new_owner, receiving_party, request_id, created_at";

#[derive(Debug, FromRow)]
struct HandoffRow {
    id: i64,
    current_owner: String,
    receiving_party: Option<String>,
    state: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<HandoffRow> for Handoff {
    type Error = HandoffError;

    fn try_from(row: HandoffRow) -> Result<Self, Self::Error> {
        let handoff = Handoff {
            id: HandoffId(row.id),
            current_owner: row.current_owner,
            receiving_party: row.receiving_party,
            state: row.state.parse()?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        handoff.check_invariant()?;
        Ok(handoff)
    }
}

#[derive(Debug, FromRow)]
struct EventRow {
    id: i64,
    handoff_id: i64,
    action: String,
    actor: String,
    from_state: Option<String>,
    to_state: String,
    previous_owner: Option<String>,
    new_owner: Option<String>,
    receiving_party: Option<String>,
    request_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for HandoffEvent {
    type Error = HandoffError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(HandoffEvent {
            id: row.id,
            handoff_id: HandoffId(row.handoff_id),
            action: row.action.parse()?,
            actor: row.actor,
            from_state: row.from_state.as_deref().map(str::parse).transpose()?,
            to_state: row.to_state.parse()?,
            previous_owner: row.previous_owner,
            new_owner: row.new_owner,
            receiving_party: row.receiving_party,
            request_id: row.request_id,
            created_at: row.created_at,
        })
    }
}

/// Insert a new handoff owned by `owner` in the `active` state
pub async fn insert_handoff(
    conn: &mut SqliteConnection,
    owner: &str,
) -> Result<Handoff, HandoffError> {
    let sql = format!(
        "INSERT INTO handoffs (current_owner, state) VALUES (?1, ?2) RETURNING {HANDOFF_COLUMNS}"
    );
    let row: HandoffRow = sqlx::query_as(&sql)
        .bind(owner)
        .bind(HandoffState::Active.as_str())
        .fetch_one(&mut *conn)
        .await?;
    row.try_into()
}

/// Take the exclusive write lock covering `handoff_id`.
///
/// SQLite has no `SELECT ... FOR UPDATE`. A no-op write as the first
/// statement of a transaction acquires the database write lock, which blocks
/// every other writer (up to the busy timeout) until this transaction
/// commits or rolls back. Returns `false` when the handoff does not exist.
pub async fn lock_handoff(
    conn: &mut SqliteConnection,
    handoff_id: HandoffId,
) -> Result<bool, HandoffError> {
    let result = sqlx::query("UPDATE handoffs SET version = version WHERE id = ?1")
        .bind(handoff_id.0)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_handoff(
    conn: &mut SqliteConnection,
    handoff_id: HandoffId,
) -> Result<Option<Handoff>, HandoffError> {
    let sql = format!("SELECT {HANDOFF_COLUMNS} FROM handoffs WHERE id = ?1");
    let row: Option<HandoffRow> = sqlx::query_as(&sql)
        .bind(handoff_id.0)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Handoff::try_from).transpose()
}

/// Write `next` over the stored row if it is still at `expected_version`.
///
/// Bumps `version` and `updated_at`. A row that moved on since it was read
/// yields `ConcurrentModification`.
pub async fn update_handoff(
    conn: &mut SqliteConnection,
    next: &Handoff,
    expected_version: i64,
) -> Result<Handoff, HandoffError> {
    let sql = format!(
        "UPDATE handoffs
         SET current_owner = ?1,
             receiving_party = ?2,
             state = ?3,
             version = version + 1,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?4 AND version = ?5
         RETURNING {HANDOFF_COLUMNS}"
    );
    let row: Option<HandoffRow> = sqlx::query_as(&sql)
        .bind(next.current_owner.as_str())
        .bind(next.receiving_party.as_deref())
        .bind(next.state.as_str())
        .bind(next.id.0)
        .bind(expected_version)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => row.try_into(),
        None => Err(HandoffError::ConcurrentModification {
            handoff_id: next.id,
        }),
    }
}

/// Append one audit event
pub async fn insert_event(
    conn: &mut SqliteConnection,
    event: &NewHandoffEvent,
) -> Result<HandoffEvent, HandoffError> {
    let sql = format!(
        "INSERT INTO handoff_events
            (handoff_id, action, actor, from_state, to_state,
             previous_owner, new_owner, receiving_party, request_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         RETURNING {EVENT_COLUMNS}"
    );
    let result = sqlx::query_as::<_, EventRow>(&sql)
        .bind(event.handoff_id.0)
        .bind(event.action.as_str())
        .bind(event.actor.as_str())
        .bind(event.from_state.map(|s| s.as_str()))
        .bind(event.to_state.as_str())
        .bind(event.previous_owner.as_deref())
        .bind(event.new_owner.as_deref())
        .bind(event.receiving_party.as_deref())
        .bind(event.request_id.as_deref())
        .fetch_one(&mut *conn)
        .await;

    match result {
        Ok(row) => row.try_into(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Err(HandoffError::DuplicateAction {
                request_id: event.request_id.clone().unwrap_or_default(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn find_event_by_request_id(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<Option<HandoffEvent>, HandoffError> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM handoff_events WHERE request_id = ?1");
    let row: Option<EventRow> = sqlx::query_as(&sql)
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(HandoffEvent::try_from).transpose()
}

/// Audit trail of one handoff, oldest first
pub async fn list_events(
    conn: &mut SqliteConnection,
    handoff_id: HandoffId,
) -> Result<Vec<HandoffEvent>, HandoffError> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM handoff_events WHERE handoff_id = ?1 ORDER BY id ASC"
    );
    let rows: Vec<EventRow> = sqlx::query_as(&sql)
        .bind(handoff_id.0)
        .fetch_all(&mut *conn)
        .await?;
    rows.into_iter().map(HandoffEvent::try_from).collect()
}

/// Administrative removal; the store cascades to the handoff's events
pub async fn delete_handoff(
    conn: &mut SqliteConnection,
    handoff_id: HandoffId,
) -> Result<bool, HandoffError> {
    let result = sqlx::query("DELETE FROM handoffs WHERE id = ?1")
        .bind(handoff_id.0)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
