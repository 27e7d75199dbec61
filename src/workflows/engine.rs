// Transactional handoff engine
//
// Every mutation runs as one unit of work: lock the target row, evaluate the
// transition against the locked snapshot, write the new row and its audit
// event, commit. Any failure rolls the whole unit back before the error is
// returned.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{error, info, warn, Instrument};

use super::state_machine::{plan_transition, validate_command, HandoffCommand};
use super::types::{Handoff, HandoffEvent, HandoffId, NewHandoffEvent};
use crate::config::ObservabilityConfig;
use crate::database::DatabaseManager;
use crate::errors::HandoffError;
use crate::observability::{transition_metrics, OperationTimer, TransitionMetrics};
use crate::store;
use crate::telemetry::{create_transition_span, generate_correlation_id};

#[derive(Debug, Clone)]
pub struct HandoffService {
    pool: SqlitePool,
    metrics_enabled: bool,
}

impl HandoffService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            metrics_enabled: true,
        }
    }

    /// Service over the manager's pool, honoring `metrics_enabled`
    pub fn from_manager(manager: &DatabaseManager, observability: &ObservabilityConfig) -> Self {
        Self::new(manager.pool().clone()).with_metrics(observability.metrics_enabled)
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn metrics(&self) -> Option<&'static TransitionMetrics> {
        self.metrics_enabled.then(transition_metrics)
    }

    pub async fn create_handoff(&self, current_owner: &str) -> Result<Handoff, HandoffError> {
        self.execute(HandoffCommand::Create {
            owner: current_owner.to_string(),
        })
        .await
    }

    pub async fn initiate_handoff(
        &self,
        handoff_id: HandoffId,
        actor: &str,
        receiving_party: &str,
    ) -> Result<Handoff, HandoffError> {
        self.execute(HandoffCommand::Initiate {
            handoff_id,
            actor: actor.to_string(),
            receiving_party: receiving_party.to_string(),
        })
        .await
    }

    pub async fn accept_handoff(
        &self,
        handoff_id: HandoffId,
        actor: &str,
    ) -> Result<Handoff, HandoffError> {
        self.execute(HandoffCommand::Accept {
            handoff_id,
            actor: actor.to_string(),
        })
        .await
    }

    pub async fn decline_handoff(
        &self,
        handoff_id: HandoffId,
        actor: &str,
    ) -> Result<Handoff, HandoffError> {
        self.execute(HandoffCommand::Decline {
            handoff_id,
            actor: actor.to_string(),
        })
        .await
    }

    /// Apply one command atomically and return the refreshed handoff
    pub async fn execute(&self, command: HandoffCommand) -> Result<Handoff, HandoffError> {
        self.run(command, None).await
    }

    /// Like [`execute`](Self::execute), but records `request_id` with the
    /// audit event. Replaying a request id that was already applied fails
    /// with `DuplicateAction` and changes nothing.
    pub async fn execute_idempotent(
        &self,
        command: HandoffCommand,
        request_id: &str,
    ) -> Result<Handoff, HandoffError> {
        self.run(command, Some(request_id.to_string())).await
    }

    async fn run(
        &self,
        command: HandoffCommand,
        request_id: Option<String>,
    ) -> Result<Handoff, HandoffError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span(
            command.action().as_str(),
            command.handoff_id(),
            command.actor(),
            &correlation_id,
        );

        async move {
            let timer = OperationTimer::new(command.action().as_str());
            let result = self.run_in_transaction(&command, request_id).await;

            match &result {
                Ok(handoff) => {
                    if let Some(metrics) = self.metrics() {
                        metrics.record_commit();
                    }
                    info!(
                        handoff.id = %handoff.id,
                        state = %handoff.state,
                        owner = %handoff.current_owner,
                        version = handoff.version,
                        "Handoff transition committed"
                    );
                }
                Err(err) => {
                    if let Some(metrics) = self.metrics() {
                        metrics.record_failure(err);
                    }
                    if err.is_rejection() {
                        warn!(error = %err, kind = err.kind().as_str(), "Handoff transition rejected");
                    } else {
                        error!(
                            error = %err,
                            retryable = err.is_retryable(),
                            "Handoff transition failed"
                        );
                    }
                }
            }
            timer.finish();
            result
        }
        .instrument(span)
        .await
    }

    async fn run_in_transaction(
        &self,
        command: &HandoffCommand,
        request_id: Option<String>,
    ) -> Result<Handoff, HandoffError> {
        validate_command(command)?;

        let mut tx = self.pool.begin().await?;
        match apply_command(&mut tx, command, request_id).await {
            Ok(handoff) => {
                tx.commit().await?;
                Ok(handoff)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                if let Some(metrics) = self.metrics() {
                    metrics.record_rollback();
                }
                Err(err)
            }
        }
    }

    /// Unlocked snapshot read. Advisory only: never decide a mutation on it,
    /// mutations re-read under the lock.
    pub async fn get_handoff(&self, handoff_id: HandoffId) -> Result<Handoff, HandoffError> {
        let mut conn = self.pool.acquire().await?;
        store::fetch_handoff(&mut conn, handoff_id)
            .await?
            .ok_or(HandoffError::HandoffNotFound { handoff_id })
    }

    /// Audit trail of a handoff, oldest event first
    pub async fn handoff_history(
        &self,
        handoff_id: HandoffId,
    ) -> Result<Vec<HandoffEvent>, HandoffError> {
        // Read transaction so the existence check and the listing see one snapshot
        let mut tx = self.pool.begin().await?;
        if store::fetch_handoff(&mut tx, handoff_id).await?.is_none() {
            return Err(HandoffError::HandoffNotFound { handoff_id });
        }
        let events = store::list_events(&mut tx, handoff_id).await?;
        tx.commit().await?;
        Ok(events)
    }

    /// Administrative delete. The store removes the audit trail with it.
    pub async fn purge_handoff(&self, handoff_id: HandoffId) -> Result<(), HandoffError> {
        let mut tx = self.pool.begin().await?;
        if !store::lock_handoff(&mut tx, handoff_id).await? {
            tx.rollback().await?;
            return Err(HandoffError::HandoffNotFound { handoff_id });
        }
        store::delete_handoff(&mut tx, handoff_id).await?;
        tx.commit().await?;

        warn!(handoff.id = %handoff_id, "Handoff purged with its audit trail");
        Ok(())
    }
}

/// Body of one unit of work. Runs on an open transaction; the caller commits
/// or rolls back.
async fn apply_command(
    conn: &mut SqliteConnection,
    command: &HandoffCommand,
    request_id: Option<String>,
) -> Result<Handoff, HandoffError> {
    let Some(handoff_id) = command.handoff_id() else {
        // Insert first so the write lock is held before the replay check
        let handoff = store::insert_handoff(conn, command.actor()).await?;
        reject_replay(conn, request_id.as_deref()).await?;
        store::insert_event(conn, &NewHandoffEvent::created(&handoff).with_request_id(request_id))
            .await?;
        return Ok(handoff);
    };

    if !store::lock_handoff(conn, handoff_id).await? {
        return Err(HandoffError::HandoffNotFound { handoff_id });
    }
    let current = store::fetch_handoff(conn, handoff_id)
        .await?
        .ok_or(HandoffError::HandoffNotFound { handoff_id })?;

    reject_replay(conn, request_id.as_deref()).await?;

    let plan = plan_transition(&current, command)?;
    plan.next.check_invariant()?;

    let updated = store::update_handoff(conn, &plan.next, current.version).await?;
    store::insert_event(conn, &plan.event.with_request_id(request_id)).await?;
    Ok(updated)
}

async fn reject_replay(
    conn: &mut SqliteConnection,
    request_id: Option<&str>,
) -> Result<(), HandoffError> {
    let Some(request_id) = request_id else {
        return Ok(());
    };
    if store::find_event_by_request_id(conn, request_id)
        .await?
        .is_some()
    {
        return Err(HandoffError::DuplicateAction {
            request_id: request_id.to_string(),
        });
    }
    Ok(())
}
