//! Throwaway SQLite-backed ledgers for integration tests
#![allow(dead_code)]

use handoff_ledger::{
    DatabaseConfig, DatabaseManager, HandoffId, HandoffService, ObservabilityConfig,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

/// A migrated database in a temporary directory plus a service over it.
/// The directory lives as long as the ledger.
pub struct TestLedger {
    pub service: HandoffService,
    pub manager: DatabaseManager,
    _dir: TempDir,
}

impl TestLedger {
    pub fn pool(&self) -> &SqlitePool {
        self.manager.pool()
    }

    pub async fn event_count(&self, handoff_id: HandoffId) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM handoff_events WHERE handoff_id = ?1")
            .bind(handoff_id.0)
            .fetch_one(self.pool())
            .await
            .expect("count events")
    }

    pub async fn handoff_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM handoffs")
            .fetch_one(self.pool())
            .await
            .expect("count handoffs")
    }

    /// Rows violating "pending iff receiving party", read straight from storage
    pub async fn invariant_violations(&self) -> i64 {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM handoffs
             WHERE (state = 'pending') != (receiving_party IS NOT NULL)",
        )
        .fetch_one(self.pool())
        .await
        .expect("scan invariant")
    }
}

pub fn test_config(dir: &TempDir) -> DatabaseConfig {
    DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("handoffs.db").display()),
        max_connections: 8,
        auto_migrate: true,
        busy_timeout_ms: 5_000,
    }
}

pub async fn ledger() -> TestLedger {
    ledger_with(|_| {}).await
}

pub async fn ledger_with(customize: impl FnOnce(&mut DatabaseConfig)) -> TestLedger {
    let dir = TempDir::new().expect("create temp dir");
    let mut config = test_config(&dir);
    customize(&mut config);

    let manager = DatabaseManager::new(&config)
        .await
        .expect("open test database");
    let service = HandoffService::from_manager(&manager, &ObservabilityConfig::default());
    TestLedger {
        service,
        manager,
        _dir: dir,
    }
}
