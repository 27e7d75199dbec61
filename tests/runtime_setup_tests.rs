//! Process-wide setup: global configuration, the shared database manager and
//! the metrics switch.
//!
//! Nothing in this binary runs with counters enabled, so the global
//! transition counters must stay exactly where they are.

use handoff_ledger::{
    config, database_pool, init_config, init_database, shutdown_database, transition_metrics,
    DatabaseManager, HandoffService, HandoffState, ObservabilityConfig,
};
use tempfile::TempDir;

mod fixtures;

#[tokio::test]
async fn test_global_database_lifecycle_honors_environment() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", dir.path().join("global.db").display());
    std::env::set_var("HANDOFF_DATABASE__URL", &url);
    std::env::set_var("HANDOFF_OBSERVABILITY__METRICS_ENABLED", "false");

    init_config().unwrap();
    let loaded = config().unwrap();
    assert_eq!(loaded.database.url, url);
    assert!(!loaded.observability.metrics_enabled);

    assert!(database_pool().await.is_none());
    init_database().await.unwrap();
    let pool = database_pool().await.expect("pool after init");

    let before = transition_metrics().get_stats();
    let service =
        HandoffService::new(pool.clone()).with_metrics(loaded.observability.metrics_enabled);
    let created = service.create_handoff("alice").await.unwrap();
    service.accept_handoff(created.id, "alice").await.unwrap_err();
    assert_eq!(transition_metrics().get_stats(), before);

    shutdown_database().await;
    assert!(pool.is_closed());
}

#[tokio::test]
async fn test_disabled_metrics_leave_counters_untouched() {
    let dir = TempDir::new().unwrap();
    let manager = DatabaseManager::new(&fixtures::test_config(&dir))
        .await
        .unwrap();
    let observability = ObservabilityConfig {
        metrics_enabled: false,
        ..ObservabilityConfig::default()
    };
    let service = HandoffService::from_manager(&manager, &observability);

    let before = transition_metrics().get_stats();
    let id = service.create_handoff("alice").await.unwrap().id;
    let pending = service.initiate_handoff(id, "alice", "bob").await.unwrap();
    assert_eq!(pending.state, HandoffState::Pending);
    service.decline_handoff(id, "carol").await.unwrap_err();
    service.create_handoff("  ").await.unwrap_err();

    assert_eq!(transition_metrics().get_stats(), before);
    manager.shutdown().await;
}
