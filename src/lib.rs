// Handoff Ledger Library - ownership handoffs with an immutable audit trail
// This exposes the engine, its store and the ambient setup for integration

pub mod config;
pub mod database;
pub mod errors;
pub mod observability;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use crate::config::{config, init_config, DatabaseConfig, HandoffConfig, ObservabilityConfig};
pub use crate::database::{database_pool, init_database, shutdown_database, DatabaseManager};
pub use crate::errors::{HandoffError, HandoffErrorKind};
pub use crate::observability::{transition_metrics, OperationTimer, TransitionMetrics, TransitionStats};
pub use crate::telemetry::{create_transition_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use crate::workflows::{
    Handoff, HandoffAction, HandoffCommand, HandoffEvent, HandoffId, HandoffService, HandoffState,
};
