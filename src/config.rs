use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the handoff ledger
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HandoffConfig {
    /// Handoff Store settings
    pub database: DatabaseConfig,
    /// Logging and metrics settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite connection string or file path
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
    /// How long a transition waits for the write lock before failing
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level used when RUST_LOG is unset
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    /// Enable transition counters
    pub metrics_enabled: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://.handoff/handoffs.db".to_string(),
            max_connections: 8,
            auto_migrate: true,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
            metrics_enabled: true,
        }
    }
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl HandoffConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (handoff.toml, .handoff-rc)
    /// 3. Environment variables (prefixed with HANDOFF_, nested with __)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`HandoffConfig::load`], resolving config files under `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("handoff.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".handoff-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("HANDOFF")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let handoff_config: HandoffConfig = config.try_deserialize()?;
        Ok(handoff_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<HandoffConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = HandoffConfig::load_env_file();
        HandoffConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static HandoffConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_no_files() {
        let dir = TempDir::new().unwrap();
        let loaded = HandoffConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.database.busy_timeout(), Duration::from_secs(5));
        assert!(loaded.database.auto_migrate);
        assert_eq!(loaded.observability.log_level, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("handoff.toml"),
            "[database]\nurl = \"sqlite://custom.db\"\nmax_connections = 2\n",
        )
        .unwrap();

        let loaded = HandoffConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.database.url, "sqlite://custom.db");
        assert_eq!(loaded.database.max_connections, 2);
        // Untouched keys keep their defaults
        assert_eq!(loaded.database.busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut original = HandoffConfig::default();
        original.observability.json_logs = false;
        original.database.busy_timeout_ms = 250;

        original.save_to_file(dir.path().join("handoff.toml")).unwrap();
        let reloaded = HandoffConfig::load_from(dir.path()).unwrap();
        assert_eq!(reloaded, original);
    }
}
