//! # Casework Configuration System
//!
//! YAML-based configuration with environment-specific overrides. A single
//! `casework-config.yaml` holds the base values; top-level `development`,
//! `test` and `production` sections are deep-merged over the base for the
//! detected environment.
//!
//! ```rust,no_run
//! use casework_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let workers = manager.config().orchestration.worker_pool_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring casework-config.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CaseworkConfig {
    /// Database connection and pooling configuration
    pub database: DatabaseConfig,

    /// Message queue names and polling
    pub pgmq: PgmqConfig,

    /// Orchestration worker pool and locking
    pub orchestration: OrchestrationConfig,

    /// Automatic approval decision settings
    pub decision: DecisionConfig,

    /// Periodic maintenance outside orchestration passes
    pub housekeeping: HousekeepingConfig,

    /// Resolved environment name, set by the loader
    #[serde(skip_deserializing)]
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Milliseconds a pass waits for a context row lock before giving up
    pub lock_timeout_ms: u64,
    #[serde(default)]
    pub skip_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            username: "casework".to_string(),
            password: "casework".to_string(),
            database: "casework_development".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
            lock_timeout_ms: 2_000,
            skip_migrations: false,
        }
    }
}

impl DatabaseConfig {
    /// Connection url, preferring an explicit `url` over the discrete fields.
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PgmqConfig {
    /// Inbound case events and answers
    pub inbound_queue: String,
    /// Outbound requests (behov)
    pub request_queue: String,
    /// Outbound cancellation notifications
    pub cancellation_queue: String,
    pub batch_size: i32,
    pub visibility_timeout_seconds: i32,
    pub poll_interval_ms: u64,
}

impl Default for PgmqConfig {
    fn default() -> Self {
        Self {
            inbound_queue: crate::constants::queues::INBOUND.to_string(),
            request_queue: crate::constants::queues::REQUESTS.to_string(),
            cancellation_queue: crate::constants::queues::CANCELLATIONS.to_string(),
            batch_size: 10,
            visibility_timeout_seconds: 60,
            poll_interval_ms: 250,
        }
    }
}

impl PgmqConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    /// Upper bound on concurrently processed messages
    pub worker_pool_size: usize,
    /// Attempts to acquire a contended context row before surfacing a transient error
    pub lock_retry_attempts: u32,
    pub lock_retry_backoff_ms: u64,
    /// Message ids remembered per context for duplicate detection
    pub processed_message_history: usize,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 8,
            lock_retry_attempts: 3,
            lock_retry_backoff_ms: 100,
            processed_message_history: 64,
        }
    }
}

impl OrchestrationConfig {
    pub fn lock_retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.lock_retry_backoff_ms * u64::from(attempt))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub sampling_enabled: bool,
    /// Share of otherwise automatic cases picked for manual review, in per mille
    pub sampling_rate_per_mille: u16,
    /// Open externally-tracked manual tasks tolerated before blocking automation
    pub max_open_manual_tasks: u32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            sampling_enabled: true,
            sampling_rate_per_mille: 10,
            max_open_manual_tasks: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    pub archive_after_days: i64,
    pub republish_after_minutes: i64,
    pub interval_seconds: u64,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            archive_after_days: 90,
            republish_after_minutes: 60,
            interval_seconds: 300,
        }
    }
}

impl CaseworkConfig {
    /// Reject configurations that cannot run.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.orchestration.worker_pool_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "orchestration.worker_pool_size",
                "0",
                "at least one worker is required",
            ));
        }
        if self.orchestration.worker_pool_size as u32 > self.database.max_connections {
            return Err(ConfigurationError::invalid_value(
                "orchestration.worker_pool_size",
                self.orchestration.worker_pool_size.to_string(),
                format!(
                    "each worker holds a connection for its pass; max_connections is {}",
                    self.database.max_connections
                ),
            ));
        }
        if self.pgmq.batch_size <= 0 {
            return Err(ConfigurationError::invalid_value(
                "pgmq.batch_size",
                self.pgmq.batch_size.to_string(),
                "must be positive",
            ));
        }
        if self.decision.sampling_rate_per_mille > 1000 {
            return Err(ConfigurationError::invalid_value(
                "decision.sampling_rate_per_mille",
                self.decision.sampling_rate_per_mille.to_string(),
                "must be between 0 and 1000",
            ));
        }
        for (field, value) in [
            ("pgmq.inbound_queue", &self.pgmq.inbound_queue),
            ("pgmq.request_queue", &self.pgmq.request_queue),
            ("pgmq.cancellation_queue", &self.pgmq.cancellation_queue),
        ] {
            if value.is_empty() {
                return Err(ConfigurationError::missing_required_field(field, "pgmq"));
            }
        }
        Ok(())
    }
}
