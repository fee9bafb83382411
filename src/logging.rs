//! # Structured Logging Module
//!
//! Environment-aware structured logging to console and a JSON file.
//!
//! Full diagnostic payloads (case data, answers, error chains) are written only
//! to the restricted audit channel: events with target [`AUDIT_TARGET`] go to the
//! JSON file layer and are filtered out of the console layer.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::filter_fn, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};
use uuid::Uuid;

/// Tracing target of the restricted audit channel
pub const AUDIT_TARGET: &str = "casework::audit";

static LOGGER_INITIALIZED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let log_dir = PathBuf::from("log");
        let file_layer_guard = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let pid = process::id();
                let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
                let file_appender = tracing_appender::rolling::never(
                    &log_dir,
                    format!("{environment}.{pid}.{timestamp}.log"),
                );
                Some(tracing_appender::non_blocking(file_appender))
            }
            Err(e) => {
                eprintln!("Could not create log directory {}: {e}", log_dir.display());
                None
            }
        };

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()))
            .with_filter(filter_fn(|metadata| metadata.target() != AUDIT_TARGET));

        let (file_layer, guard) = match file_layer_guard {
            Some((file_writer, guard)) => (
                Some(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(EnvFilter::new(format!("{log_level},{AUDIT_TARGET}=info"))),
                ),
                Some(guard),
            ),
            None => (None, None),
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            "Structured logging initialized"
        );

        guard
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("CASEWORK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment, honouring RUST_LOG when set
fn get_log_level(environment: &str) -> String {
    if let Ok(level) = std::env::var("RUST_LOG") {
        return level;
    }
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for execution context lifecycle operations
pub fn log_context_operation(
    operation: &str,
    correlation_id: Uuid,
    sequence: Option<&str>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        correlation_id = %correlation_id,
        sequence = sequence,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "CONTEXT_OPERATION"
    );
}

/// Log structured data for step operations
pub fn log_step_operation(
    operation: &str,
    correlation_id: Uuid,
    step_name: &str,
    status: &str,
    details: Option<&str>,
) {
    tracing::debug!(
        operation = %operation,
        correlation_id = %correlation_id,
        step_name = %step_name,
        status = %status,
        details = details,
        "STEP_OPERATION"
    );
}

/// Log error with context, without payloads
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}

/// Write a full diagnostic payload for a failed pass to the restricted channel
pub fn audit_failure(
    correlation_id: Uuid,
    message_id: Uuid,
    error: &str,
    payload: &serde_json::Value,
) {
    tracing::error!(
        target: AUDIT_TARGET,
        correlation_id = %correlation_id,
        message_id = %message_id,
        error = %error,
        payload = %payload,
        timestamp = %Utc::now().to_rfc3339(),
        "AUDIT_PASS_FAILED"
    );
}

/// Write a decision record to the restricted channel
pub fn audit_decision(correlation_id: Uuid, vedtaksperiode_id: Uuid, record: &serde_json::Value) {
    tracing::info!(
        target: AUDIT_TARGET,
        correlation_id = %correlation_id,
        vedtaksperiode_id = %vedtaksperiode_id,
        record = %record,
        timestamp = %Utc::now().to_rfc3339(),
        "AUDIT_DECISION"
    );
}

/// Write a sampling draw to the restricted channel so audits can reproduce it
pub fn audit_sampling(vedtaksperiode_id: Uuid, policy: &str, roll: Option<u16>, sampled: bool) {
    tracing::info!(
        target: AUDIT_TARGET,
        vedtaksperiode_id = %vedtaksperiode_id,
        policy = %policy,
        roll = roll,
        sampled = sampled,
        timestamp = %Utc::now().to_rfc3339(),
        "AUDIT_SAMPLING_DRAW"
    );
}
