//! # Structured Logging Module
//!
//! Environment-aware structured logging for mining lifecycle and serialization
//! operations. Human-readable output in development and test, JSON in production.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        // A global subscriber may already be installed by the embedding application
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            log_level = %log_level,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("MINER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for mining driver operations
pub fn log_mining_operation(
    operation: &str,
    task_id: i64,
    engine: &str,
    state: &str,
    import_state: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = task_id,
        engine = %engine,
        state = %state,
        import_state = %import_state,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "⛏️ MINING_OPERATION"
    );
}

/// Log structured data for background import rounds
pub fn log_import_operation(
    operation: &str,
    task_id: i64,
    import_state: &str,
    rules_count: Option<i64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = task_id,
        import_state = %import_state,
        rules_count = rules_count,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📥 IMPORT_OPERATION"
    );
}

/// Log structured data for PMML document construction
pub fn log_serialization(
    document: &str,
    task_id: i64,
    rules: usize,
    bytes: usize,
    duration_ms: Option<u64>,
) {
    tracing::info!(
        document = %document,
        task_id = task_id,
        rules = rules,
        bytes = bytes,
        duration_ms = duration_ms,
        timestamp = %Utc::now().to_rfc3339(),
        "📄 SERIALIZATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
