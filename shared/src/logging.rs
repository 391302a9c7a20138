//! Shared logging utilities for consistent tracing across the pipeline

use crate::types::Stage;
use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Filter string applied when `RUST_LOG` is not set
pub fn default_filter(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");
    format!("checker={base_level},bridge_check={base_level},shared={base_level},reqwest=warn,hyper=warn")
}

/// Initialize the tracing subscriber with an optional log level
///
/// `RUST_LOG` wins over the level argument when it is set. Safe to call more
/// than once; later calls are ignored.
pub fn init_tracing(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(log_level)));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for stage-aware info logging
#[macro_export]
macro_rules! stage_info {
    ($stage:expr, $($arg:tt)*) => {
        tracing::info!(
            stage = %$stage,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for stage-aware warning logging
#[macro_export]
macro_rules! stage_warn {
    ($stage:expr, $($arg:tt)*) => {
        tracing::warn!(
            stage = %$stage,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for stage-aware error logging
#[macro_export]
macro_rules! stage_error {
    ($stage:expr, $($arg:tt)*) => {
        tracing::error!(
            stage = %$stage,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for stage-aware debug logging
#[macro_export]
macro_rules! stage_debug {
    ($stage:expr, $($arg:tt)*) => {
        tracing::debug!(
            stage = %$stage,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(details: &str) {
    info!(
        stage = %Stage::Intake,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(stage: Stage, context: &str, error: &dyn std::fmt::Display) {
    error!(
        stage = %stage,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(stage: Stage, message: &str) {
    info!(
        stage = %stage,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

/// Per-identifier progress line (`[index/total]`), advisory only
pub fn log_progress(index: usize, total: usize, subject: &str, details: &str) {
    info!(
        stage = %Stage::Checker,
        timestamp = format_timestamp(),
        index,
        total,
        "📋 [{}/{}] {}: {}",
        index,
        total,
        subject,
        details
    );
}
