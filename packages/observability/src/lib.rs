//! # Observability
//!
//! Centralized tracing setup for the edge replication service.
//!
//! Every binary calls [`init_with_config`] once at startup and then uses the
//! standard `tracing` macros. Log lines are written as JSONL to a single file
//! (`~/.edge-sync/logs/edge.jsonl` by default) so that replication cycles can
//! be followed with `tail -f ... | jq`:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "edge-replicator".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!(cycle_id = %id, "sync cycle started");
//! ```
//!
//! Fields whose names look like credentials (`apikey`, `authorization`, ...)
//! are redacted before they reach the file.

mod file_writer;
mod json_layer;

use std::path::PathBuf;

pub use file_writer::{default_log_path, CentralLogWriter};
pub use json_layer::{redact_field, JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "edge-replicator").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.edge-sync/logs/edge.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize the observability layer with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the observability layer with custom configuration.
///
/// Falls back to a stderr-only subscriber when the log file cannot be
/// opened, so a read-only home directory never prevents startup.
pub fn init_with_config(config: LogConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let log_path = config.log_path.clone().or_else(default_log_path);
    let writer = log_path
        .as_ref()
        .and_then(|path| CentralLogWriter::new(path).ok());

    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let json_layer = writer.map(|writer| {
        JsonLayer::new(config.service_name.clone(), writer).with_filter(env_filter())
    });

    let stderr_layer = if config.also_stderr || json_layer.is_none() {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .compact()
                .with_writer(std::io::stderr)
                .with_filter(env_filter()),
        )
    } else {
        None
    };

    let file_enabled = json_layer.is_some();
    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            service = %config.service_name,
            log_path = ?log_path.filter(|_| file_enabled).map(|p| p.display().to_string()),
            "observability initialized"
        );
    }
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
