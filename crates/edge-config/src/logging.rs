//! Logging initialization for the edge replicator.
//!
//! Thin wrapper over the observability crate so every entry point installs the
//! same JSONL + stderr subscriber.

use observability::LogConfig;

/// Service name written into every log line.
const SERVICE_NAME: &str = "edge-replicator";

/// Initialize the logging system.
///
/// * `level` - Default log level (trace, debug, info, warn, error), overridden by `RUST_LOG`.
///
/// `EDGE_LOG_FILE` redirects the JSONL output away from `~/.edge-sync/logs/edge.jsonl`.
pub fn init_logging(level: &str) {
    let log_path = std::env::var("EDGE_LOG_FILE")
        .ok()
        .and_then(non_empty_env)
        .map(std::path::PathBuf::from);

    observability::init_with_config(LogConfig {
        service_name: SERVICE_NAME.into(),
        default_level: level.into(),
        log_path,
        also_stderr: true,
    });
}

fn non_empty_env(raw: String) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
