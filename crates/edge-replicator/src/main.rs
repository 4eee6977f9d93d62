//! edge-replicator binary entry point.
//!
//! Usage: edge-replicator [--config <path>] [--log-level <level>] [--sync-now-on-start]
//!
//! Signals: SIGUSR1 requests an immediate full resync, SIGHUP reloads the
//! config file, Ctrl-C or SIGTERM stops.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use edge_config::{init_logging, EdgeConfig, Paths};
use edge_replicator::{DirectorySync, EdgeSyncPlugin, HttpConnector, PluginHost, PluginState};
use tracing::{error, info, warn};

/// Keeps the local edge store in sync with the remote directory.
#[derive(Parser, Debug)]
#[command(name = "edge-replicator")]
#[command(about = "Replicates a remote directory into the local edge store")]
struct Args {
    /// Config file. Defaults to ~/.edge-sync/config.json.
    #[arg(long, env = "EDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Run a full resync as soon as the scheduler starts.
    #[arg(long)]
    sync_now_on_start: bool,
}

/// Standalone host: status changes only go to the log.
struct StandaloneHost {
    tenant_id: Option<String>,
}

impl PluginHost for StandaloneHost {
    fn update_plugin_status(&self, name: &str, state: PluginState) {
        info!(plugin = name, state = ?state, "Plugin status changed");
    }

    fn tenant_id(&self) -> Option<String> {
        self.tenant_id.clone()
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EdgeConfig> {
    let config = match path {
        Some(path) => {
            let mut config = EdgeConfig::load_from_file(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            config.load_from_env();
            config
        }
        None => EdgeConfig::load(&Paths::new()?)?,
    };
    config.sync.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    info!(
        sync = ?config.sync,
        local_services = config.local.services.len(),
        "Configuration loaded"
    );

    let tenant_id = Some(config.sync.tenant_id.clone()).filter(|t| !t.is_empty());
    let host = Arc::new(StandaloneHost { tenant_id });
    let task = Arc::new(DirectorySync::new(HttpConnector::new(config.local.clone())));
    let plugin = EdgeSyncPlugin::new(host, task, config.sync);

    plugin.start().await;
    if args.sync_now_on_start && !plugin.sync_now().await {
        warn!("--sync-now-on-start ignored: sync is disabled");
    }

    let served = serve(&plugin, args.config.as_deref()).await;
    plugin.stop().await;
    served
}

#[cfg(unix)]
async fn serve(plugin: &EdgeSyncPlugin, config_path: Option<&Path>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sync_now = signal(SignalKind::user_defined1()).context("install SIGUSR1 handler")?;
    let mut reload = signal(SignalKind::hangup()).context("install SIGHUP handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("wait for Ctrl+C")?;
                info!("Received Ctrl+C, shutting down");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM, shutting down");
                return Ok(());
            }
            _ = sync_now.recv() => {
                if !plugin.sync_now().await {
                    warn!("SIGUSR1 ignored: sync is disabled");
                }
            }
            _ = reload.recv() => match load_config(config_path) {
                Ok(config) => plugin.reconfigure(config.sync).await,
                Err(e) => error!(error = %e, "Config reload failed; keeping current settings"),
            },
        }
    }
}

#[cfg(not(unix))]
async fn serve(_plugin: &EdgeSyncPlugin, _config_path: Option<&Path>) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await.context("wait for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down");
    Ok(())
}
