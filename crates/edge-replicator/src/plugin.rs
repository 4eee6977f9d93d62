//! Host-managed lifecycle for edge replication.
//!
//! The host calls `start`, `stop` and `reconfigure`; the plugin turns those
//! into scheduler launches and cancellations. The scheduler itself knows
//! nothing about the host.

use std::sync::Arc;

use edge_config::SyncConfig;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cycle::CycleReport;
use crate::scheduler::{Scheduler, SchedulerContext, SchedulerState, STARTUP_DELAY};
use crate::sync_task::SyncTask;

/// Name the plugin reports its status under.
pub const PLUGIN_NAME: &str = "edge";

/// Readiness reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Ready,
    NotReady,
}

/// What the plugin needs from the process hosting it.
pub trait PluginHost: Send + Sync {
    fn update_plugin_status(&self, name: &str, state: PluginState);

    /// Tenant assigned to this instance by the host, if any.
    fn tenant_id(&self) -> Option<String>;
}

struct Lifecycle {
    started: bool,
    running: Option<RunningScheduler>,
}

struct RunningScheduler {
    cancel: CancellationToken,
    interval: Duration,
}

/// Edge replication as a host plugin.
pub struct EdgeSyncPlugin {
    host: Arc<dyn PluginHost>,
    task: Arc<dyn SyncTask>,
    config: Arc<RwLock<SyncConfig>>,
    context: SchedulerContext,
    startup_delay: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl EdgeSyncPlugin {
    /// Create the plugin. The config gets a fresh session id.
    pub fn new(host: Arc<dyn PluginHost>, task: Arc<dyn SyncTask>, mut config: SyncConfig) -> Self {
        config.regenerate_session_id();
        Self {
            host,
            task,
            config: Arc::new(RwLock::new(config)),
            context: SchedulerContext::new(),
            startup_delay: STARTUP_DELAY,
            lifecycle: Mutex::new(Lifecycle {
                started: false,
                running: None,
            }),
        }
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Report ready, then launch the scheduler if sync is enabled.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.started = true;
        self.host
            .update_plugin_status(PLUGIN_NAME, PluginState::Ready);

        let config = self.config.read().await.clone();
        if config.enabled {
            self.launch(&mut lifecycle, &config);
        } else {
            info!("Edge sync disabled; scheduler not started");
        }
    }

    /// Cancel the scheduler and report not ready. A running cycle is left to
    /// finish on its own.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        lifecycle.started = false;
        if let Some(running) = lifecycle.running.take() {
            running.cancel.cancel();
            info!("Edge sync scheduler cancelled");
        }
        self.host
            .update_plugin_status(PLUGIN_NAME, PluginState::NotReady);
    }

    /// Apply a new configuration.
    ///
    /// The session id is always regenerated. Once started, the tenant comes
    /// from the host and never from `new_config`.
    pub async fn reconfigure(&self, mut new_config: SyncConfig) {
        let mut lifecycle = self.lifecycle.lock().await;
        let mut current = self.config.write().await;

        new_config.regenerate_session_id();
        match self.host.tenant_id() {
            Some(tenant_id) => new_config.tenant_id = tenant_id,
            None if lifecycle.started => new_config.tenant_id = current.tenant_id.clone(),
            None => {}
        }

        let was_enabled = current.enabled;
        *current = new_config.clone();
        drop(current);

        info!(
            enabled = new_config.enabled,
            session_id = %new_config.session_id,
            "Edge sync reconfigured"
        );

        if !lifecycle.started {
            return;
        }

        match (was_enabled, new_config.enabled) {
            (false, true) => self.launch(&mut lifecycle, &new_config),
            (true, false) => {
                if let Some(running) = lifecycle.running.take() {
                    running.cancel.cancel();
                    info!("Edge sync disabled; scheduler cancelled");
                }
            }
            (true, true) => {
                let restart = match &lifecycle.running {
                    Some(running) => running.interval != new_config.interval(),
                    None => true,
                };
                if restart {
                    self.launch(&mut lifecycle, &new_config);
                }
            }
            (false, false) => {}
        }
    }

    /// Ask for an immediate full resync. Returns `false` when no scheduler is
    /// running to pick it up.
    pub async fn sync_now(&self) -> bool {
        if self.lifecycle.lock().await.running.is_none() {
            debug!("Sync requested while the scheduler is not running");
            return false;
        }
        self.context.trigger().fire();
        true
    }

    pub async fn config(&self) -> SyncConfig {
        self.config.read().await.clone()
    }

    pub fn scheduler_state(&self) -> watch::Receiver<SchedulerState> {
        self.context.state()
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<CycleReport> {
        self.context.subscribe_reports()
    }

    fn launch(&self, lifecycle: &mut Lifecycle, config: &SyncConfig) {
        if let Some(previous) = lifecycle.running.take() {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        Scheduler::new(self.task.clone(), self.config.clone(), self.context.clone())
            .with_startup_delay(self.startup_delay)
            .spawn(cancel.clone());

        info!(
            interval_secs = config.interval().as_secs(),
            addr = %config.addr,
            "Edge sync scheduler launched"
        );
        lifecycle.running = Some(RunningScheduler {
            cancel,
            interval: config.interval(),
        });
    }
}
