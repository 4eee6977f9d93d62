//! Configuration management for the edge replicator.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default full-resync period in minutes.
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 1;

/// Default connect/request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default export batching hint.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Number of scheduler ticks per full-resync period; every Kth tick is a full resync.
pub const CYCLES_PER_FULL_RESYNC: u32 = 4;

/// Address used for the local store when no service advertises the writer role.
pub const DEFAULT_LOCAL_ADDRESS: &str = "localhost:9292";

/// Local service name that exposes the writer API.
pub const WRITER_SERVICE: &str = "writer";

/// Combined local service that may also host the writer role.
pub const AUTHORIZER_SERVICE: &str = "authorizer";

/// Settings for replicating the remote directory into the local edge store.
///
/// `session_id` is runtime-only: it is never read from or written to disk,
/// and is regenerated whenever the config is (re)applied.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether the replication scheduler runs at all.
    pub enabled: bool,
    /// Address of the remote (source) directory.
    pub addr: String,
    /// API key presented to the remote directory.
    pub apikey: String,
    /// Tenant the edge store replicates.
    pub tenant_id: String,
    /// Connect timeout in seconds; also the request timeout for point calls.
    pub timeout: u64,
    /// Batching hint forwarded with the export request.
    pub page_size: u32,
    /// Full-resync period in minutes.
    pub sync_interval: u32,
    /// Skip TLS verification when talking to the remote directory.
    pub insecure: bool,
    #[serde(skip)]
    pub session_id: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: String::new(),
            apikey: String::new(),
            tenant_id: String::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            sync_interval: DEFAULT_SYNC_INTERVAL_MINUTES,
            insecure: false,
            session_id: new_session_id(),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("enabled", &self.enabled)
            .field("addr", &self.addr)
            .field("tenant_id", &self.tenant_id)
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .field("sync_interval", &self.sync_interval)
            .field("insecure", &self.insecure)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl SyncConfig {
    /// Replace the session identifier with a fresh one.
    pub fn regenerate_session_id(&mut self) {
        self.session_id = new_session_id();
    }

    /// Time between scheduler ticks.
    ///
    /// The configured period is split into `CYCLES_PER_FULL_RESYNC` equal
    /// sub-intervals: `(minutes * 60) / K` seconds.
    pub fn interval(&self) -> Duration {
        let minutes = u64::from(self.sync_interval.max(1));
        Duration::from_secs(minutes * 60 / u64::from(CYCLES_PER_FULL_RESYNC))
    }

    /// Connect timeout, and request timeout for point reads/writes.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }

    /// Check the settings needed to start replicating.
    pub fn validate(&self) -> CoreResult<()> {
        if self.enabled && self.addr.trim().is_empty() {
            return Err(CoreError::Config(
                "sync is enabled but no remote directory address is configured".to_string(),
            ));
        }
        Ok(())
    }
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One listener of the local edge store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalService {
    /// host:port (or full URL) the service listens on.
    pub listen_address: String,
    /// API roles this listener serves, e.g. `["reader", "writer"]`.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl LocalService {
    pub fn hosts_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Listen-address topology of the local edge store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalServices {
    #[serde(default)]
    pub services: BTreeMap<String, LocalService>,
    /// The local store commonly uses a self-signed certificate.
    #[serde(default = "default_local_insecure")]
    pub insecure: bool,
}

fn default_local_insecure() -> bool {
    true
}

impl Default for LocalServices {
    fn default() -> Self {
        Self {
            services: BTreeMap::new(),
            insecure: default_local_insecure(),
        }
    }
}

/// Main configuration file model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Remote directory replication settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Local edge store listeners.
    #[serde(default)]
    pub local: LocalServices,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sync: SyncConfig::default(),
            local: LocalServices::default(),
        }
    }
}

impl EdgeConfig {
    /// Load configuration from the default location, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EdgeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    pub fn load_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(log_level) = lookup("EDGE_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(addr) = lookup("EDGE_SYNC_ADDR") {
            self.sync.addr = addr;
        }
        if let Some(apikey) = lookup("EDGE_SYNC_API_KEY") {
            self.sync.apikey = apikey;
        }
        if let Some(tenant_id) = lookup("EDGE_SYNC_TENANT_ID") {
            self.sync.tenant_id = tenant_id;
        }
    }
}
