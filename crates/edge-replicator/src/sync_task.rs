//! One cycle's worth of work: connect both sides, run the pipeline, release.

use async_trait::async_trait;
use directory_client::{
    connect, resolve_local_address, ConnectParams, DirectoryExporter, DirectoryResult,
    DirectoryWriter, ExportRequest,
};
use edge_config::{LocalServices, SyncConfig};
use tracing::{debug, info};

use crate::counter::Counter;
use crate::cycle::SyncCycle;
use crate::error::{SyncError, SyncResult};
use crate::pipeline;

/// Work the scheduler runs once per cycle.
#[async_trait]
pub trait SyncTask: Send + Sync {
    async fn run_cycle(
        &self,
        config: &SyncConfig,
        cycle: &SyncCycle,
        counter: &Counter,
    ) -> SyncResult<()>;
}

/// Opens fresh clients for each cycle.
///
/// Handles are dropped when the cycle ends, which releases their connections.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn source(&self, config: &SyncConfig) -> DirectoryResult<Box<dyn DirectoryExporter>>;

    async fn destination(&self, config: &SyncConfig)
        -> DirectoryResult<Box<dyn DirectoryWriter>>;

    /// Human-readable destination address for logs and errors.
    fn destination_address(&self) -> String;
}

/// Connector for the HTTP directory API.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    local: LocalServices,
}

impl HttpConnector {
    pub fn new(local: LocalServices) -> Self {
        Self { local }
    }
}

#[async_trait]
impl DirectoryConnector for HttpConnector {
    async fn source(&self, config: &SyncConfig) -> DirectoryResult<Box<dyn DirectoryExporter>> {
        let params = ConnectParams {
            address: config.addr.clone(),
            api_key: config.apikey.clone(),
            tenant_id: config.tenant_id.clone(),
            session_id: config.session_id.clone(),
            insecure: config.insecure,
            timeout: config.request_timeout(),
        };
        Ok(Box::new(connect(&params).await?))
    }

    async fn destination(
        &self,
        config: &SyncConfig,
    ) -> DirectoryResult<Box<dyn DirectoryWriter>> {
        let params = ConnectParams {
            address: self.destination_address(),
            api_key: String::new(),
            tenant_id: config.tenant_id.clone(),
            session_id: config.session_id.clone(),
            insecure: self.local.insecure,
            timeout: config.request_timeout(),
        };
        Ok(Box::new(connect(&params).await?))
    }

    fn destination_address(&self) -> String {
        resolve_local_address(&self.local)
    }
}

/// Replicates the remote directory into the local store.
pub struct DirectorySync<C> {
    connector: C,
}

impl<C: DirectoryConnector> DirectorySync<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[async_trait]
impl<C: DirectoryConnector> SyncTask for DirectorySync<C> {
    async fn run_cycle(
        &self,
        config: &SyncConfig,
        cycle: &SyncCycle,
        counter: &Counter,
    ) -> SyncResult<()> {
        let source = self
            .connector
            .source(config)
            .await
            .map_err(|source| SyncError::Connect {
                endpoint: format!("source {}", config.addr),
                source,
            })?;
        let destination =
            self.connector
                .destination(config)
                .await
                .map_err(|source| SyncError::Connect {
                    endpoint: format!("destination {}", self.connector.destination_address()),
                    source,
                })?;

        info!(
            cycle_id = cycle.id,
            full_resync = cycle.full_resync,
            session_id = %config.session_id,
            "Sync cycle started"
        );

        let request = ExportRequest::full().with_page_size(config.page_size);
        let result = pipeline::run(source.as_ref(), destination.as_ref(), counter, request).await;

        drop(source);
        drop(destination);
        debug!(cycle_id = cycle.id, "Sync cycle connections released");

        result
    }
}
