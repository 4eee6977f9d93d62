//! Test harness for replication tests.
//!
//! Provides:
//! - MemoryExporter: a source that streams a fixed list of records
//! - MemoryStore: a destination writer backed by a map keyed by record identity
//! - MemoryConnector: hands out tracked handles to both, counting open connections
//! - Task doubles for driving the scheduler directly

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use directory_client::{
    Attributes, DirectoryError, DirectoryExporter, DirectoryResult, DirectoryWriter, ExportRecord,
    ExportRequest, ExportStream, Object, ObjectType, Permission, Relation, RelationType,
};
use edge_config::SyncConfig;
use futures_util::stream::{self, StreamExt};
use tokio::sync::{broadcast, Semaphore};

use crate::counter::Counter;
use crate::cycle::{CycleReport, SyncCycle};
use crate::error::SyncResult;
use crate::plugin::{PluginHost, PluginState};
use crate::sync_task::{DirectoryConnector, SyncTask};

pub fn object(id: usize) -> ExportRecord {
    ExportRecord::Object(Object {
        object_type: "user".into(),
        id: format!("user-{id}"),
        attributes: Attributes::new(),
    })
}

/// `count` user objects with ids `user-1..=user-count`.
pub fn objects(count: usize) -> Vec<ExportRecord> {
    (1..=count).map(object).collect()
}

/// One record of every kind.
pub fn one_of_each() -> Vec<ExportRecord> {
    vec![
        ExportRecord::ObjectType(ObjectType {
            name: "user".into(),
            attributes: Attributes::new(),
        }),
        ExportRecord::RelationType(RelationType {
            object_type: "group".into(),
            name: "member".into(),
            attributes: Attributes::new(),
        }),
        ExportRecord::Permission(Permission {
            name: "read".into(),
            attributes: Attributes::new(),
        }),
        object(1),
        ExportRecord::Relation(Relation {
            object_type: "group".into(),
            object_id: "admins".into(),
            relation: "member".into(),
            subject_type: "user".into(),
            subject_id: "user-1".into(),
            attributes: Attributes::new(),
        }),
    ]
}

pub fn enabled_config(sync_interval: u32) -> SyncConfig {
    SyncConfig {
        enabled: true,
        addr: "directory.test:8443".into(),
        tenant_id: "acme".into(),
        sync_interval,
        ..SyncConfig::default()
    }
}

/// Wait for the next cycle report, failing instead of hanging.
pub async fn next_report(reports: &mut broadcast::Receiver<CycleReport>) -> CycleReport {
    tokio::time::timeout(Duration::from_secs(3600), reports.recv())
        .await
        .expect("no cycle report within an hour")
        .expect("report channel closed")
}

pub fn drain_reports(reports: &mut broadcast::Receiver<CycleReport>) -> Vec<CycleReport> {
    let mut out = Vec::new();
    while let Ok(report) = reports.try_recv() {
        out.push(report);
    }
    out
}

/// Source that streams a fixed record list.
#[derive(Default)]
pub struct MemoryExporter {
    records: Vec<ExportRecord>,
    /// Fail the stream after yielding this many records.
    fail_after: Option<usize>,
    reject_export: bool,
    exports: AtomicUsize,
}

impl MemoryExporter {
    pub fn new(records: Vec<ExportRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn failing_after(records: Vec<ExportRecord>, yielded: usize) -> Self {
        Self {
            records,
            fail_after: Some(yielded),
            ..Default::default()
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject_export: true,
            ..Default::default()
        }
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryExporter for MemoryExporter {
    async fn export(&self, _request: ExportRequest) -> DirectoryResult<ExportStream> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        if self.reject_export {
            return Err(DirectoryError::Api {
                status: 401,
                message: "invalid api key".into(),
            });
        }

        let take = self.fail_after.unwrap_or(self.records.len());
        let records: Vec<DirectoryResult<ExportRecord>> =
            self.records.iter().take(take).cloned().map(Ok).collect();
        let stream = stream::iter(records);

        if self.fail_after.is_some() {
            let failure = stream::once(async {
                Err(DirectoryError::Stream("connection reset by peer".into()))
            });
            Ok(stream.chain(failure).boxed())
        } else {
            Ok(stream.boxed())
        }
    }
}

/// Destination backed by a map keyed by record identity.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, ExportRecord>>,
    failing: HashSet<String>,
    gate: Option<Arc<Semaphore>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes of these record keys fail.
    pub fn failing_on(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            failing: keys.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Every write waits for a permit from `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, ExportRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.lock().unwrap().contains_key(key)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn upsert(&self, record: ExportRecord) -> DirectoryResult<()> {
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| DirectoryError::Connect("store closed".into()))?
                .forget();
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        let key = record.key();
        if self.failing.contains(&key) {
            return Err(DirectoryError::Api {
                status: 409,
                message: format!("conflict on {key}"),
            });
        }
        self.records.lock().unwrap().insert(key, record);
        Ok(())
    }
}

#[async_trait]
impl DirectoryWriter for MemoryStore {
    async fn set_object_type(&self, object_type: &ObjectType) -> DirectoryResult<()> {
        self.upsert(ExportRecord::ObjectType(object_type.clone())).await
    }

    async fn set_relation_type(&self, relation_type: &RelationType) -> DirectoryResult<()> {
        self.upsert(ExportRecord::RelationType(relation_type.clone())).await
    }

    async fn set_permission(&self, permission: &Permission) -> DirectoryResult<()> {
        self.upsert(ExportRecord::Permission(permission.clone())).await
    }

    async fn set_object(&self, object: &Object) -> DirectoryResult<()> {
        self.upsert(ExportRecord::Object(object.clone())).await
    }

    async fn set_relation(&self, relation: &Relation) -> DirectoryResult<()> {
        self.upsert(ExportRecord::Relation(relation.clone())).await
    }

    async fn delete_object(&self, object_type: &str, id: &str) -> DirectoryResult<()> {
        self.records
            .lock()
            .unwrap()
            .remove(&format!("object:{object_type}:{id}"));
        Ok(())
    }

    async fn delete_relation(&self, relation: &Relation) -> DirectoryResult<()> {
        let key = ExportRecord::Relation(relation.clone()).key();
        self.records.lock().unwrap().remove(&key);
        Ok(())
    }
}

/// A connection handed out by [`MemoryConnector`]; closing it is dropping it.
struct TrackedHandle<T> {
    inner: Arc<T>,
    open: Arc<AtomicUsize>,
}

impl<T> TrackedHandle<T> {
    fn open(inner: Arc<T>, open: Arc<AtomicUsize>) -> Self {
        open.fetch_add(1, Ordering::SeqCst);
        Self { inner, open }
    }
}

impl<T> Drop for TrackedHandle<T> {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T: DirectoryExporter> DirectoryExporter for TrackedHandle<T> {
    async fn export(&self, request: ExportRequest) -> DirectoryResult<ExportStream> {
        self.inner.export(request).await
    }
}

#[async_trait]
impl<T: DirectoryWriter> DirectoryWriter for TrackedHandle<T> {
    async fn set_object_type(&self, object_type: &ObjectType) -> DirectoryResult<()> {
        self.inner.set_object_type(object_type).await
    }

    async fn set_relation_type(&self, relation_type: &RelationType) -> DirectoryResult<()> {
        self.inner.set_relation_type(relation_type).await
    }

    async fn set_permission(&self, permission: &Permission) -> DirectoryResult<()> {
        self.inner.set_permission(permission).await
    }

    async fn set_object(&self, object: &Object) -> DirectoryResult<()> {
        self.inner.set_object(object).await
    }

    async fn set_relation(&self, relation: &Relation) -> DirectoryResult<()> {
        self.inner.set_relation(relation).await
    }

    async fn delete_object(&self, object_type: &str, id: &str) -> DirectoryResult<()> {
        self.inner.delete_object(object_type, id).await
    }

    async fn delete_relation(&self, relation: &Relation) -> DirectoryResult<()> {
        self.inner.delete_relation(relation).await
    }
}

/// Connector over in-memory endpoints.
pub struct MemoryConnector {
    pub source: Arc<MemoryExporter>,
    pub destination: Arc<MemoryStore>,
    open: Arc<AtomicUsize>,
    sessions: Mutex<Vec<String>>,
    refuse_source: AtomicBool,
    refuse_destination: AtomicBool,
}

impl MemoryConnector {
    pub fn new(source: MemoryExporter, destination: MemoryStore) -> Self {
        Self {
            source: Arc::new(source),
            destination: Arc::new(destination),
            open: Arc::new(AtomicUsize::new(0)),
            sessions: Mutex::new(Vec::new()),
            refuse_source: AtomicBool::new(false),
            refuse_destination: AtomicBool::new(false),
        }
    }

    pub fn refuse_source(&self) {
        self.refuse_source.store(true, Ordering::SeqCst);
    }

    pub fn refuse_destination(&self) {
        self.refuse_destination.store(true, Ordering::SeqCst);
    }

    /// Connections handed out and not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Session id presented by each source connection, in order.
    pub fn sessions(&self) -> Vec<String> {
        self.sessions.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectoryConnector for MemoryConnector {
    async fn source(&self, config: &SyncConfig) -> DirectoryResult<Box<dyn DirectoryExporter>> {
        if self.refuse_source.load(Ordering::SeqCst) {
            return Err(DirectoryError::Connect(format!("{}: connection refused", config.addr)));
        }
        self.sessions.lock().unwrap().push(config.session_id.clone());
        Ok(Box::new(TrackedHandle::open(
            self.source.clone(),
            self.open.clone(),
        )))
    }

    async fn destination(
        &self,
        _config: &SyncConfig,
    ) -> DirectoryResult<Box<dyn DirectoryWriter>> {
        if self.refuse_destination.load(Ordering::SeqCst) {
            return Err(DirectoryError::Connect("localhost:9292: connection refused".into()));
        }
        Ok(Box::new(TrackedHandle::open(
            self.destination.clone(),
            self.open.clone(),
        )))
    }

    fn destination_address(&self) -> String {
        "memory".into()
    }
}

/// Task that finishes immediately and counts its runs.
#[derive(Default)]
pub struct CountingTask {
    runs: AtomicUsize,
}

impl CountingTask {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncTask for CountingTask {
    async fn run_cycle(&self, _: &SyncConfig, _: &SyncCycle, counter: &Counter) -> SyncResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        counter.record_received();
        counter.record_kind(directory_client::RecordKind::Object);
        counter.record_upsert();
        Ok(())
    }
}

/// Task that parks every cycle until the test releases it.
pub struct BlockingTask {
    release: Semaphore,
    active: AtomicUsize,
    max_active: AtomicUsize,
    runs: AtomicUsize,
}

impl BlockingTask {
    pub fn new() -> Self {
        Self {
            release: Semaphore::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        }
    }

    /// Let `cycles` parked or future cycles finish.
    pub fn release(&self, cycles: usize) {
        self.release.add_permits(cycles);
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncTask for BlockingTask {
    async fn run_cycle(&self, _: &SyncConfig, _: &SyncCycle, _: &Counter) -> SyncResult<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Task that panics on its first run and succeeds afterwards.
#[derive(Default)]
pub struct PanicOnceTask {
    runs: AtomicUsize,
}

#[async_trait]
impl SyncTask for PanicOnceTask {
    async fn run_cycle(&self, _: &SyncConfig, _: &SyncCycle, _: &Counter) -> SyncResult<()> {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("boom: malformed export record");
        }
        Ok(())
    }
}

/// Host that records every status update.
#[derive(Default)]
pub struct RecordingHost {
    statuses: Mutex<Vec<PluginState>>,
    tenant_id: Mutex<Option<String>>,
}

impl RecordingHost {
    pub fn with_tenant(tenant_id: &str) -> Self {
        Self {
            tenant_id: Mutex::new(Some(tenant_id.to_string())),
            ..Default::default()
        }
    }

    pub fn statuses(&self) -> Vec<PluginState> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn last_status(&self) -> Option<PluginState> {
        self.statuses.lock().unwrap().last().copied()
    }
}

impl PluginHost for RecordingHost {
    fn update_plugin_status(&self, name: &str, state: PluginState) {
        assert_eq!(name, crate::plugin::PLUGIN_NAME);
        self.statuses.lock().unwrap().push(state);
    }

    fn tenant_id(&self) -> Option<String> {
        self.tenant_id.lock().unwrap().clone()
    }
}
