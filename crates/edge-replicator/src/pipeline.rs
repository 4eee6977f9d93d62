//! The two-stage replication pipeline.
//!
//! ```text
//! source.export ──▶ producer ──▶ [bounded queue] ──▶ subscriber ──▶ destination.set_*
//! ```
//!
//! The producer owns the only sender, so the queue closes exactly when the
//! producer returns, whether the stream ended or failed. The subscriber then
//! drains whatever is still buffered and stops.

use directory_client::{
    DirectoryExporter, DirectoryResult, DirectoryWriter, ExportRecord, ExportRequest,
};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::counter::Counter;
use crate::error::{SyncError, SyncResult};

/// Records buffered between the stages before the producer blocks.
pub const QUEUE_CAPACITY: usize = 2000;

/// Run one export-and-apply pass to completion.
///
/// Returns an error only for stream-level failures. Records that fail to
/// apply are counted in `counter` and do not fail the run.
pub async fn run(
    source: &dyn DirectoryExporter,
    destination: &dyn DirectoryWriter,
    counter: &Counter,
    request: ExportRequest,
) -> SyncResult<()> {
    run_with_capacity(source, destination, counter, request, QUEUE_CAPACITY).await
}

pub(crate) async fn run_with_capacity(
    source: &dyn DirectoryExporter,
    destination: &dyn DirectoryWriter,
    counter: &Counter,
    request: ExportRequest,
    capacity: usize,
) -> SyncResult<()> {
    let (sender, receiver) = mpsc::channel(capacity);

    let (produced, applied) = tokio::join!(
        produce(source, sender, counter, request),
        subscribe(destination, receiver, counter),
    );

    produced?;
    applied
}

async fn produce(
    source: &dyn DirectoryExporter,
    queue: mpsc::Sender<ExportRecord>,
    counter: &Counter,
    request: ExportRequest,
) -> SyncResult<()> {
    let mut stream = source.export(request).await.map_err(SyncError::Stream)?;

    while let Some(item) = stream.next().await {
        let record = item.map_err(|err| {
            warn!(received = counter.received(), error = %err, "Export stream failed");
            SyncError::Stream(err)
        })?;
        counter.record_received();

        if queue.send(record).await.is_err() {
            return Err(SyncError::QueueClosed);
        }
    }

    debug!(received = counter.received(), "Export stream ended");
    Ok(())
}

async fn subscribe(
    destination: &dyn DirectoryWriter,
    mut queue: mpsc::Receiver<ExportRecord>,
    counter: &Counter,
) -> SyncResult<()> {
    while let Some(record) = queue.recv().await {
        let kind = record.kind();
        counter.record_kind(kind);

        match apply(destination, &record).await {
            Ok(()) => counter.record_upsert(),
            Err(err) => {
                counter.record_error();
                warn!(kind = %kind, key = %record.key(), error = %err, "Failed to apply record");
            }
        }
    }

    Ok(())
}

async fn apply(destination: &dyn DirectoryWriter, record: &ExportRecord) -> DirectoryResult<()> {
    match record {
        ExportRecord::ObjectType(object_type) => destination.set_object_type(object_type).await,
        ExportRecord::RelationType(relation_type) => {
            destination.set_relation_type(relation_type).await
        }
        ExportRecord::Permission(permission) => destination.set_permission(permission).await,
        ExportRecord::Object(object) => destination.set_object(object).await,
        ExportRecord::Relation(relation) => destination.set_relation(relation).await,
    }
}
