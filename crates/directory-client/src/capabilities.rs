//! Capability traits a directory endpoint exposes.
//!
//! Replication only ever talks to the local store and the remote directory
//! through these four seams, so the pipeline can run against in-memory doubles.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::DirectoryResult;
use crate::records::{
    ExportRecord, ExportRequest, ImportCounts, ImportRequest, Object, ObjectType, Permission,
    Relation, RelationType,
};

/// Stream of records produced by one export call. Ends at end-of-data.
pub type ExportStream = BoxStream<'static, DirectoryResult<ExportRecord>>;

/// Bulk streaming read.
#[async_trait]
pub trait DirectoryExporter: Send + Sync {
    async fn export(&self, request: ExportRequest) -> DirectoryResult<ExportStream>;
}

/// Bulk write of many records in one call.
#[async_trait]
pub trait DirectoryImporter: Send + Sync {
    async fn import(&self, requests: Vec<ImportRequest>) -> DirectoryResult<ImportCounts>;
}

/// Point lookups.
#[async_trait]
pub trait DirectoryReader: Send + Sync {
    async fn get_object(&self, object_type: &str, id: &str) -> DirectoryResult<Option<Object>>;

    /// Looks up the relation with the same identity as `relation`.
    async fn get_relation(&self, relation: &Relation) -> DirectoryResult<Option<Relation>>;
}

/// Point upserts (create-or-replace keyed by natural identity) and deletes.
#[async_trait]
pub trait DirectoryWriter: Send + Sync {
    async fn set_object_type(&self, object_type: &ObjectType) -> DirectoryResult<()>;

    async fn set_relation_type(&self, relation_type: &RelationType) -> DirectoryResult<()>;

    async fn set_permission(&self, permission: &Permission) -> DirectoryResult<()>;

    async fn set_object(&self, object: &Object) -> DirectoryResult<()>;

    async fn set_relation(&self, relation: &Relation) -> DirectoryResult<()>;

    async fn delete_object(&self, object_type: &str, id: &str) -> DirectoryResult<()>;

    async fn delete_relation(&self, relation: &Relation) -> DirectoryResult<()>;
}
