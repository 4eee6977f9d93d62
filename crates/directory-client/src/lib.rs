//! Clients for directory endpoints.
//!
//! A directory is reached through four capabilities: streaming export, bulk
//! import, point reads and point writes. [`DirectoryClient`] implements all of
//! them over HTTP; the traits let replication run against any implementation.

mod capabilities;
mod client;
mod endpoint;
mod error;
mod ndjson;
mod records;

pub use capabilities::{
    DirectoryExporter, DirectoryImporter, DirectoryReader, DirectoryWriter, ExportStream,
};
pub use client::{connect, ConnectParams, DirectoryClient};
pub use endpoint::{base_url, resolve_local_address, API_PREFIX};
pub use error::{DirectoryError, DirectoryResult};
pub use ndjson::decode_lines;
pub use records::{
    Attributes, ExportOptions, ExportRecord, ExportRequest, ImportCounts, ImportRequest, Object,
    ObjectType, OpCode, Permission, RecordKind, Relation, RelationType,
};
