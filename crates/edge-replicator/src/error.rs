//! Error types for replication cycles.

use directory_client::DirectoryError;
use thiserror::Error;

/// Failure of a whole sync cycle.
///
/// Per-record write failures never show up here; they are logged and
/// counted on the cycle's [`Counter`](crate::Counter).
#[derive(Error, Debug)]
pub enum SyncError {
    /// A client for one side of the cycle could not be built.
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: DirectoryError,
    },

    /// Opening or reading the export stream failed.
    #[error("Export stream failed: {0}")]
    Stream(#[source] DirectoryError),

    /// The subscriber went away while the producer still had records.
    #[error("Record queue closed before the export finished")]
    QueueClosed,

    /// The cycle task panicked.
    #[error("Sync cycle panicked: {0}")]
    Panicked(String),

    /// The cycle task was aborted before it finished.
    #[error("Sync cycle cancelled")]
    Cancelled,
}

/// Result type for replication operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_names_endpoint() {
        let err = SyncError::Connect {
            endpoint: "source directory.example.com:8443".into(),
            source: DirectoryError::Connect("connection refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to connect to source directory.example.com:8443: Connect error: connection refused"
        );
    }
}
