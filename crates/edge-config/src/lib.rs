//! Configuration, paths, and logging setup for the edge replication service.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    EdgeConfig, LocalService, LocalServices, SyncConfig, AUTHORIZER_SERVICE,
    CYCLES_PER_FULL_RESYNC, DEFAULT_LOCAL_ADDRESS, DEFAULT_LOG_LEVEL, DEFAULT_PAGE_SIZE,
    DEFAULT_SYNC_INTERVAL_MINUTES, DEFAULT_TIMEOUT_SECS, WRITER_SERVICE,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
