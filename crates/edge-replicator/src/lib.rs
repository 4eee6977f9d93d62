//! Edge directory replication.
//!
//! Keeps the local edge store in step with a remote directory by periodically
//! streaming a full export from the remote side and upserting every record
//! into the local side.
//!
//! ```text
//! EdgeSyncPlugin ──▶ Scheduler ──tick/trigger──▶ SyncTask::run_cycle
//!                                                  │
//!                        connect source + destination, then
//!                        export ──▶ producer ──▶ queue ──▶ subscriber ──▶ set_*
//! ```
//!
//! # Guarantees
//!
//! 1. **No overlap**: at most one cycle is in flight, across scheduler restarts too.
//! 2. **Best effort**: a record that fails to apply is counted and skipped.
//! 3. **Bounded memory**: the producer blocks once the queue holds
//!    [`QUEUE_CAPACITY`] records.
//! 4. **Contained failures**: connect errors, stream errors and panics fail
//!    one cycle; the next tick still runs.

pub mod counter;
pub mod cycle;
pub mod error;
pub mod pipeline;
pub mod plugin;
pub mod scheduler;
pub mod sync_task;

#[cfg(test)]
mod tests;

pub use counter::{Counter, CounterSnapshot};
pub use cycle::{CycleOutcome, CycleReport, SyncCycle};
pub use error::{SyncError, SyncResult};
pub use pipeline::QUEUE_CAPACITY;
pub use plugin::{EdgeSyncPlugin, PluginHost, PluginState, PLUGIN_NAME};
pub use scheduler::{Scheduler, SchedulerContext, SchedulerState, SyncTrigger, STARTUP_DELAY};
pub use sync_task::{DirectoryConnector, DirectorySync, HttpConnector, SyncTask};
