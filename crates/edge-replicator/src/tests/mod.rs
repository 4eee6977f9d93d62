//! Behaviour tests for edge replication.
//!
//! - `harness.rs`   - In-memory source, destination, connector, task and host doubles
//! - `pipeline.rs`  - Idempotence, count conservation, partial failure, backpressure, stream failure
//! - `sync_task.rs` - Connect failures and connection release per cycle, HTTP end to end
//! - `scheduler.rs` - Cadence, on-demand trigger, no overlap, panic recovery, cancellation
//! - `plugin.rs`    - Start/stop readiness, reconfigure toggling, session and tenant handling

pub(crate) mod harness;
