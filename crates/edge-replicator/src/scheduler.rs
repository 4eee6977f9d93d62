//! Periodic and on-demand scheduling of sync cycles.
//!
//! The scheduler alternates between waiting (`Idle`) and running exactly one
//! cycle (`Running`). The configured sync interval is split into
//! [`CYCLES_PER_FULL_RESYNC`] ticks; every Kth tick is flagged as a full
//! resync, as is every on-demand cycle.
//!
//! Each cycle runs in its own task so a panic is caught at the join and
//! reported as a failed cycle instead of taking the loop down. Cancellation
//! stops new cycles from starting but lets a running one finish.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use edge_config::{SyncConfig, CYCLES_PER_FULL_RESYNC};
use futures_util::FutureExt;
use tokio::sync::{broadcast, watch, Mutex, Notify, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::counter::Counter;
use crate::cycle::{CycleReport, SyncCycle};
use crate::error::SyncError;
use crate::sync_task::SyncTask;

/// Delay before the first tick after the scheduler starts.
pub const STARTUP_DELAY: Duration = Duration::from_secs(15);

const REPORT_CAPACITY: usize = 64;

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Handle for requesting an immediate full resync.
///
/// Holds a single pending request; raising it again before the scheduler
/// picks it up has no further effect.
#[derive(Debug, Clone)]
pub struct SyncTrigger {
    notify: Arc<Notify>,
}

impl SyncTrigger {
    pub fn fire(&self) {
        self.notify.notify_one();
    }
}

/// State shared by every scheduler generation of one plugin.
///
/// Restarting the scheduler hands the same context to the new loop, so
/// triggers, state watchers and report subscribers stay valid. The cycle gate
/// keeps a cycle left running by a cancelled generation from overlapping one
/// started by its successor.
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    trigger: Arc<Notify>,
    gate: Arc<Mutex<()>>,
    state: Arc<watch::Sender<SchedulerState>>,
    reports: broadcast::Sender<CycleReport>,
    generation: Arc<AtomicU64>,
    cycles: Arc<AtomicU64>,
}

impl Default for SchedulerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SchedulerState::Stopped);
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);
        Self {
            trigger: Arc::new(Notify::new()),
            gate: Arc::new(Mutex::new(())),
            state: Arc::new(state),
            reports,
            generation: Arc::new(AtomicU64::new(0)),
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn trigger(&self) -> SyncTrigger {
        SyncTrigger {
            notify: self.trigger.clone(),
        }
    }

    pub fn state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<CycleReport> {
        self.reports.subscribe()
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Cycle loop.
pub struct Scheduler {
    task: Arc<dyn SyncTask>,
    config: Arc<RwLock<SyncConfig>>,
    context: SchedulerContext,
    startup_delay: Duration,
    generation: u64,
    ticks: u64,
}

impl Scheduler {
    /// Create a scheduler. It becomes the context's current generation, so an
    /// older loop on the same context stops publishing state.
    pub fn new(
        task: Arc<dyn SyncTask>,
        config: Arc<RwLock<SyncConfig>>,
        context: SchedulerContext,
    ) -> Self {
        let generation = context.next_generation();
        Self {
            task,
            config,
            context,
            startup_delay: STARTUP_DELAY,
            generation,
            ticks: 0,
        }
    }

    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let trigger = self.context.trigger.clone();
        let mut delay = self.startup_delay;

        self.publish(SchedulerState::Idle);
        info!(
            generation = self.generation,
            startup_delay_secs = delay.as_secs(),
            "Sync scheduler started"
        );

        loop {
            let full_resync = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = trigger.notified() => {
                    info!("On-demand sync requested");
                    true
                }
                _ = sleep(delay) => {
                    self.ticks += 1;
                    self.ticks % u64::from(CYCLES_PER_FULL_RESYNC) == 0
                }
            };

            if cancel.is_cancelled() {
                break;
            }

            self.run_cycle(full_resync).await;

            // A request raised while the cycle ran is already satisfied by it.
            if trigger.notified().now_or_never().is_some() {
                debug!("Dropped on-demand sync requested during a running cycle");
            }

            delay = self.config.read().await.interval();
            debug!(next_tick_secs = delay.as_secs(), "Sync scheduler re-armed");
        }

        self.publish(SchedulerState::Stopped);
        info!(generation = self.generation, "Sync scheduler stopped");
    }

    async fn run_cycle(&mut self, full_resync: bool) {
        let _gate = self.context.gate.clone().lock_owned().await;
        self.publish(SchedulerState::Running);

        let config = self.config.read().await.clone();
        let id = self.context.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let mut cycle = SyncCycle::begin(id, full_resync);
        let counter = Arc::new(Counter::new());

        let handle = {
            let task = self.task.clone();
            let counter = counter.clone();
            let cycle = cycle.clone();
            tokio::spawn(async move { task.run_cycle(&config, &cycle, &counter).await })
        };

        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(join_failure(err)),
        };

        cycle.finish();
        let report = CycleReport::new(cycle, counter.snapshot(), &result);
        report.log();
        if let Err(SyncError::Panicked(reason)) = &result {
            error!(cycle_id = report.cycle.id, reason = %reason, "Sync cycle panicked");
        }

        // Nobody listening is fine.
        let _ = self.context.reports.send(report);

        self.publish(SchedulerState::Idle);
    }

    fn publish(&self, state: SchedulerState) {
        if self.context.is_current(self.generation) {
            self.context.state.send_replace(state);
        }
    }
}

fn join_failure(err: JoinError) -> SyncError {
    if err.is_panic() {
        SyncError::Panicked(panic_message(err.into_panic()))
    } else {
        SyncError::Cancelled
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
