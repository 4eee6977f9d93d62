//! Bookkeeping for a single sync cycle.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::counter::CounterSnapshot;
use crate::error::SyncResult;

/// One execution of the pipeline. Logged when it ends, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCycle {
    /// Sequence number within this process, starting at 1.
    pub id: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub full_resync: bool,
}

impl SyncCycle {
    pub fn begin(id: u64, full_resync: bool) -> Self {
        Self {
            id,
            started_at: Utc::now(),
            ended_at: None,
            full_resync,
        }
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_milliseconds())
    }
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Succeeded,
    /// The export was fully applied but some records failed to write.
    CompletedWithErrors(u64),
    Failed(String),
}

impl CycleOutcome {
    pub fn from_result(result: &SyncResult<()>, counts: &CounterSnapshot) -> Self {
        match result {
            Err(err) => CycleOutcome::Failed(err.to_string()),
            Ok(()) if counts.errors > 0 => CycleOutcome::CompletedWithErrors(counts.errors),
            Ok(()) => CycleOutcome::Succeeded,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CycleOutcome::Failed(_))
    }
}

/// Summary of a finished cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: SyncCycle,
    pub counts: CounterSnapshot,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    pub fn new(cycle: SyncCycle, counts: CounterSnapshot, result: &SyncResult<()>) -> Self {
        let outcome = CycleOutcome::from_result(result, &counts);
        Self {
            cycle,
            counts,
            outcome,
        }
    }

    /// Emit the one summary line per cycle.
    pub fn log(&self) {
        let c = &self.counts;
        match &self.outcome {
            CycleOutcome::Succeeded => info!(
                cycle_id = self.cycle.id,
                full_resync = self.cycle.full_resync,
                duration_ms = self.cycle.duration_ms(),
                received = c.received,
                object_types = c.object_types,
                relation_types = c.relation_types,
                permissions = c.permissions,
                objects = c.objects,
                relations = c.relations,
                upserts = c.upserts,
                "Sync cycle succeeded"
            ),
            CycleOutcome::CompletedWithErrors(errors) => warn!(
                cycle_id = self.cycle.id,
                full_resync = self.cycle.full_resync,
                duration_ms = self.cycle.duration_ms(),
                received = c.received,
                upserts = c.upserts,
                errors,
                "Sync cycle completed with errors"
            ),
            CycleOutcome::Failed(reason) => warn!(
                cycle_id = self.cycle.id,
                full_resync = self.cycle.full_resync,
                duration_ms = self.cycle.duration_ms(),
                received = c.received,
                upserts = c.upserts,
                errors = c.errors,
                reason = %reason,
                "Sync cycle failed"
            ),
        }
    }
}
