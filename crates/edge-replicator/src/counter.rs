//! Per-cycle tallies shared by the producer and subscriber stages.

use directory_client::RecordKind;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters for one sync cycle.
///
/// The producer only touches `received`; everything else is written by the
/// subscriber. Read a consistent view with [`Counter::snapshot`] once both
/// stages have finished.
#[derive(Debug, Default)]
pub struct Counter {
    received: AtomicU64,
    object_types: AtomicU64,
    relation_types: AtomicU64,
    permissions: AtomicU64,
    objects: AtomicU64,
    relations: AtomicU64,
    upserts: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kind(&self, kind: RecordKind) {
        let slot = match kind {
            RecordKind::ObjectType => &self.object_types,
            RecordKind::RelationType => &self.relation_types,
            RecordKind::Permission => &self.permissions,
            RecordKind::Object => &self.objects,
            RecordKind::Relation => &self.relations,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upsert(&self) {
        self.upserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            received: self.received.load(Ordering::Relaxed),
            object_types: self.object_types.load(Ordering::Relaxed),
            relation_types: self.relation_types.load(Ordering::Relaxed),
            permissions: self.permissions.load(Ordering::Relaxed),
            objects: self.objects.load(Ordering::Relaxed),
            relations: self.relations.load(Ordering::Relaxed),
            upserts: self.upserts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of a [`Counter`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub received: u64,
    pub object_types: u64,
    pub relation_types: u64,
    pub permissions: u64,
    pub objects: u64,
    pub relations: u64,
    pub upserts: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CounterSnapshot {
    /// Sum of the five per-kind counts.
    pub fn kinds_total(&self) -> u64 {
        self.object_types + self.relation_types + self.permissions + self.objects + self.relations
    }

    /// Every received record was classified exactly once.
    pub fn is_conserved(&self) -> bool {
        self.received == self.kinds_total()
    }
}
