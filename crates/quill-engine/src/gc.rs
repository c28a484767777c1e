//! Mark-and-sweep garbage collection.
//!
//! Collection runs inside the engine state lock with the full root set in
//! hand: global bindings, module namespaces, extension slots, and pins of
//! every live context, plus any values the current allocation path needs
//! to protect. Marking walks property tables and prototype links; the
//! sweep frees whatever stayed unmarked and refunds its byte charge.
//!
//! A collection is triggered when projected usage crosses the threshold.
//! After each pass the threshold is re-armed to twice the surviving byte
//! count, floored at the initially configured value, so a heap that stays
//! small keeps collecting rarely and a heap that grows is not scanned on
//! every allocation.

use crate::heap::Heap;
use crate::value::{ObjectId, Value};

/// Default collection threshold in bytes, used when none is configured.
pub const DEFAULT_GC_THRESHOLD: usize = 256 * 1024;

/// Counters accumulated across collections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed collection passes.
    pub collections: u64,
    /// Total values freed.
    pub values_freed: u64,
    /// Total bytes refunded.
    pub bytes_freed: u64,
}

pub(crate) struct GarbageCollector {
    threshold: usize,
    initial_threshold: usize,
    stats: GcStats,
}

impl GarbageCollector {
    /// `threshold` of 0 selects [`DEFAULT_GC_THRESHOLD`].
    pub(crate) fn new(threshold: usize) -> Self {
        let threshold = if threshold == 0 {
            DEFAULT_GC_THRESHOLD
        } else {
            threshold
        };
        GarbageCollector {
            threshold,
            initial_threshold: threshold,
            stats: GcStats::default(),
        }
    }

    /// True if an allocation bringing usage to `projected_bytes` should
    /// trigger a collection first.
    pub(crate) fn should_collect(&self, projected_bytes: usize) -> bool {
        projected_bytes >= self.threshold
    }

    pub(crate) fn threshold(&self) -> usize {
        self.threshold
    }

    pub(crate) fn stats(&self) -> GcStats {
        self.stats
    }

    /// Mark from `roots`, sweep the rest, re-arm the threshold.
    ///
    /// Returns `(values freed, bytes freed)`.
    pub(crate) fn collect(&mut self, heap: &mut Heap, roots: &[Value]) -> (usize, usize) {
        heap.clear_marks();

        let mut worklist: Vec<ObjectId> = roots.iter().filter_map(Value::heap_id).collect();
        let mut children = Vec::new();
        while let Some(id) = worklist.pop() {
            if !heap.mark(id) {
                continue;
            }
            children.clear();
            if let Some(data) = heap.data(id) {
                data.trace(&mut children);
            }
            worklist.extend_from_slice(&children);
        }

        let (freed, bytes) = heap.sweep_unmarked();

        self.threshold = (heap.allocated_bytes() * 2).max(self.initial_threshold);
        self.stats.collections += 1;
        self.stats.values_freed += freed as u64;
        self.stats.bytes_freed += bytes as u64;
        (freed, bytes)
    }
}
