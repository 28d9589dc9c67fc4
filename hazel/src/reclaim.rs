//! The scan: free retired nodes that no hazard pointer references.
//!
//! Two phases, run by whichever thread's retired buffer filled up:
//!
//! 1. Snapshot every record's hazard slots into a sorted array.
//! 2. Sweep the calling thread's own retired buffer, freeing entries absent
//!    from the snapshot and compacting the buffer in place.
//!
//! A node survives a scan while any thread's slot holds its address. Slightly
//! stale slots are harmless: a late-published hazard pointer only makes the
//! node survive one extra scan.

use crate::registry::{self, Registry, ThreadRecord, HAZARDS_PER_THREAD};

/// Extra record headroom when sizing the snapshot. Threads registering during
/// the walk are absorbed by the slack instead of forcing a restart.
const SCAN_SLACK: usize = 16;

/// Scan on behalf of `record`'s owner.
///
/// # Safety
///
/// The caller must be the thread currently owning `record`.
pub(crate) unsafe fn scan(record: &ThreadRecord) {
    // SAFETY: forwarded to the caller.
    unsafe { scan_registry(registry::global(), record) }
}

/// Scan against an explicit registry.
///
/// # Safety
///
/// The caller must be the thread currently owning `record`, and `record`
/// must belong to `registry`.
pub(crate) unsafe fn scan_registry(registry: &Registry, record: &ThreadRecord) {
    // Snapshot phase. If more hazards show up than the sizing allowed for
    // (a burst of registrations mid-walk), restart rather than reallocating:
    // the walk itself must see a consistent bound. The counter read can lag
    // the registrations that caused the overflow, so the retry at least
    // doubles the previous bound to guarantee progress.
    let mut capacity = (registry.active_threads() + SCAN_SLACK) * HAZARDS_PER_THREAD;
    let mut hazards = loop {
        match snapshot_hazards(registry, capacity) {
            Some(snapshot) => break snapshot,
            None => {
                capacity = ((registry.active_threads() + SCAN_SLACK) * HAZARDS_PER_THREAD)
                    .max(capacity * 2);
            }
        }
    };

    hazards.sort_unstable();

    // Sweep phase: swap-remove keeps the buffer dense without shifting.
    // SAFETY: per the contract, we are the owning thread.
    let retired = unsafe { record.retired_mut() };
    let mut index = 0;
    while index < retired.len() {
        if hazards.binary_search(&(retired[index].ptr as usize)).is_ok() {
            index += 1;
        } else {
            let entry = retired.swap_remove(index);
            // SAFETY: the entry's address is in no hazard slot, and slots are
            // published before any new reference to a retired node can form.
            unsafe { entry.free() };
        }
    }
}

/// Collect every non-null hazard slot, walking all records, active or not.
///
/// Returns `None` when the slots outgrow `capacity`; the caller restarts
/// with a larger bound.
fn snapshot_hazards(registry: &Registry, capacity: usize) -> Option<Vec<usize>> {
    let mut snapshot = Vec::with_capacity(capacity);
    for record in registry.iter() {
        for index in 0..HAZARDS_PER_THREAD {
            let hazard = record.hazard(index);
            if hazard != 0 {
                if snapshot.len() == capacity {
                    return None;
                }
                snapshot.push(hazard);
            }
        }
    }
    Some(snapshot)
}
