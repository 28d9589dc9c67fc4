//! Thread records and the global registry.
//!
//! Each participating thread owns one `ThreadRecord` at a time: two hazard
//! slots, an active flag, and a retired-node buffer. Records live on a global
//! append-only linked list and are never freed; a record deactivated by a
//! dying thread is recycled by the next thread that registers.

use crate::retired::Retired;
use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use once_cell::race::OnceBox;

/// Hazard slots per thread record.
///
/// Two is exactly what the ordered-list traversal needs: one for the node
/// being inspected and one for its predecessor anchor.
pub const HAZARDS_PER_THREAD: usize = 2;

/// Per-thread bookkeeping record.
///
/// The hazard slots may be read by any thread during a scan; the retired
/// buffer is written only by the thread that currently holds the record.
pub(crate) struct ThreadRecord {
    hazards: [AtomicUsize; HAZARDS_PER_THREAD],
    active: AtomicBool,
    next: AtomicPtr<ThreadRecord>,
    retired: UnsafeCell<Vec<Retired>>,
}

// SAFETY: hazard slots and the active flag are atomics. The retired buffer is
// guarded by the active-flag protocol: only the single thread that won the
// false->true CAS (or allocated the record) touches it.
unsafe impl Sync for ThreadRecord {}
unsafe impl Send for ThreadRecord {}

impl ThreadRecord {
    fn new(active: bool) -> Self {
        Self {
            hazards: [AtomicUsize::new(0), AtomicUsize::new(0)],
            active: AtomicBool::new(active),
            next: AtomicPtr::new(ptr::null_mut()),
            retired: UnsafeCell::new(Vec::with_capacity(crate::retired::RETIRE_CAPACITY)),
        }
    }

    /// Publish a hazard pointer.
    ///
    /// SeqCst: the publication must be globally visible before the caller's
    /// validation re-read of the source location, and before any scanner's
    /// read of this slot.
    #[inline]
    pub(crate) fn set_hazard(&self, index: usize, ptr: usize) {
        self.hazards[index].store(ptr, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn clear_hazard(&self, index: usize) {
        self.hazards[index].store(0, Ordering::Release);
    }

    #[inline]
    pub(crate) fn hazard(&self, index: usize) -> usize {
        self.hazards[index].load(Ordering::SeqCst)
    }

    /// Exclusive access to the retired buffer.
    ///
    /// # Safety
    ///
    /// Only the thread currently owning this record may call this, and the
    /// returned reference must not outlive that ownership.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn retired_mut(&self) -> &mut Vec<Retired> {
        // SAFETY: forwarded to the caller.
        unsafe { &mut *self.retired.get() }
    }
}

/// Global registry of thread records.
pub(crate) struct Registry {
    head: AtomicPtr<ThreadRecord>,
    active_threads: AtomicUsize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            active_threads: AtomicUsize::new(0),
        }
    }

    /// Obtain a record for the calling thread.
    ///
    /// Reuses the first deactivated record whose active flag CAS-transitions
    /// false -> true; otherwise allocates a fresh record and CAS-pushes it
    /// onto the front of the list. Records are leaked deliberately: the list
    /// is append-only for the process lifetime.
    pub(crate) fn acquire(&self) -> &'static ThreadRecord {
        for record in self.iter() {
            if record
                .active
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                self.active_threads.fetch_add(1, Ordering::Release);
                return record;
            }
        }

        let record = Box::into_raw(Box::new(ThreadRecord::new(true)));
        loop {
            let head = self.head.load(Ordering::Acquire);
            // SAFETY: `record` is not yet published; no other thread sees it.
            unsafe { (*record).next.store(head, Ordering::Relaxed) };
            if self
                .head
                .compare_exchange(head, record, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
        self.active_threads.fetch_add(1, Ordering::Release);
        // SAFETY: the record was just leaked and records are never freed.
        unsafe { &*record }
    }

    /// Return a record to the pool.
    ///
    /// Hazard slots are cleared before the flag flips so a scanner never
    /// mistakes the departing thread for one still observing nodes. Retired
    /// entries still protected elsewhere stay in the buffer and are swept by
    /// the record's next owner.
    pub(crate) fn release(&self, record: &'static ThreadRecord) {
        for index in 0..HAZARDS_PER_THREAD {
            record.clear_hazard(index);
        }
        record.active.store(false, Ordering::Release);
        self.active_threads.fetch_sub(1, Ordering::Release);
    }

    #[inline]
    pub(crate) fn active_threads(&self) -> usize {
        self.active_threads.load(Ordering::Acquire)
    }

    /// Walk every record, active or not. Inactive records matter to scans:
    /// they may be mid-reuse, and their buffers can still hold retired nodes.
    pub(crate) fn iter(&self) -> RecordIter {
        RecordIter {
            current: self.head.load(Ordering::Acquire),
        }
    }
}

pub(crate) struct RecordIter {
    current: *mut ThreadRecord,
}

impl Iterator for RecordIter {
    type Item = &'static ThreadRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }
        // SAFETY: records are leaked on allocation and never freed.
        let record: &'static ThreadRecord = unsafe { &*self.current };
        self.current = record.next.load(Ordering::Acquire);
        Some(record)
    }
}

static GLOBAL: OnceBox<Registry> = OnceBox::new();

/// The process-wide registry, constructed on first use.
#[inline]
pub(crate) fn global() -> &'static Registry {
    GLOBAL.get_or_init(|| Box::new(Registry::new()))
}

/// Number of threads currently holding a record.
///
/// Diagnostic; the value is stale the moment it is read.
pub fn active_threads() -> usize {
    global().active_threads()
}

/// Total records ever allocated, active or not.
///
/// Grows only when more threads register simultaneously than ever before;
/// sequential thread churn recycles records instead.
pub fn registered_records() -> usize {
    global().iter().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_released_records() {
        let registry = Registry::new();

        let first = registry.acquire() as *const ThreadRecord;
        registry.release(unsafe { &*first });

        let second = registry.acquire() as *const ThreadRecord;
        assert_eq!(first, second, "deactivated record should be recycled");
    }

    #[test]
    fn acquire_allocates_when_all_records_are_taken() {
        let registry = Registry::new();

        let first = registry.acquire() as *const ThreadRecord;
        let second = registry.acquire() as *const ThreadRecord;
        assert_ne!(first, second);
        assert_eq!(registry.active_threads(), 2);
    }

    #[test]
    fn release_clears_hazards() {
        let registry = Registry::new();

        let record = registry.acquire();
        record.set_hazard(0, 0xdead_0000);
        record.set_hazard(1, 0xdead_0010);
        registry.release(record);

        assert_eq!(record.hazard(0), 0);
        assert_eq!(record.hazard(1), 0);
        assert_eq!(registry.active_threads(), 0);
    }
}
