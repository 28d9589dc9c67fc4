//! Thread-local handle, pin/unpin, and the retire entry point.

use crate::reclaim::scan;
use crate::registry::{self, ThreadRecord, HAZARDS_PER_THREAD};
use crate::retired::{Retired, RETIRE_CAPACITY};
use core::cell::Cell;

/// Thread-local state: the record (lazily acquired on first pin) and the
/// number of live guards on this thread.
struct Handle {
    record: Cell<Option<&'static ThreadRecord>>,
    pin_count: Cell<usize>,
}

impl Handle {
    const fn new() -> Self {
        Self {
            record: Cell::new(None),
            pin_count: Cell::new(0),
        }
    }

    #[inline]
    fn record(&self) -> &'static ThreadRecord {
        match self.record.get() {
            Some(record) => record,
            None => {
                let record = registry::global().acquire();
                self.record.set(Some(record));
                record
            }
        }
    }

    #[inline]
    fn pin(&self) -> Guard {
        let record = self.record();
        self.pin_count.set(self.pin_count.get() + 1);
        Guard {
            record,
            _not_send: core::marker::PhantomData,
        }
    }

    #[inline]
    fn unpin(&self) {
        let count = self.pin_count.get() - 1;
        self.pin_count.set(count);

        // Only the outermost guard clears the slots; an inner guard must not
        // drop protection the outer one still relies on.
        if count == 0 {
            if let Some(record) = self.record.get() {
                for index in 0..HAZARDS_PER_THREAD {
                    record.clear_hazard(index);
                }
            }
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(record) = self.record.get() {
            for index in 0..HAZARDS_PER_THREAD {
                record.clear_hazard(index);
            }
            // Final sweep: free whatever is already unprotected. Entries still
            // protected by other threads stay behind for the record's next
            // owner to sweep.
            // SAFETY: we still own the record until release() below.
            unsafe { scan(record) };
            registry::global().release(record);
        }
    }
}

std::thread_local! {
    static HANDLE: Handle = const { Handle::new() };
}

/// An active critical section.
///
/// While a `Guard` exists the calling thread holds its registry record, and
/// pointers published through [`Guard::protect`] are safe from reclamation.
/// Dropping the outermost guard clears both hazard slots.
///
/// Not `Send`: the drop must run on the thread that pinned.
pub struct Guard {
    record: &'static ThreadRecord,
    _not_send: core::marker::PhantomData<*mut ()>,
}

impl Guard {
    /// Publish `ptr` in hazard slot `index`.
    ///
    /// Publication alone is not protection: the caller must re-read the
    /// location `ptr` came from and confirm it still points at `ptr` before
    /// dereferencing. `index` must be below [`HAZARDS_PER_THREAD`].
    #[inline]
    pub fn protect<T>(&self, index: usize, ptr: *mut T) {
        self.record.set_hazard(index, ptr as usize);
    }

    /// Clear hazard slot `index`.
    #[inline]
    pub fn clear(&self, index: usize) {
        self.record.clear_hazard(index);
    }

    /// Hand an unlinked node to the reclaimer.
    ///
    /// The node is freed by a later scan, once no thread's hazard slot holds
    /// its address. Reaching the buffer capacity triggers a scan inline.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::into_raw`, must already be unreachable from
    /// the data structure, and must be retired exactly once.
    pub unsafe fn retire<T: 'static>(&self, ptr: *mut T) {
        // SAFETY: the guard proves we own the record; `Retired::new` contract
        // is forwarded to the caller. The borrow ends before scan() takes
        // its own.
        let buffered = {
            let retired = unsafe { self.record.retired_mut() };
            retired.push(unsafe { Retired::new(ptr) });
            retired.len()
        };

        if buffered >= RETIRE_CAPACITY {
            // SAFETY: owning thread.
            unsafe { scan(self.record) };
        }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        HANDLE.with(|handle| handle.unpin());
    }
}

/// Enter a critical section.
///
/// Acquires the calling thread's registry record on first use. Guards nest:
/// only the outermost drop clears the hazard slots.
#[inline]
pub fn pin() -> Guard {
    HANDLE.with(|handle| handle.pin())
}

/// Retire a node through the calling thread's record.
///
/// Convenience wrapper over [`Guard::retire`] for callers that do not have a
/// guard in scope.
///
/// # Safety
///
/// Same contract as [`Guard::retire`].
pub unsafe fn retire<T: 'static>(ptr: *mut T) {
    let guard = pin();
    // SAFETY: forwarded to the caller.
    unsafe { guard.retire(ptr) };
}

/// Run a scan of the calling thread's retired buffer immediately.
///
/// Frees every buffered node no hazard pointer references. Intended for
/// teardown and tests; ordinary operation scans automatically when the
/// buffer fills.
pub fn flush() {
    HANDLE.with(|handle| {
        if let Some(record) = handle.record.get() {
            // SAFETY: the thread-local handle owns its record.
            unsafe { scan(record) };
        }
    });
}
