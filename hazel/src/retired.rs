//! Retired node bookkeeping.
//!
//! A retired node is unlinked from its data structure but not yet freed.
//! Each entry carries a type-erased destructor so the reclaimer can free
//! nodes of any type without knowing about them.

/// Type-erased destructor function.
pub(crate) type DropFn = unsafe fn(*mut u8);

/// Retired buffer capacity per thread record. Reaching it triggers a scan.
pub(crate) const RETIRE_CAPACITY: usize = 64;

/// A node handed to the reclaimer, paired with its destructor.
pub(crate) struct Retired {
    pub(crate) ptr: *mut u8,
    drop_fn: DropFn,
}

impl Retired {
    /// Erase the type of `ptr`, remembering how to drop it.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `Box::into_raw` and must not be dropped through
    /// any other path.
    pub(crate) unsafe fn new<T>(ptr: *mut T) -> Self {
        unsafe fn drop_box<T>(ptr: *mut u8) {
            // SAFETY: `ptr` was produced by `Box::into_raw` in `Retired::new`
            // and this is the only drop path.
            unsafe {
                drop(Box::from_raw(ptr as *mut T));
            }
        }

        Self {
            ptr: ptr as *mut u8,
            drop_fn: drop_box::<T>,
        }
    }

    /// Free the node.
    ///
    /// # Safety
    ///
    /// No hazard pointer anywhere in the process may reference `self.ptr`.
    pub(crate) unsafe fn free(self) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.drop_fn)(self.ptr) }
    }
}

// SAFETY: Retired only carries a raw pointer and a fn pointer; ownership of
// the pointee is transferred with the entry.
unsafe impl Send for Retired {}
