//! Atomic pointers with a low-bit deletion mark.
//!
//! A node's successor field packs the real pointer and a "logically deleted"
//! flag into one CAS-able word. The mark rides the low bit, which is always
//! zero for Box allocations of aligned node types.

use core::fmt;
use core::marker::PhantomData;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

const MARK_BIT: usize = 1;

/// A pointer word with an optional deletion mark in the low bit.
pub(crate) struct MarkedPtr<T> {
    data: usize,
    _marker: PhantomData<*mut T>,
}

impl<T> MarkedPtr<T> {
    /// An unmarked pointer.
    #[inline]
    pub(crate) fn new(ptr: *mut T) -> Self {
        debug_assert_eq!(ptr as usize & MARK_BIT, 0, "node allocation not aligned");
        Self {
            data: ptr as usize,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn null() -> Self {
        Self::new(ptr::null_mut())
    }

    #[inline]
    fn from_usize(data: usize) -> Self {
        Self {
            data,
            _marker: PhantomData,
        }
    }

    /// The pointer with the mark stripped.
    #[inline]
    pub(crate) fn ptr(self) -> *mut T {
        (self.data & !MARK_BIT) as *mut T
    }

    #[inline]
    pub(crate) fn is_null(self) -> bool {
        self.ptr().is_null()
    }

    #[inline]
    pub(crate) fn is_marked(self) -> bool {
        self.data & MARK_BIT != 0
    }

    /// The same pointer with the mark set.
    #[inline]
    pub(crate) fn with_mark(self) -> Self {
        Self::from_usize(self.data | MARK_BIT)
    }

    /// The same pointer with the mark stripped.
    #[inline]
    pub(crate) fn unmarked(self) -> Self {
        Self::from_usize(self.data & !MARK_BIT)
    }
}

impl<T> Copy for MarkedPtr<T> {}

impl<T> Clone for MarkedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for MarkedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T> Eq for MarkedPtr<T> {}

impl<T> fmt::Debug for MarkedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MarkedPtr({:p}{})",
            self.ptr(),
            if self.is_marked() { ", marked" } else { "" }
        )
    }
}

/// Atomic cell holding a [`MarkedPtr`].
pub(crate) struct AtomicMarkedPtr<T> {
    data: AtomicUsize,
    _marker: PhantomData<*mut T>,
}

// SAFETY: same story as an AtomicPtr to T.
unsafe impl<T: Send + Sync> Send for AtomicMarkedPtr<T> {}
unsafe impl<T: Send + Sync> Sync for AtomicMarkedPtr<T> {}

impl<T> AtomicMarkedPtr<T> {
    #[inline]
    pub(crate) fn null() -> Self {
        Self {
            data: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn load(&self, order: Ordering) -> MarkedPtr<T> {
        MarkedPtr::from_usize(self.data.load(order))
    }

    #[inline]
    pub(crate) fn store(&self, ptr: MarkedPtr<T>, order: Ordering) {
        self.data.store(ptr.data, order);
    }

    #[inline]
    pub(crate) fn compare_exchange(
        &self,
        current: MarkedPtr<T>,
        new: MarkedPtr<T>,
    ) -> Result<MarkedPtr<T>, MarkedPtr<T>> {
        match self
            .data
            .compare_exchange(current.data, new.data, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(prev) => Ok(MarkedPtr::from_usize(prev)),
            Err(prev) => Err(MarkedPtr::from_usize(prev)),
        }
    }
}
