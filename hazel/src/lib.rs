//! Hazel: hazard-pointer safe memory reclamation for lock-free data
//! structures.
//!
//! Removing a node from a lock-free structure unlinks it, but other threads
//! may still be dereferencing it. Hazel defers the free: each thread
//! publishes the pointers it is about to dereference in per-thread hazard
//! slots, removed nodes are retired instead of freed, and a scan frees a
//! retired node only once no slot anywhere in the process holds its address.
//!
//! No operation blocks or takes a mutex. Thread bookkeeping records are
//! allocated lazily, recycled across thread lifetimes, and never freed.
//!
//! # Example
//!
//! ```rust
//! use hazel::pin;
//!
//! let node = Box::into_raw(Box::new(42u64));
//!
//! let guard = pin();
//! guard.protect(0, node);
//! // ... validate the source still points at `node`, then dereference ...
//! guard.clear(0);
//!
//! // The node is now unreachable; hand it to the reclaimer.
//! unsafe { guard.retire(node) };
//! ```

#![warn(missing_docs)]

mod guard;
mod reclaim;
pub mod registry;
mod retired;

pub use guard::{flush, pin, retire, Guard};
pub use registry::HAZARDS_PER_THREAD;
