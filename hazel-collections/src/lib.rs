//! Lock-free ordered collections on hazel's hazard-pointer reclamation.
//!
//! Two structures, both safe for unsynchronized access from any number of
//! threads and both lock-free (a CAS retry loop, never a mutex):
//!
//! - [`OrderedList`]: a sorted singly-linked list keyed by `usize`.
//! - [`HashTable`]: a fixed-size array of power-of-two many independent
//!   lists, selected by `key & (n - 1)`. No resizing.
//!
//! Removed nodes are retired through [`hazel`] and freed only once no
//! thread's hazard pointer references them.
//!
//! # Example
//!
//! ```rust
//! use hazel_collections::HashTable;
//!
//! let table = HashTable::with_capacity(64);
//!
//! table.insert(0x1000, "payload");
//! assert_eq!(table.get(0x1000), Some("payload"));
//! assert_eq!(table.remove(0x1000), Some("payload"));
//! assert_eq!(table.get(0x1000), None);
//! ```

#![warn(missing_docs)]

mod list;
mod marked;
mod table;

pub use list::OrderedList;
pub use table::HashTable;
