//! A tracing mark-and-sweep garbage collector for an embedding host.
//!
//! The host registers [`Type`]s by name, each with optional callbacks that report the references
//! an object holds ([`TypeBuilder::visit`]) and release resources it owns
//! ([`TypeBuilder::finalize`]). Objects are allocated on a [`Heap`](gc::Heap), kept alive by
//! locking them, and reclaimed by [`collect`](gc::MarkSweep::collect) once they are no longer
//! reachable from a locked object.
//!
//! ```
//! use arms_gc::{gc::Heap, TypeBuilder};
//!
//! let mut heap = Heap::new();
//! let leaf = heap.add_type(TypeBuilder::new("Leaf")).unwrap();
//!
//! let kept = heap.alloc(leaf, 16).unwrap();
//! let _dropped = heap.alloc(leaf, 16).unwrap();
//! heap.lock(kept);
//!
//! let run = heap.collect();
//! assert_eq!(run.destroyed_blocks, 1);
//! assert!(heap.contains(kept));
//! ```
//!
//! # Logging
//!
//! Collection cycles and type registration are reported at the `debug` level and individual
//! allocations at the `trace` level through the [`log`] facade. The library never installs a
//! logger; that is up to the host.

pub mod gc;
mod object;
pub mod type_table;

pub use object::Object;
pub use type_table::{FinalizeFn, Type, TypeBuilder, TypeId, TypeTable, TypeTableError, VisitFn};
