//! Exposes the ARMS garbage collector using the C ABI.
//!
//! A host creates a heap with [`arms_heap_create`], registers the types of its objects with
//! [`arms_type_add`] and allocates objects with [`arms_gc_allocate`]. Objects are referred to by
//! the address of their payload. Objects stay alive while they are locked with [`arms_gc_lock`] or
//! reachable from a locked object, as reported by the visit hook of their type through
//! [`arms_gc_visit`]. Everything else is reclaimed by [`arms_gc_collect`].
//!
//! Every fallible function returns an [`ErrorHandle`]. A non-null handle holds an error message
//! that must be destroyed with [`arms_error_destroy`].

mod gc;
mod heap;
mod type_info;


pub use arms_capi_utils::{
    arms_string_destroy,
    error::{arms_error_destroy, ErrorHandle},
};
pub use gc::{
    arms_gc_allocate, arms_gc_collect, arms_gc_lock, arms_gc_statistics, arms_gc_unlock,
    arms_gc_visit, ArmsRunStatistics, ArmsStatistics, ArmsTracer,
};
pub use heap::{arms_heap_create, arms_heap_destroy, ArmsHeap, ArmsHeapOptions};
pub use type_info::{
    arms_type_add, arms_type_find, arms_type_hooks, ArmsHookFn, ArmsType, ArmsTypeHooks,
    ArmsVisitFn,
};
