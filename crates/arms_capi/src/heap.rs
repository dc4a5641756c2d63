//! Exposes heap construction and destruction.

use crate::{gc::ArmsRunStatistics, type_info::ArmsTypeHooks};
use arms_capi_utils::{error::ErrorHandle, try_deref_mut};
use arms_gc::gc::{Heap, HeapOptions};
use log::debug;
use std::ffi::c_void;

/// A heap together with the hooks of the types registered in it. `hooks` is indexed by
/// [`TypeId`](arms_gc::TypeId).
pub(crate) struct HeapState {
    pub heap: Heap,
    pub hooks: Vec<ArmsTypeHooks>,
}

/// A C-style handle to a heap.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ArmsHeap(pub *mut c_void);

impl ArmsHeap {
    pub(crate) unsafe fn inner(&self) -> Result<&HeapState, String> {
        self.0
            .cast::<HeapState>()
            .as_ref()
            .ok_or_else(|| String::from("ArmsHeap is null pointer."))
    }

    pub(crate) unsafe fn inner_mut(&self) -> Result<&mut HeapState, String> {
        self.0
            .cast::<HeapState>()
            .as_mut()
            .ok_or_else(|| String::from("ArmsHeap is null pointer."))
    }
}

/// Options required to construct an [`ArmsHeap`] through [`arms_heap_create`]
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct ArmsHeapOptions {
    /// The number of objects to reserve room for up front
    pub initial_capacity: usize,
    /// The maximum number of payload bytes the heap may hold at once, or zero for no limit
    pub memory_limit: usize,
    /// Whether new payloads are zeroed
    pub zero_memory: bool,
}

impl Default for ArmsHeapOptions {
    fn default() -> Self {
        let options = HeapOptions::default();
        ArmsHeapOptions {
            initial_capacity: options.initial_capacity,
            memory_limit: 0,
            zero_memory: options.zero_memory,
        }
    }
}

impl From<ArmsHeapOptions> for HeapOptions {
    fn from(options: ArmsHeapOptions) -> Self {
        HeapOptions {
            initial_capacity: options.initial_capacity,
            memory_limit: (options.memory_limit != 0).then_some(options.memory_limit),
            zero_memory: options.zero_memory,
        }
    }
}

/// Constructs a new, empty heap. If successful, `heap` is set, otherwise a non-zero error handle
/// is returned.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// The heap must be manually destructed using [`arms_heap_destroy`].
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer,
/// an error will be returned. Passing pointers to invalid data, will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_heap_create(
    options: ArmsHeapOptions,
    heap: *mut ArmsHeap,
) -> ErrorHandle {
    let heap = try_deref_mut!(heap);

    let state = HeapState {
        heap: Heap::with_options(options.into()),
        hooks: Vec::new(),
    };

    heap.0 = Box::into_raw(Box::new(state)).cast();
    debug!("created heap {:?}", heap.0);
    ErrorHandle::default()
}

/// Destructs the heap corresponding to `heap`, finalizing and releasing every object that is
/// still alive, locked or not. If `run_stats` is not a null pointer, it receives the statistics of
/// this final sweep.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// `heap` must have been created by [`arms_heap_create`] and must not be used after this call.
/// Finalize hooks must not call back into the heap that is being destroyed.
#[no_mangle]
pub unsafe extern "C" fn arms_heap_destroy(
    heap: ArmsHeap,
    run_stats: *mut ArmsRunStatistics,
) -> ErrorHandle {
    if heap.0.is_null() {
        return ErrorHandle::new("invalid argument 'heap': null pointer");
    }

    let state = *Box::from_raw(heap.0.cast::<HeapState>());
    let stats = state.heap.shutdown();
    debug!("destroyed heap {:?}", heap.0);

    if let Some(run_stats) = run_stats.as_mut() {
        *run_stats = stats.into();
    }
    ErrorHandle::default()
}
