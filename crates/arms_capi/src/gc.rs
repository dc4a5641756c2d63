//! Exposes allocation, locking and collection.

use crate::heap::ArmsHeap;
use arms_capi_utils::{arms_error_try, error::ErrorHandle, try_convert_c_bytes, try_deref_mut};
use arms_gc::gc::{RunStats, Stats, Tracer};
use std::{ffi::c_void, os::raw::c_char};

/// A C-style handle to the tracer that is passed to visit hooks. It is only valid for the duration
/// of the hook invocation that received it.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ArmsTracer(pub *mut c_void);

/// Statistics about the live objects of a heap.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArmsStatistics {
    /// The number of live objects
    pub number_of_blocks: usize,
    /// The sum of the payload sizes of all live objects
    pub number_of_bytes: usize,
}

impl From<Stats> for ArmsStatistics {
    fn from(stats: Stats) -> Self {
        ArmsStatistics {
            number_of_blocks: stats.number_of_blocks,
            number_of_bytes: stats.number_of_bytes,
        }
    }
}

/// Statistics about a single collection cycle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArmsRunStatistics {
    /// The number of objects reclaimed by the cycle
    pub destroyed_blocks: usize,
    /// The sum of the payload sizes of the objects reclaimed by the cycle
    pub destroyed_bytes: usize,
    /// The number of objects found reachable by the cycle
    pub marked_blocks: usize,
    /// The live objects after the cycle
    pub live: ArmsStatistics,
}

impl From<RunStats> for ArmsRunStatistics {
    fn from(stats: RunStats) -> Self {
        ArmsRunStatistics {
            destroyed_blocks: stats.destroyed_blocks,
            destroyed_bytes: stats.destroyed_bytes,
            marked_blocks: stats.marked_blocks,
            live: stats.live.into(),
        }
    }
}

/// Allocates `size` bytes for an object of the type registered as `name`, which is `name_len`
/// bytes long. If successful, `obj` is set to the address of the payload, otherwise a non-zero
/// error handle is returned.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer,
/// an error will be returned. Passing pointers to invalid data, will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_gc_allocate(
    heap: ArmsHeap,
    obj: *mut *mut c_void,
    name: *const c_char,
    name_len: usize,
    size: usize,
) -> ErrorHandle {
    let state = arms_error_try!(heap.inner_mut());
    let obj = try_deref_mut!(obj);
    let name = arms_error_try!(
        try_convert_c_bytes(name, name_len).map_err(|e| format!("invalid argument 'name': {e}"))
    );

    let ptr = arms_error_try!(state.heap.alloc_by_name(name, size));
    let payload = arms_error_try!(state
        .heap
        .object(ptr)
        .ok_or("allocated object does not exist"));
    *obj = payload.as_ptr().cast();
    ErrorHandle::default()
}

/// Locks the object at `obj`, which keeps it and objects it references alive. An object can be
/// locked multiple times, but you must make sure to call [`arms_gc_unlock`] an equal number of
/// times before the object can be collected.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer
/// or `obj` is not the address of a live object, an error will be returned.
#[no_mangle]
pub unsafe extern "C" fn arms_gc_lock(heap: ArmsHeap, obj: *const c_void) -> ErrorHandle {
    let state = arms_error_try!(heap.inner_mut());
    let ptr = arms_error_try!(state
        .heap
        .find_object(obj.cast())
        .ok_or_else(|| format!("invalid argument 'obj': {obj:?} is not a live object")));

    if state.heap.lock_count(ptr) == Some(u32::MAX) {
        return ErrorHandle::new(format!(
            "invalid argument 'obj': {obj:?} is locked too many times"
        ));
    }
    state.heap.lock(ptr);
    ErrorHandle::default()
}

/// Unlocks the object at `obj`, potentially allowing it and objects it references to be
/// collected. An object can be locked multiple times, so you must make sure to call
/// `arms_gc_unlock` the same number of times as [`arms_gc_lock`] was called before the object can
/// be collected.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer
/// or `obj` is not the address of a live object, an error will be returned.
#[no_mangle]
pub unsafe extern "C" fn arms_gc_unlock(heap: ArmsHeap, obj: *const c_void) -> ErrorHandle {
    let state = arms_error_try!(heap.inner_mut());
    let ptr = arms_error_try!(state
        .heap
        .find_object(obj.cast())
        .ok_or_else(|| format!("invalid argument 'obj': {obj:?} is not a live object")));

    if state.heap.lock_count(ptr) == Some(0) {
        return ErrorHandle::new(format!("invalid argument 'obj': {obj:?} is not locked"));
    }
    state.heap.unlock(ptr);
    ErrorHandle::default()
}

/// Collects all objects that are not reachable from a locked object, invoking their finalize
/// hooks. If successful, `run_stats` is set, otherwise a non-zero error handle is returned.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer,
/// an error will be returned. Passing pointers to invalid data, will lead to undefined behavior.
/// Visit and finalize hooks must not call back into the heap, except for calling
/// [`arms_gc_visit`] from a visit hook.
#[no_mangle]
pub unsafe extern "C" fn arms_gc_collect(
    heap: ArmsHeap,
    run_stats: *mut ArmsRunStatistics,
) -> ErrorHandle {
    let state = arms_error_try!(heap.inner_mut());
    let run_stats = try_deref_mut!(run_stats);

    *run_stats = state.heap.collect().into();
    ErrorHandle::default()
}

/// Marks the object at `obj` as reachable. Must only be called from within a visit hook, with the
/// `tracer` that was passed to the hook.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// `tracer` must be the handle passed to the currently running visit hook. Passing any other
/// non-null value will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_gc_visit(tracer: ArmsTracer, obj: *const c_void) -> ErrorHandle {
    let tracer = tracer.0.cast::<Tracer<'_>>();
    let tracer = try_deref_mut!(tracer);
    let ptr = arms_error_try!(tracer
        .find_object(obj.cast())
        .ok_or_else(|| format!("invalid argument 'obj': {obj:?} is not a live object")));

    tracer.mark_reachable(ptr);
    ErrorHandle::default()
}

/// Retrieves statistics about the live objects of the heap. If successful, `stats` is set,
/// otherwise a non-zero error handle is returned.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer,
/// an error will be returned. Passing pointers to invalid data, will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_gc_statistics(
    heap: ArmsHeap,
    stats: *mut ArmsStatistics,
) -> ErrorHandle {
    let state = arms_error_try!(heap.inner());
    let stats = try_deref_mut!(stats);

    *stats = state.heap.stats().into();
    ErrorHandle::default()
}
