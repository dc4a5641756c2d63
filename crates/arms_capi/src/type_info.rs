//! Exposes type registration.

use crate::{gc::ArmsTracer, heap::ArmsHeap};
use arms_capi_utils::{arms_error_try, error::ErrorHandle, try_convert_c_bytes, try_deref_mut};
use arms_gc::{TypeBuilder, TypeId};
use std::{ffi::c_void, os::raw::c_char};

/// A hook that receives a pointer to the payload of an object.
pub type ArmsHookFn = Option<unsafe extern "C" fn(obj: *mut c_void)>;

/// A hook that reports every object referenced by `obj` by calling
/// [`arms_gc_visit`](crate::arms_gc_visit) with `tracer`.
pub type ArmsVisitFn = Option<unsafe extern "C" fn(tracer: ArmsTracer, obj: *mut c_void)>;

/// The hooks of a type. Every hook is optional.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct ArmsTypeHooks {
    /// Stored for the host; never invoked by the collector
    pub ctor: ArmsHookFn,
    /// Stored for the host; never invoked by the collector
    pub dtor: ArmsHookFn,
    /// Invoked while marking to report the references held by an object
    pub visit: ArmsVisitFn,
    /// Invoked exactly once right before an object is reclaimed
    pub finalize: ArmsHookFn,
}

/// A C-style handle to a type registered in a heap.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArmsType(pub u32);

impl From<TypeId> for ArmsType {
    fn from(id: TypeId) -> Self {
        ArmsType(id.index())
    }
}

/// Registers a type called `name`, which is `name_len` bytes long, with the specified `hooks`. If
/// successful, `ty` is set, otherwise a non-zero error handle is returned. Registering a name twice
/// fails and leaves the original type untouched.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer,
/// an error will be returned. Passing pointers to invalid data, will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_type_add(
    heap: ArmsHeap,
    name: *const c_char,
    name_len: usize,
    hooks: ArmsTypeHooks,
    ty: *mut ArmsType,
) -> ErrorHandle {
    let state = arms_error_try!(heap.inner_mut());
    let name = arms_error_try!(
        try_convert_c_bytes(name, name_len).map_err(|e| format!("invalid argument 'name': {e}"))
    );
    let ty = try_deref_mut!(ty);

    let mut builder = TypeBuilder::new(name);
    if let Some(visit) = hooks.visit {
        builder = builder.visit(move |obj, tracer| {
            let tracer = ArmsTracer((tracer as *mut arms_gc::gc::Tracer<'_>).cast());
            unsafe { visit(tracer, obj.as_ptr().cast()) };
        });
    }
    if let Some(finalize) = hooks.finalize {
        builder = builder.finalize(move |obj| unsafe { finalize(obj.as_ptr().cast()) });
    }

    let id = arms_error_try!(state.heap.add_type(builder));
    debug_assert_eq!(id.index() as usize, state.hooks.len());
    state.hooks.push(hooks);

    *ty = id.into();
    ErrorHandle::default()
}

/// Retrieves the type registered as `name`, which is `name_len` bytes long. If successful, `ty` is
/// set, otherwise a non-zero error handle is returned.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer,
/// an error will be returned. Passing pointers to invalid data, will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_type_find(
    heap: ArmsHeap,
    name: *const c_char,
    name_len: usize,
    ty: *mut ArmsType,
) -> ErrorHandle {
    let state = arms_error_try!(heap.inner());
    let name = arms_error_try!(
        try_convert_c_bytes(name, name_len).map_err(|e| format!("invalid argument 'name': {e}"))
    );
    let ty = try_deref_mut!(ty);

    *ty = arms_error_try!(state.heap.find_type(name)).into();
    ErrorHandle::default()
}

/// Retrieves the hooks that were registered for `ty`. If successful, `hooks` is set, otherwise a
/// non-zero error handle is returned.
///
/// If a non-zero error handle is returned, it must be manually destructed using
/// [`arms_error_destroy`](crate::arms_error_destroy).
///
/// # Safety
///
/// This function receives raw pointers as parameters. If any of the arguments is a null pointer,
/// an error will be returned. Passing pointers to invalid data, will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_type_hooks(
    heap: ArmsHeap,
    ty: ArmsType,
    hooks: *mut ArmsTypeHooks,
) -> ErrorHandle {
    let state = arms_error_try!(heap.inner());
    let hooks = try_deref_mut!(hooks);

    *hooks = *arms_error_try!(state
        .hooks
        .get(ty.0 as usize)
        .ok_or_else(|| format!("invalid argument 'ty': type {} is not registered", ty.0)));
    ErrorHandle::default()
}
