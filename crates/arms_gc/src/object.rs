use crate::gc::GcPtr;
use std::{fmt, marker::PhantomData, ptr::NonNull, slice};

/// A view of the payload of a managed allocation.
///
/// The collector hands an `Object` to the visit and finalize callbacks of a type; callers obtain
/// one through [`MarkSweep::object`](crate::gc::MarkSweep::object). The view never outlives the
/// borrow it was created from.
#[derive(Copy, Clone)]
pub struct Object<'a> {
    handle: GcPtr,
    data: NonNull<u8>,
    size: usize,
    _payload: PhantomData<&'a [u8]>,
}

impl<'a> Object<'a> {
    pub(crate) fn new(handle: GcPtr, data: NonNull<u8>, size: usize) -> Self {
        Self {
            handle,
            data,
            size,
            _payload: PhantomData,
        }
    }

    /// Returns the handle of this object.
    pub fn handle(&self) -> GcPtr {
        self.handle
    }

    /// Returns a pointer to the first byte of the payload.
    pub fn as_ptr(&self) -> *mut u8 {
        self.data.as_ptr()
    }

    /// Returns the size of the payload in bytes, as requested at allocation.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the payload as a byte slice.
    ///
    /// # Safety
    ///
    /// Unless the heap zeroes new allocations the payload may still be uninitialized, and nothing
    /// may write to the payload while the returned slice is alive.
    pub unsafe fn bytes(&self) -> &'a [u8] {
        slice::from_raw_parts(self.data.as_ptr(), self.size)
    }

    /// Reinterprets the payload as a `T`.
    ///
    /// # Safety
    ///
    /// The payload must hold an initialized `T` and be suitably aligned for it.
    pub unsafe fn deref<T: Sized>(&self) -> &'a T {
        debug_assert!(std::mem::size_of::<T>() <= self.size);
        &*self.data.as_ptr().cast::<T>()
    }
}

impl fmt::Debug for Object<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("handle", &self.handle)
            .field("data", &self.data)
            .field("size", &self.size)
            .finish()
    }
}
