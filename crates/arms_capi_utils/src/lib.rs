use std::{ffi::CString, os::raw::c_char, slice};

pub mod error;

pub use error::ErrorHandle;

/// Deallocates a string that was allocated by the library.
///
/// # Safety
///
/// This function receives a raw pointer as parameter. Only when the argument is not a null pointer,
/// its content will be deallocated. Passing pointers to invalid data or memory allocated by other
/// processes, will lead to undefined behavior.
#[no_mangle]
pub unsafe extern "C" fn arms_string_destroy(string: *const c_char) {
    if !string.is_null() {
        // Destroy the string
        let _string = CString::from_raw(string.cast_mut());
    }
}

/// Tries to convert a pointer to `len` bytes into a byte slice. The bytes don't need to be valid
/// UTF-8 or null terminated.
///
/// # Safety
///
/// The caller must provide a pointer to at least `len` readable bytes, whose content doesnt change
/// during the lifetime `'a`.
pub unsafe fn try_convert_c_bytes<'a>(
    bytes: *const c_char,
    len: usize,
) -> Result<&'a [u8], &'static str> {
    if bytes.is_null() {
        return Err("null pointer");
    }

    Ok(slice::from_raw_parts(bytes.cast::<u8>(), len))
}

#[macro_export]
macro_rules! assert_getter1 {
    ($fun:ident ( $handle:expr, $($arg:ident),+ $(,)?)) => {
        $(
            let mut $arg = std::mem::MaybeUninit::uninit();
        )+
        assert!(unsafe { $fun($handle, $($arg.as_mut_ptr()),+) }.is_ok());
        $(
            let $arg = unsafe { $arg.assume_init() };
        )+
    };
}

#[macro_export]
macro_rules! assert_getter2 {
    ($fun:ident ( $handle:expr, $arg1:expr, $($arg:ident),+ $(,)?)) => {
        $(
            let mut $arg = std::mem::MaybeUninit::uninit();
        )+
        assert!(unsafe { $fun($handle, $arg1, $($arg.as_mut_ptr()),+) }.is_ok());
        $(
            let $arg = unsafe { $arg.assume_init() };
        )+
    };
}
