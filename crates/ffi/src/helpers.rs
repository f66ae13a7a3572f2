use crate::error::{
    with_last_error_mut, ConstellationError, ConstellationErrorCode, DefaultConstellationError,
};
use crate::instance::ConstellationInstance;
use constellation_core::{Background, ManualHost};
use std::ffi::CString;

/// Set the thread-local error message and code.
pub(crate) fn set_last_error(error: &impl ConstellationError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Track an error by setting it in thread-local storage and returning its code.
#[inline]
pub(crate) fn track_error(error: &impl ConstellationError) -> ConstellationErrorCode {
    set_last_error(error);
    error.code()
}

/// Record the error of a failed result and hand back its code.
///
/// Successful results clear the thread-local error.
pub(crate) fn track_result<T, E: ConstellationError>(
    result: Result<T, E>,
) -> Result<T, ConstellationErrorCode> {
    match result {
        Ok(value) => {
            clear_last_error();
            Ok(value)
        }
        Err(error) => Err(track_error(&error)),
    }
}

/// Run `f` and collapse its outcome into an error code.
pub(crate) fn handle_ffi_result_error<F>(f: F) -> ConstellationErrorCode
where
    F: FnOnce() -> Result<(), DefaultConstellationError>,
{
    match track_result(f()) {
        Ok(()) => ConstellationErrorCode::Ok,
        Err(code) => code,
    }
}

/// Clear the thread-local error message and code.
pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = ConstellationErrorCode::Ok;
    });
}

/// Borrow an instance from a raw pointer, rejecting null.
pub(crate) fn instance_from_ptr<'a>(
    ptr: *const ConstellationInstance,
) -> Result<&'a ConstellationInstance, DefaultConstellationError> {
    // SAFETY: callers guarantee a non-null `ptr` came from `constellation_mount`
    // and has not been passed to `constellation_unmount`.
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultConstellationError::null_pointer("instance"))
}

/// Lock the background of `instance` and run `f` on it.
pub(crate) fn with_background_mut<F, T>(
    instance: &ConstellationInstance,
    f: F,
) -> Result<T, DefaultConstellationError>
where
    F: FnOnce(&mut Background<ManualHost>) -> T,
{
    let mut background = instance
        .background
        .lock()
        .map_err(|_| DefaultConstellationError::lock_poisoned("Mutex"))?;
    Ok(f(&mut background))
}
