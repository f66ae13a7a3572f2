use constellation_core::ConfigError;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Common interface for FFI error types.
///
/// - `code()` is what crosses the FFI boundary
/// - `msg()` is kept in thread-local storage for diagnostics
pub(crate) trait ConstellationError {
    fn code(&self) -> ConstellationErrorCode;

    fn msg(&self) -> &str;
}

/// Default implementation of `ConstellationError` for the FFI surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultConstellationError {
    code: ConstellationErrorCode,
    msg: String,
}

impl DefaultConstellationError {
    /// Create error for null pointer passed where non-null required.
    ///
    /// # Arguments
    /// * `param_name` - The name of the parameter that was null (e.g., `"out_instance"`, `"ptr"`)
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: ConstellationErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// Create error for poisoned lock.
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: ConstellationErrorCode::LockPoisoned,
            msg: format!("Lock '{lock_name}' was poisoned by a panic in another thread"),
        }
    }

    /// Create error for a configuration rejected by validation.
    pub fn invalid_config(error: &ConfigError) -> Self {
        Self {
            code: ConstellationErrorCode::InvalidConfig,
            msg: error.to_string(),
        }
    }

    pub fn invalid_parameter(message: String) -> Self {
        Self {
            code: ConstellationErrorCode::InvalidParameter,
            msg: message,
        }
    }
}

impl ConstellationError for DefaultConstellationError {
    fn code(&self) -> ConstellationErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

/// FFI error codes returned by constellation functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstellationErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Invalid pointer: null pointer passed where non-null required.
    NullPointer = 1,

    /// Lock poisoned: the instance mutex was poisoned by a panic.
    LockPoisoned = 2,

    /// Configuration failed validation (empty field, bad range, speed ordering).
    InvalidConfig = 3,

    /// Invalid parameter passed to function.
    InvalidParameter = 4,
}

impl From<DefaultConstellationError> for ConstellationErrorCode {
    fn from(error: DefaultConstellationError) -> Self {
        error.code
    }
}

thread_local! {
    /// Most recent FFI error on this thread (C string, error code).
    static LAST_ERROR: RefCell<(Option<CString>, ConstellationErrorCode)> =
        const { RefCell::new((None, ConstellationErrorCode::Ok)) };
}

pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, ConstellationErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, ConstellationErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns:
/// - A borrowed pointer to the error message if an error occurred.
/// - `null` if no error has occurred on this thread.
///
/// # Lifetime
/// The returned pointer is valid until the next FFI call on this thread that
/// sets or clears the error.
///
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// ConstellationInstance* bg = nullptr;
/// ConstellationErrorCode err = constellation_mount(&config, 800, 600, &bg);
/// if (err != ConstellationErrorCode::Ok) {
///     const char* error = constellation_get_last_error();
///     if (error) {
///         printf("Mount failed: %s\n", error);
///     }
/// }
/// ```
#[no_mangle]
pub extern "C" fn constellation_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code.
///
/// Returns `ConstellationErrorCode::Ok` (0) if no error has occurred on this
/// thread.
#[no_mangle]
pub extern "C" fn constellation_get_last_error_code() -> ConstellationErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
