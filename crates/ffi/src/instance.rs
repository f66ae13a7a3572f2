use constellation_core::{Background, FieldConfig, ManualHost, SurfaceHandle};
use std::ptr;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::config::ConstellationConfig;
use crate::error::{ConstellationErrorCode, DefaultConstellationError};
use crate::helpers::{track_error, track_result};

/// One mounted constellation background.
///
/// The host owns the display loop: it calls `constellation_tick` once per
/// refresh and draws the vertex arrays exposed by `constellation_frame`.
/// Nothing is rendered on the Rust side.
///
/// # Thread Safety
/// The background is protected by a `Mutex`, so every entry point may be
/// called from any thread. Pointers returned by `constellation_frame` are
/// only valid until the next call that mutates the instance.
///
/// # Usage
/// ```cpp
/// ConstellationConfig config;
/// constellation_default_config(&config);
///
/// ConstellationInstance* bg = nullptr;
/// if (constellation_mount(&config, 1280, 720, &bg) != ConstellationErrorCode::Ok) {
///     return;
/// }
///
/// // Every display refresh
/// ConstellationFrameStats stats;
/// constellation_tick(bg, seconds_since_start, &stats);
/// ConstellationFrameView view;
/// constellation_frame(bg, &view);
/// draw_points(view.particles, view.particle_count);
/// draw_lines(view.edge_vertices, view.edge_vertex_count);
///
/// // Teardown
/// constellation_unmount(bg);
/// ```
pub struct ConstellationInstance {
    pub(crate) background: Mutex<Background<ManualHost>>,
}

impl ConstellationInstance {
    /// Validate `config` and mount a headless background of the given size.
    pub(crate) fn new(
        config: FieldConfig,
        width: u32,
        height: u32,
    ) -> Result<Box<Self>, DefaultConstellationError> {
        let mut background = Background::new(config, ManualHost::new())
            .map_err(|e| DefaultConstellationError::invalid_config(&e))?;
        background.mount(SurfaceHandle::Headless { width, height });

        Ok(Box::new(Self {
            background: Mutex::new(background),
        }))
    }
}

/// Create and mount a background, returning it via out-parameter.
///
/// Parameters
/// - `config`: tunables, or null for the medium density defaults.
/// - `width`, `height`: logical viewport size. Zero is accepted; pointer
///   input is ignored until the first non-zero `constellation_resize`.
/// - `out_instance`: receives the instance, or null on failure.
///
/// Returns
/// - `ConstellationErrorCode::Ok` on success
/// - `ConstellationErrorCode::NullPointer` if `out_instance` is null
/// - `ConstellationErrorCode::InvalidConfig` if validation rejects `config`
///
/// # Safety
/// - `config` must be null or point to a valid `ConstellationConfig`.
/// - `out_instance` must be a valid, non-null pointer to writable memory.
/// - The caller owns the returned instance and MUST release it with
///   `constellation_unmount` exactly once.
#[no_mangle]
pub unsafe extern "C" fn constellation_mount(
    config: *const ConstellationConfig,
    width: u32,
    height: u32,
    out_instance: *mut *mut ConstellationInstance,
) -> ConstellationErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultConstellationError::null_pointer("out_instance"));
    }

    // SAFETY: `config` is either null or valid per the contract above.
    let config = unsafe { config.as_ref() }.map_or_else(FieldConfig::default, FieldConfig::from);

    match track_result(ConstellationInstance::new(config, width, height)) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            ConstellationErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                *out_instance = ptr::null_mut();
            }
            code
        }
    }
}

/// Unmount and free an instance created by `constellation_mount`.
///
/// Cancels the pending frame, drops listeners and releases every buffer.
/// A null `ptr` is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `constellation_mount`.
/// - The pointer MUST NOT be used again after this call.
#[no_mangle]
pub unsafe extern "C" fn constellation_unmount(ptr: *mut ConstellationInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: `ptr` came from `Box::into_raw` in `constellation_mount` and has
    // not been freed.
    let instance = unsafe { Box::from_raw(ptr) };
    let mut background = instance
        .background
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    background.unmount();
    debug!("Instance unmounted and freed");
}
