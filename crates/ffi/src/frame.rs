use constellation_core::{FrameStats, ListenerKind};
use std::ptr;
use std::time::Duration;

use crate::error::{ConstellationErrorCode, DefaultConstellationError};
use crate::helpers::{handle_ffi_result_error, instance_from_ptr, with_background_mut};
use crate::instance::ConstellationInstance;

/// Floats per vertex in both arrays: position xyz followed by colour rgb.
pub const CONSTELLATION_VERTEX_STRIDE: u32 = 6;

/// Per-frame statistics written by `constellation_tick`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConstellationFrameStats {
    /// False when the background was not running and nothing advanced.
    pub ran: bool,
    pub frame: u64,
    /// Seconds since the first tick.
    pub elapsed_seconds: f64,
    pub particles: u32,
    pub edges: u32,
    /// The connection cap truncated this frame's edge set.
    pub saturated: bool,
    /// Edge rebuild time in milliseconds.
    pub build_time_ms: f64,
    /// Interaction strength in `0..=1`.
    pub strength: f32,
}

impl From<&FrameStats> for ConstellationFrameStats {
    fn from(stats: &FrameStats) -> Self {
        Self {
            ran: true,
            frame: stats.frame,
            elapsed_seconds: stats.elapsed.as_secs_f64(),
            particles: u32::try_from(stats.particles).unwrap_or(u32::MAX),
            edges: u32::try_from(stats.edges).unwrap_or(u32::MAX),
            saturated: stats.saturated,
            build_time_ms: stats.build_time.as_secs_f64() * 1000.0,
            strength: stats.strength,
        }
    }
}

/// Borrowed view of the packed vertex arrays.
///
/// Both arrays hold `CONSTELLATION_VERTEX_STRIDE` floats per vertex. The edge
/// array is a line list: vertices `2k` and `2k + 1` are one connection.
/// Pointers stay valid until the next tick, resize or unmount.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstellationFrameView {
    pub particles: *const f32,
    pub particle_count: u32,
    pub edge_vertices: *const f32,
    pub edge_vertex_count: u32,
    pub stride: u32,
}

impl Default for ConstellationFrameView {
    fn default() -> Self {
        Self {
            particles: ptr::null(),
            particle_count: 0,
            edge_vertices: ptr::null(),
            edge_vertex_count: 0,
            stride: CONSTELLATION_VERTEX_STRIDE,
        }
    }
}

/// Advance one frame at the host timestamp `now_seconds`.
///
/// `out_stats` may be null. When the background is stopped or degraded the
/// call succeeds with `ran == false`.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `constellation_mount`.
/// - `out_stats` must be null or point to writable memory.
#[no_mangle]
pub unsafe extern "C" fn constellation_tick(
    ptr: *const ConstellationInstance,
    now_seconds: f64,
    out_stats: *mut ConstellationFrameStats,
) -> ConstellationErrorCode {
    handle_ffi_result_error(|| {
        let now = Duration::try_from_secs_f64(now_seconds).map_err(|_| {
            DefaultConstellationError::invalid_parameter(format!(
                "now_seconds must be finite and non-negative, got {now_seconds}"
            ))
        })?;
        let instance = instance_from_ptr(ptr)?;

        let stats = with_background_mut(instance, |bg| {
            // This call is the refresh the pending request asked for
            bg.host_mut().take_frame();
            bg.tick(now)
        })?;

        if !out_stats.is_null() {
            let stats = stats.as_ref().map_or_else(
                ConstellationFrameStats::default,
                ConstellationFrameStats::from,
            );
            unsafe {
                ptr::write(out_stats, stats);
            }
        }
        Ok(())
    })
}

/// Expose the most recently packed vertex arrays.
///
/// An instance that is not mounted, or whose surface failed, yields null
/// arrays with zero counts.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by `constellation_mount`.
/// - `out_view` must be a valid, non-null pointer to writable memory.
#[no_mangle]
pub unsafe extern "C" fn constellation_frame(
    ptr: *const ConstellationInstance,
    out_view: *mut ConstellationFrameView,
) -> ConstellationErrorCode {
    handle_ffi_result_error(|| {
        if out_view.is_null() {
            return Err(DefaultConstellationError::null_pointer("out_view"));
        }
        let instance = instance_from_ptr(ptr)?;

        let view = with_background_mut(instance, |bg| {
            bg.frame_buffers()
                .map_or_else(ConstellationFrameView::default, |frame| {
                    ConstellationFrameView {
                        particles: frame.particle_vertices().as_ptr().cast::<f32>(),
                        particle_count: frame.particle_draw_range(),
                        edge_vertices: frame.edge_vertices().as_ptr().cast::<f32>(),
                        edge_vertex_count: frame.edge_draw_range(),
                        stride: CONSTELLATION_VERTEX_STRIDE,
                    }
                })
        })?;

        unsafe {
            ptr::write(out_view, view);
        }
        Ok(())
    })
}

/// Report a new logical viewport size. Zero sizes are ignored.
///
/// # Safety
/// `ptr` must be a valid pointer returned by `constellation_mount`.
#[no_mangle]
pub unsafe extern "C" fn constellation_resize(
    ptr: *const ConstellationInstance,
    width: u32,
    height: u32,
) -> ConstellationErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_background_mut(instance, |bg| {
            if bg.host().is_listening(ListenerKind::Resize) {
                bg.on_resize(width, height);
            }
        })
    })
}

/// Feed a mouse or pen position in viewport pixels.
///
/// # Safety
/// `ptr` must be a valid pointer returned by `constellation_mount`.
#[no_mangle]
pub unsafe extern "C" fn constellation_pointer_move(
    ptr: *const ConstellationInstance,
    x: f32,
    y: f32,
) -> ConstellationErrorCode {
    dispatch_pointer(ptr, ListenerKind::PointerMove, x, y)
}

/// Feed a touch position in viewport pixels.
///
/// # Safety
/// `ptr` must be a valid pointer returned by `constellation_mount`.
#[no_mangle]
pub unsafe extern "C" fn constellation_touch_move(
    ptr: *const ConstellationInstance,
    x: f32,
    y: f32,
) -> ConstellationErrorCode {
    dispatch_pointer(ptr, ListenerKind::TouchMove, x, y)
}

/// The pointer left the viewport; interaction starts decaying.
///
/// # Safety
/// `ptr` must be a valid pointer returned by `constellation_mount`.
#[no_mangle]
pub unsafe extern "C" fn constellation_pointer_leave(
    ptr: *const ConstellationInstance,
) -> ConstellationErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_background_mut(instance, |bg| {
            if bg.host().is_listening(ListenerKind::PointerLeave) {
                bg.on_pointer_leave();
            }
        })
    })
}

/// Stop the loop. The instance keeps its buffers until unmounted.
///
/// # Safety
/// `ptr` must be a valid pointer returned by `constellation_mount`.
#[no_mangle]
pub unsafe extern "C" fn constellation_stop(
    ptr: *const ConstellationInstance,
) -> ConstellationErrorCode {
    handle_ffi_result_error(|| {
        let instance = instance_from_ptr(ptr)?;
        with_background_mut(instance, |bg| {
            bg.stop();
        })
    })
}

fn dispatch_pointer(
    ptr: *const ConstellationInstance,
    kind: ListenerKind,
    x: f32,
    y: f32,
) -> ConstellationErrorCode {
    handle_ffi_result_error(|| {
        if !x.is_finite() || !y.is_finite() {
            return Err(DefaultConstellationError::invalid_parameter(format!(
                "pointer position must be finite, got ({x}, {y})"
            )));
        }
        let instance = instance_from_ptr(ptr)?;
        with_background_mut(instance, |bg| {
            if !bg.host().is_listening(kind) {
                return;
            }
            match kind {
                ListenerKind::TouchMove => bg.on_touch_move(x, y),
                _ => bg.on_pointer_move(x, y),
            }
        })
    })
}
