//! C ABI for embedding a constellation background in a host display loop.
//!
//! The host mounts an instance, calls `constellation_tick` once per refresh
//! and draws the packed vertex arrays itself. Every function returns a
//! [`ConstellationErrorCode`]; details of the last failure on the calling
//! thread are available from `constellation_get_last_error`.

mod config;
mod error;
mod frame;
mod helpers;
mod instance;

pub use config::{
    constellation_default_config, constellation_preset_config, ConstellationConfig,
    ConstellationDensity,
};
pub use error::{
    constellation_get_last_error, constellation_get_last_error_code, ConstellationErrorCode,
};
pub use frame::{
    constellation_frame, constellation_pointer_leave, constellation_pointer_move,
    constellation_resize, constellation_stop, constellation_tick, constellation_touch_move,
    ConstellationFrameStats, ConstellationFrameView, CONSTELLATION_VERTEX_STRIDE,
};
pub use instance::{constellation_mount, constellation_unmount, ConstellationInstance};
