use constellation_core::{Color, DensityPreset, FieldConfig, Vec3};
use std::ptr;

use crate::error::{ConstellationErrorCode, DefaultConstellationError};
use crate::helpers::track_error;

/// C-compatible mirror of the background tunables.
///
/// Colours are packed `0xRRGGBB`. Fill one with `constellation_default_config`
/// and override only what you need.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstellationConfig {
    pub particle_count: u32,
    pub bounds_x: f32,
    pub bounds_y: f32,
    pub bounds_z: f32,
    pub min_speed: f32,
    pub initial_speed: f32,
    pub max_speed: f32,
    pub connection_distance: f32,
    pub connection_capacity: u32,
    pub particle_size: f32,
    pub influence_radius: f32,
    pub influence_gain: f32,
    pub damping: f32,
    pub decay: f32,
    pub smoothing: f32,
    pub camera_distance: f32,
    pub camera_follow: f32,
    pub camera_parallax: f32,
    pub base_color: u32,
    pub accent_color: u32,
    pub background_color: u32,
    pub pointer_controls: bool,
    pub touch_controls: bool,
    pub min_width: u32,
    pub min_height: u32,
    pub resolution_scale: f32,
    pub mobile_resolution_scale: f32,
    /// Use `seed` for a reproducible layout instead of entropy.
    pub use_seed: bool,
    pub seed: u64,
}

/// Preset selector for `constellation_preset_config`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstellationDensity {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl From<ConstellationDensity> for DensityPreset {
    fn from(density: ConstellationDensity) -> Self {
        match density {
            ConstellationDensity::Low => Self::Low,
            ConstellationDensity::Medium => Self::Medium,
            ConstellationDensity::High => Self::High,
        }
    }
}

impl From<&FieldConfig> for ConstellationConfig {
    fn from(config: &FieldConfig) -> Self {
        Self {
            particle_count: u32::try_from(config.particle_count).unwrap_or(u32::MAX),
            bounds_x: config.bounds.x,
            bounds_y: config.bounds.y,
            bounds_z: config.bounds.z,
            min_speed: config.min_speed,
            initial_speed: config.initial_speed,
            max_speed: config.max_speed,
            connection_distance: config.connection_distance,
            connection_capacity: u32::try_from(config.connection_capacity).unwrap_or(u32::MAX),
            particle_size: config.particle_size,
            influence_radius: config.influence_radius,
            influence_gain: config.influence_gain,
            damping: config.damping,
            decay: config.decay,
            smoothing: config.smoothing,
            camera_distance: config.camera_distance,
            camera_follow: config.camera_follow,
            camera_parallax: config.camera_parallax,
            base_color: config.base_color.to_hex(),
            accent_color: config.accent_color.to_hex(),
            background_color: config.background_color.to_hex(),
            pointer_controls: config.pointer_controls,
            touch_controls: config.touch_controls,
            min_width: config.min_width,
            min_height: config.min_height,
            resolution_scale: config.resolution_scale,
            mobile_resolution_scale: config.mobile_resolution_scale,
            use_seed: config.seed.is_some(),
            seed: config.seed.unwrap_or(0),
        }
    }
}

impl From<&ConstellationConfig> for FieldConfig {
    fn from(config: &ConstellationConfig) -> Self {
        Self {
            particle_count: config.particle_count as usize,
            bounds: Vec3::new(config.bounds_x, config.bounds_y, config.bounds_z),
            min_speed: config.min_speed,
            initial_speed: config.initial_speed,
            max_speed: config.max_speed,
            connection_distance: config.connection_distance,
            connection_capacity: config.connection_capacity as usize,
            particle_size: config.particle_size,
            influence_radius: config.influence_radius,
            influence_gain: config.influence_gain,
            damping: config.damping,
            decay: config.decay,
            smoothing: config.smoothing,
            camera_distance: config.camera_distance,
            camera_follow: config.camera_follow,
            camera_parallax: config.camera_parallax,
            base_color: Color::from_hex(config.base_color),
            accent_color: Color::from_hex(config.accent_color),
            background_color: Color::from_hex(config.background_color),
            pointer_controls: config.pointer_controls,
            touch_controls: config.touch_controls,
            min_width: config.min_width,
            min_height: config.min_height,
            resolution_scale: config.resolution_scale,
            mobile_resolution_scale: config.mobile_resolution_scale,
            seed: config.use_seed.then_some(config.seed),
        }
    }
}

/// Fill `out_config` with the medium density defaults.
///
/// # Safety
/// `out_config` must be null or point to writable memory for one
/// `ConstellationConfig`.
#[no_mangle]
pub unsafe extern "C" fn constellation_default_config(
    out_config: *mut ConstellationConfig,
) -> ConstellationErrorCode {
    unsafe { constellation_preset_config(ConstellationDensity::Medium, out_config) }
}

/// Fill `out_config` with the defaults of a density preset.
///
/// # Safety
/// `out_config` must be null or point to writable memory for one
/// `ConstellationConfig`.
#[no_mangle]
pub unsafe extern "C" fn constellation_preset_config(
    density: ConstellationDensity,
    out_config: *mut ConstellationConfig,
) -> ConstellationErrorCode {
    if out_config.is_null() {
        return track_error(&DefaultConstellationError::null_pointer("out_config"));
    }

    let config = FieldConfig::from_preset(density.into());
    unsafe {
        ptr::write(out_config, ConstellationConfig::from(&config));
    }
    ConstellationErrorCode::Ok
}
