//! Field configuration and density presets
//!
//! Every tunable here changes visual density or cost only; none of them
//! affects the correctness of the simulation, graph or lifecycle contracts.
//! Values are validated once when a [`Background`](crate::Background) is
//! created, never per frame.

use crate::core_types::{Color, Vec3};
use crate::error::ConfigError;
use crate::graph::SPATIAL_INDEX_THRESHOLD;
use serde::{Deserialize, Serialize};

/// Matcha green used as the default particle colour.
pub const DEFAULT_BASE_COLOR: u32 = 0x5a9e4d;
/// Pale highlight used for strong connections and attracted particles.
pub const DEFAULT_ACCENT_COLOR: u32 = 0xc8e6a0;
/// Near-black clear colour.
pub const DEFAULT_BACKGROUND_COLOR: u32 = 0x0b130a;

/// Tunables for one background instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Number of particles N, fixed for the lifetime of a mount.
    pub particle_count: usize,
    /// Half extents of the box particles live in (world units).
    pub bounds: Vec3,
    /// Speed floor applied after damping so ambient drift never dies out.
    pub min_speed: f32,
    /// Upper end of the initial speed range (world units per tick).
    pub initial_speed: f32,
    /// Hard speed cap applied after influence impulses.
    pub max_speed: f32,
    /// Pairs closer than this are connected.
    pub connection_distance: f32,
    /// Maximum number of connections drawn per frame.
    pub connection_capacity: usize,
    /// Rendered particle diameter in pixels.
    pub particle_size: f32,
    /// Particles within this distance of the influence point are attracted.
    pub influence_radius: f32,
    /// Impulse gain at the influence point with full strength.
    pub influence_gain: f32,
    /// Per-tick velocity multiplier, `0 < damping <= 1`.
    pub damping: f32,
    /// Per-tick interaction strength multiplier, `0 < decay < 1`.
    pub decay: f32,
    /// Fraction of the remaining gap the influence point closes per tick.
    pub smoothing: f32,
    /// Distance of the camera from the origin along +Z.
    pub camera_distance: f32,
    /// Fraction of the remaining gap the camera closes per tick.
    pub camera_follow: f32,
    /// How far the camera leans toward the influence point (0 = static).
    pub camera_parallax: f32,
    pub base_color: Color,
    pub accent_color: Color,
    pub background_color: Color,
    /// React to mouse/pen pointer movement.
    pub pointer_controls: bool,
    /// React to touch movement.
    pub touch_controls: bool,
    /// Non-zero viewports narrower than this are clamped up.
    pub min_width: u32,
    /// Non-zero viewports shorter than this are clamped up.
    pub min_height: u32,
    /// Multiplier applied to the surface pixel size.
    pub resolution_scale: f32,
    /// Replaces `resolution_scale` once touch input drives the viewport.
    pub mobile_resolution_scale: f32,
    /// Fixed seed for reproducible layouts; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        DensityPreset::Medium.config()
    }
}

/// Density presets trading connection richness for per-frame cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DensityPreset {
    /// ~80 particles, suited to low-power devices
    Low,
    /// ~150 particles, the reference configuration
    Medium,
    /// ~600 particles, switches to the grid-indexed graph build
    High,
}

impl DensityPreset {
    /// (particle count, connection distance, connection capacity)
    #[must_use]
    pub const fn density(&self) -> (usize, f32, usize) {
        match self {
            Self::Low => (80, 18.0, 600),
            Self::Medium => (150, 15.0, 1500),
            Self::High => (600, 11.0, 6000),
        }
    }

    #[must_use]
    pub fn config(&self) -> FieldConfig {
        let (particle_count, connection_distance, connection_capacity) = self.density();
        FieldConfig {
            particle_count,
            bounds: Vec3::new(80.0, 50.0, 40.0),
            min_speed: 0.05,
            initial_speed: 0.25,
            max_speed: 0.8,
            connection_distance,
            connection_capacity,
            particle_size: 3.0,
            influence_radius: 30.0,
            influence_gain: 0.02,
            damping: 0.98,
            decay: 0.95,
            smoothing: 0.1,
            camera_distance: 130.0,
            camera_follow: 0.05,
            camera_parallax: 0.3,
            base_color: Color::from_hex(DEFAULT_BASE_COLOR),
            accent_color: Color::from_hex(DEFAULT_ACCENT_COLOR),
            background_color: Color::from_hex(DEFAULT_BACKGROUND_COLOR),
            pointer_controls: true,
            touch_controls: true,
            min_width: 200,
            min_height: 200,
            resolution_scale: 1.0,
            mobile_resolution_scale: 1.0,
            seed: None,
        }
    }
}

impl FieldConfig {
    #[must_use]
    pub fn from_preset(preset: DensityPreset) -> Self {
        preset.config()
    }

    /// Whether the proximity graph should be built through the grid index.
    #[must_use]
    pub fn uses_spatial_index(&self) -> bool {
        self.particle_count > SPATIAL_INDEX_THRESHOLD
    }

    /// Check every tunable once, up front.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_count == 0 {
            return Err(ConfigError::Empty {
                field: "particle_count",
            });
        }
        if self.connection_capacity == 0 {
            return Err(ConfigError::Empty {
                field: "connection_capacity",
            });
        }

        positive("bounds.x", self.bounds.x)?;
        positive("bounds.y", self.bounds.y)?;
        positive("bounds.z", self.bounds.z)?;
        positive("connection_distance", self.connection_distance)?;
        positive("particle_size", self.particle_size)?;
        positive("influence_radius", self.influence_radius)?;
        positive("camera_distance", self.camera_distance)?;
        positive("resolution_scale", self.resolution_scale)?;
        positive("mobile_resolution_scale", self.mobile_resolution_scale)?;
        positive("max_speed", self.max_speed)?;

        if !self.influence_gain.is_finite() || self.influence_gain < 0.0 {
            return Err(ConfigError::NotPositive {
                field: "influence_gain",
                value: self.influence_gain,
            });
        }
        let ordered = (0.0..=self.initial_speed).contains(&self.min_speed)
            && self.initial_speed <= self.max_speed;
        if !ordered {
            return Err(ConfigError::SpeedOrdering {
                min: self.min_speed,
                initial: self.initial_speed,
                max: self.max_speed,
            });
        }

        unit_factor("damping", self.damping, true)?;
        unit_factor("decay", self.decay, false)?;
        unit_factor("smoothing", self.smoothing, true)?;
        unit_factor("camera_follow", self.camera_follow, true)?;

        if !(0.0..=1.0).contains(&self.camera_parallax) {
            return Err(ConfigError::OutOfRange {
                field: "camera_parallax",
                value: self.camera_parallax,
                min: 0.0,
                max: 1.0,
            });
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// `0 < value < 1`, or `0 < value <= 1` when `inclusive`.
fn unit_factor(field: &'static str, value: f32, inclusive: bool) -> Result<(), ConfigError> {
    let upper_ok = if inclusive { value <= 1.0 } else { value < 1.0 };
    if value > 0.0 && upper_ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: 1.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in [DensityPreset::Low, DensityPreset::Medium, DensityPreset::High] {
            assert!(preset.config().validate().is_ok(), "{preset:?} should validate");
        }
    }

    #[test]
    fn test_default_is_reference_density() {
        let config = FieldConfig::default();
        assert_eq!(config.particle_count, 150);
        assert_eq!(config.base_color.to_hex(), DEFAULT_BASE_COLOR);
        assert!(!config.uses_spatial_index());
        assert!(FieldConfig::from_preset(DensityPreset::High).uses_spatial_index());
    }

    #[test]
    fn test_rejects_zero_particles() {
        let config = FieldConfig {
            particle_count: 0,
            ..FieldConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Empty {
                field: "particle_count"
            })
        );
    }

    #[test]
    fn test_rejects_non_decaying_strength() {
        let config = FieldConfig {
            decay: 1.0,
            ..FieldConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), "decay");
    }

    #[test]
    fn test_rejects_nan_distance() {
        let config = FieldConfig {
            connection_distance: f32::NAN,
            ..FieldConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().field(), "connection_distance");
    }

    #[test]
    fn test_rejects_zero_mobile_scale() {
        let config = FieldConfig {
            mobile_resolution_scale: 0.0,
            ..FieldConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.field(), "mobile_resolution_scale");
    }

    #[test]
    fn test_rejects_unordered_speeds() {
        let config = FieldConfig {
            min_speed: 1.0,
            initial_speed: 0.5,
            ..FieldConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SpeedOrdering { .. })
        ));
    }
}
