//! Error types for configuration validation and surface creation.
//!
//! Steady-state operation has no error path: stepping, graph building and
//! packing cannot fail on validated, fixed-size state. Errors only surface
//! when a configuration is rejected up front or when the rendering surface
//! cannot be created at mount time (which the lifecycle downgrades to a
//! logged warning).

use std::fmt;

/// A rejected [`FieldConfig`](crate::FieldConfig) value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A count or size that must be at least one is zero.
    Empty { field: &'static str },
    /// A value that must be finite and strictly positive is not.
    NotPositive { field: &'static str, value: f32 },
    /// A factor outside its allowed interval.
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    /// Speed limits are not ordered `min_speed <= initial_speed <= max_speed`.
    SpeedOrdering { min: f32, initial: f32, max: f32 },
}

impl ConfigError {
    /// Name of the offending configuration field.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::Empty { field }
            | Self::NotPositive { field, .. }
            | Self::OutOfRange { field, .. } => field,
            Self::SpeedOrdering { .. } => "initial_speed",
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty { field } => write!(f, "Config field {field}: must be at least 1"),
            Self::NotPositive { field, value } => {
                write!(f, "Config field {field}: must be finite and positive, got {value}")
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                f,
                "Config field {field}: must be within ({min}, {max}], got {value}"
            ),
            Self::SpeedOrdering { min, initial, max } => write!(
                f,
                "Speed limits must satisfy min <= initial <= max, got {min} / {initial} / {max}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Why a rendering surface could not be brought up.
///
/// The distinction matters for logging: "no adapter" is expected on headless
/// machines, a device or surface failure on a machine that has a GPU might
/// indicate a driver issue worth reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// Crate built without the `gpu` feature.
    FeatureDisabled,
    /// No compatible adapter was found.
    NoAdapter,
    /// An adapter exists but device creation failed.
    DeviceFailed { adapter_name: String, error: String },
    /// The window handle could not be turned into a presentable surface.
    SurfaceCreation(String),
    /// The surface exposes no configuration usable with the adapter.
    UnsupportedFormat { adapter_name: String },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeatureDisabled => write!(f, "GPU feature disabled at build time"),
            Self::NoAdapter => write!(f, "No compatible GPU adapter found"),
            Self::DeviceFailed {
                adapter_name,
                error,
            } => write!(f, "GPU '{adapter_name}' found but device creation failed: {error}"),
            Self::SurfaceCreation(error) => write!(f, "Failed to create rendering surface: {error}"),
            Self::UnsupportedFormat { adapter_name } => {
                write!(f, "Surface is not supported by GPU '{adapter_name}'")
            }
        }
    }
}

impl std::error::Error for SurfaceError {}
