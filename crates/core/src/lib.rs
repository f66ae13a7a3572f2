//! Constellation Core Library
//!
//! An animated particle-network background: a field of drifting points
//! whose pairwise proximity defines a connection graph that is rebuilt every
//! frame, rendered through wgpu and nudged by pointer input.
//!
//! ## Frame pipeline
//!
//! Each host refresh runs, in order:
//! - advance the interaction field (smoothed pointer point, decaying strength)
//! - step particles with attraction toward the influence point
//! - rebuild the proximity edge set (brute force, or a grid index at high N)
//! - repack the fixed-capacity frame buffers
//! - ease the camera and draw
//!
//! [`Background`] owns all of it for one mount point.

// Core types and utilities
pub mod core_types;

pub mod config;
pub mod error;

// Simulation
pub mod graph;
pub mod interaction;
pub mod particles;

// Presentation and lifecycle
pub mod camera;
pub mod frame;
pub mod host;
pub mod lifecycle;
pub mod profiler;
pub mod render;

// Re-export core types
pub use core_types::{Color, Vec3};

pub use config::{DensityPreset, FieldConfig};
pub use error::{ConfigError, SurfaceError};

pub use graph::{build_edges, Edge, EdgeSet, EdgeStrategy, ProximityGraph, ProximityGrid};
pub use interaction::{Influence, InteractionField};
pub use particles::{ParticleStore, StepParams};

pub use camera::Camera;
pub use frame::{EdgeVertex, FrameBuffers, Palette, ParticleVertex};
pub use host::{FrameRequest, Host, ListenerId, ListenerKind, ManualHost};
pub use lifecycle::{Background, FrameStats, LifecycleState};
pub use render::{RenderBackend, ResourceLedger, SurfaceHandle};
