//! Render binding
//!
//! Owns the rendering target and the GPU mirrors of the frame buffers. The
//! backend is picked at mount time:
//! 1. A window or offscreen handle tries the GPU (if the `gpu` feature is
//!    enabled and an adapter is available).
//! 2. A headless handle keeps everything on the CPU; the host reads the
//!    packed frame buffers and draws them itself.
//!
//! A GPU handle that cannot be brought up is reported as a [`SurfaceError`]
//! and the lifecycle falls back to rendering nothing.

mod context;
mod ledger;
#[cfg(feature = "gpu")]
mod renderer;

pub use context::GpuInitResult;
pub use ledger::ResourceLedger;

#[cfg(feature = "gpu")]
pub use context::GpuContext;
#[cfg(feature = "gpu")]
pub use renderer::GpuRenderer;

use crate::core_types::Color;
use crate::error::SurfaceError;
use crate::frame::FrameBuffers;
use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;
use tracing::{debug, info};

/// Labels under which resources are recorded in the [`ResourceLedger`].
pub mod labels {
    pub const DEVICE: &str = "gpu device";
    pub const SURFACE: &str = "surface";
    pub const PARTICLE_BUFFER: &str = "particle vertex buffer";
    pub const EDGE_BUFFER: &str = "edge vertex buffer";
    pub const UNIFORM_BUFFER: &str = "uniform buffer";
    pub const BIND_GROUP: &str = "uniform bind group";
    pub const PARTICLE_PIPELINE: &str = "particle pipeline";
    pub const EDGE_PIPELINE: &str = "edge pipeline";
    pub const FRAME_BUFFERS: &str = "cpu frame buffers";

    /// Everything a GPU renderer owns, in creation order.
    pub const GPU_RESOURCES: [&str; 8] = [
        DEVICE,
        SURFACE,
        PARTICLE_BUFFER,
        EDGE_BUFFER,
        UNIFORM_BUFFER,
        BIND_GROUP,
        PARTICLE_PIPELINE,
        EDGE_PIPELINE,
    ];
}

/// Opaque drawable surface supplied by the host at mount.
pub enum SurfaceHandle {
    /// No GPU target: frames are packed on the CPU for the host to draw.
    Headless { width: u32, height: u32 },
    /// Render into an offscreen texture (tests, capture).
    Offscreen { width: u32, height: u32 },
    /// Present to a native window.
    #[cfg(feature = "gpu")]
    Window {
        window: Box<dyn wgpu::WindowHandle>,
        width: u32,
        height: u32,
    },
}

impl SurfaceHandle {
    /// Pixel size the host reported for this surface.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Headless { width, height } | Self::Offscreen { width, height } => {
                (*width, *height)
            }
            #[cfg(feature = "gpu")]
            Self::Window { width, height, .. } => (*width, *height),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Headless { .. } => "headless",
            Self::Offscreen { .. } => "offscreen",
            #[cfg(feature = "gpu")]
            Self::Window { .. } => "window",
        }
    }

    /// Same handle reporting a different pixel size.
    #[must_use]
    pub fn with_size(self, width: u32, height: u32) -> Self {
        match self {
            Self::Headless { .. } => Self::Headless { width, height },
            Self::Offscreen { .. } => Self::Offscreen { width, height },
            #[cfg(feature = "gpu")]
            Self::Window { window, .. } => Self::Window {
                window,
                width,
                height,
            },
        }
    }
}

impl std::fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (width, height) = self.size();
        f.debug_struct("SurfaceHandle")
            .field("kind", &self.kind())
            .field("width", &width)
            .field("height", &height)
            .finish()
    }
}

/// Fixed parameters for creating a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    pub particle_capacity: usize,
    pub edge_capacity: usize,
    pub particle_size: f32,
    pub background: Color,
}

/// Per-frame values written to the uniform block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub view_proj: Matrix4<f32>,
    /// Surface size in physical pixels.
    pub viewport: (f32, f32),
    pub particle_size: f32,
    /// Seconds since the loop started.
    pub time: f32,
}

/// Uniform block layout shared with the shader (80 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Uniforms {
    pub view_proj: [[f32; 4]; 4],
    pub viewport: [f32; 2],
    pub particle_size: f32,
    pub time: f32,
}

impl Uniforms {
    #[must_use]
    pub fn from_frame(frame: &FrameUniforms) -> Self {
        Self {
            view_proj: frame.view_proj.into(),
            viewport: [frame.viewport.0, frame.viewport.1],
            particle_size: frame.particle_size,
            time: frame.time,
        }
    }
}

/// Active rendering backend with CPU fallback.
#[derive(Debug)]
pub enum RenderBackend {
    #[cfg(feature = "gpu")]
    Gpu(Box<GpuRenderer>),
    /// Frames are packed but drawing is left to the host.
    Headless,
}

impl RenderBackend {
    /// Create the backend for `surface`, recording resources in `ledger`.
    pub fn create(
        surface: SurfaceHandle,
        settings: &RendererSettings,
        ledger: &mut ResourceLedger,
    ) -> Result<Self, SurfaceError> {
        match surface {
            SurfaceHandle::Headless { width, height } => {
                info!("Using headless backend ({}x{})", width, height);
                Ok(Self::Headless)
            }
            #[cfg(feature = "gpu")]
            gpu_surface => {
                let renderer = GpuRenderer::new(gpu_surface, settings, ledger)?;
                info!("Using GPU backend: {}", renderer.adapter_name());
                Ok(Self::Gpu(Box::new(renderer)))
            }
            #[cfg(not(feature = "gpu"))]
            SurfaceHandle::Offscreen { .. } => {
                let _ = (settings, ledger);
                Err(SurfaceError::FeatureDisabled)
            }
        }
    }

    #[must_use]
    pub fn is_gpu(&self) -> bool {
        !matches!(self, Self::Headless)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        match self {
            #[cfg(feature = "gpu")]
            Self::Gpu(renderer) => renderer.resize(width, height),
            Self::Headless => debug!("Headless backend resized to {}x{}", width, height),
        }
    }

    /// Upload the frame if dirty and draw it. Returns whether a frame was
    /// produced.
    pub fn present(&mut self, frame: &mut FrameBuffers, uniforms: &FrameUniforms) -> bool {
        match self {
            #[cfg(feature = "gpu")]
            Self::Gpu(renderer) => {
                renderer.upload(frame);
                renderer.draw(uniforms)
            }
            Self::Headless => {
                let _ = uniforms;
                // The host reads the packed buffers directly
                frame.mark_uploaded();
                true
            }
        }
    }

    /// Dispose of every resource this backend created.
    pub fn release(self, ledger: &mut ResourceLedger) {
        match self {
            #[cfg(feature = "gpu")]
            Self::Gpu(renderer) => renderer.release(ledger),
            Self::Headless => debug!(
                "Headless backend released, {} resources still live",
                ledger.live().len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;
    use crate::graph::build_edges;
    use crate::interaction::Influence;
    use crate::particles::ParticleStore;
    use crate::frame::Palette;

    fn settings() -> RendererSettings {
        RendererSettings {
            particle_capacity: 4,
            edge_capacity: 4,
            particle_size: 3.0,
            background: Color::BLACK,
        }
    }

    #[test]
    fn test_uniform_block_layout() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 80);
        let raw = Uniforms::from_frame(&FrameUniforms {
            view_proj: Matrix4::identity(),
            viewport: (800.0, 600.0),
            particle_size: 3.0,
            time: 1.5,
        });
        assert_eq!(raw.view_proj[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(raw.viewport, [800.0, 600.0]);
    }

    #[test]
    fn test_headless_backend_consumes_frames() {
        let mut ledger = ResourceLedger::new();
        let mut backend = RenderBackend::create(
            SurfaceHandle::Headless {
                width: 800,
                height: 600,
            },
            &settings(),
            &mut ledger,
        )
        .unwrap();
        assert!(!backend.is_gpu());

        let store = ParticleStore::from_positions(
            vec![Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)],
            Vec3::new(10.0, 10.0, 10.0),
        );
        let edges = build_edges(store.positions(), 5.0, 4);
        let mut frame = FrameBuffers::with_capacity(4, 4);
        let palette = Palette {
            base: Color::WHITE,
            accent: Color::WHITE,
            highlight_radius: 1.0,
        };
        frame.pack(&store, &edges, &Influence::default(), &palette);

        let uniforms = FrameUniforms {
            view_proj: Matrix4::identity(),
            viewport: (800.0, 600.0),
            particle_size: 3.0,
            time: 0.0,
        };
        assert!(backend.present(&mut frame, &uniforms));
        assert!(!frame.is_dirty());
        assert_eq!(frame.edge_draw_range(), 2);

        backend.release(&mut ledger);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_surface_handle_resizes() {
        let handle = SurfaceHandle::Offscreen {
            width: 10,
            height: 20,
        }
        .with_size(30, 40);
        assert_eq!(handle.size(), (30, 40));
        assert!(format!("{handle:?}").contains("offscreen"));
    }
}
