//! wgpu renderer for the constellation
//!
//! Two pipelines share one uniform block: instanced particle quads and a line
//! list for edges. Vertex buffers are sized once from the frame buffer
//! capacities and are never reallocated; resizing only reconfigures the
//! target.

use super::{
    labels, FrameUniforms, RendererSettings, SurfaceHandle, Uniforms, ResourceLedger,
};
use crate::error::SurfaceError;
use crate::frame::{EdgeVertex, FrameBuffers, ParticleVertex};
use crate::render::context::GpuContext;
use tracing::{debug, info, trace};
use wgpu::util::DeviceExt;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Where frames end up.
enum RenderTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// GPU resources for one mounted background.
pub struct GpuRenderer {
    context: GpuContext,
    target: RenderTarget,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    clear_color: wgpu::Color,

    particle_pipeline: wgpu::RenderPipeline,
    edge_pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    particle_buffer: wgpu::Buffer,
    edge_buffer: wgpu::Buffer,

    particle_count: u32,
    edge_vertex_count: u32,
}

impl std::fmt::Debug for GpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRenderer")
            .field("adapter", &self.context.adapter_name())
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl GpuRenderer {
    /// Bring up the device, target, buffers and pipelines for `surface`.
    ///
    /// Every created resource is recorded in `ledger` once construction has
    /// succeeded; a failed construction records nothing.
    pub fn new(
        surface: SurfaceHandle,
        settings: &RendererSettings,
        ledger: &mut ResourceLedger,
    ) -> Result<Self, SurfaceError> {
        let (context, target, format, width, height) = match surface {
            SurfaceHandle::Headless { .. } => {
                return Err(SurfaceError::SurfaceCreation(
                    "headless handle has no GPU target".to_string(),
                ))
            }
            SurfaceHandle::Offscreen { width, height } => {
                let context = GpuContext::new().into_context()?;
                let (texture, view) =
                    create_offscreen_target(context.device(), width.max(1), height.max(1));
                (
                    context,
                    RenderTarget::Offscreen { texture, view },
                    OFFSCREEN_FORMAT,
                    width.max(1),
                    height.max(1),
                )
            }
            SurfaceHandle::Window {
                window,
                width,
                height,
            } => {
                let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
                    backends: wgpu::Backends::all(),
                    ..Default::default()
                });
                let surface = instance
                    .create_surface(wgpu::SurfaceTarget::Window(window))
                    .map_err(|e| SurfaceError::SurfaceCreation(e.to_string()))?;
                let context = GpuContext::with_instance(instance, Some(&surface)).into_context()?;

                let (width, height) = (width.max(1), height.max(1));
                let mut config = surface
                    .get_default_config(context.adapter(), width, height)
                    .ok_or_else(|| SurfaceError::UnsupportedFormat {
                        adapter_name: context.adapter_name().to_string(),
                    })?;
                config.present_mode = wgpu::PresentMode::AutoVsync;
                surface.configure(context.device(), &config);
                let format = config.format;
                (
                    context,
                    RenderTarget::Window { surface, config },
                    format,
                    width,
                    height,
                )
            }
        };

        let device = context.device();
        let particle_bytes =
            (settings.particle_capacity.max(1) * std::mem::size_of::<ParticleVertex>()) as u64;
        let edge_bytes =
            (settings.edge_capacity.max(1) * 2 * std::mem::size_of::<EdgeVertex>()) as u64;
        if !context.can_allocate(particle_bytes.max(edge_bytes)) {
            return Err(SurfaceError::DeviceFailed {
                adapter_name: context.adapter_name().to_string(),
                error: format!("vertex buffers of {edge_bytes} bytes exceed device limits"),
            });
        }

        let particle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(labels::PARTICLE_BUFFER),
            size: particle_bytes,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let edge_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(labels::EDGE_BUFFER),
            size: edge_bytes,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniforms = Uniforms::from_frame(&FrameUniforms {
            view_proj: nalgebra::Matrix4::identity(),
            viewport: (width as f32, height as f32),
            particle_size: settings.particle_size,
            time: 0.0,
        });
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(labels::UNIFORM_BUFFER),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("shaders/constellation.wgsl"));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Constellation Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(labels::BIND_GROUP),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Constellation Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let particle_pipeline = create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            format,
            PipelineKind::Particles,
        );

        let edge_pipeline =
            create_pipeline(device, &pipeline_layout, &shader, format, PipelineKind::Edges);

        for label in labels::GPU_RESOURCES {
            ledger.acquire(label);
        }
        info!(
            "GPU renderer ready on {} ({}x{}, {:?})",
            context.adapter_name(),
            width,
            height,
            format
        );

        let bg = settings.background;
        Ok(Self {
            context,
            target,
            format,
            width,
            height,
            clear_color: wgpu::Color {
                r: f64::from(bg.r),
                g: f64::from(bg.g),
                b: f64::from(bg.b),
                a: 1.0,
            },
            particle_pipeline,
            edge_pipeline,
            bind_group,
            uniform_buffer,
            particle_buffer,
            edge_buffer,
            particle_count: 0,
            edge_vertex_count: 0,
        })
    }

    /// Reconfigure the target for a new pixel size. Vertex buffers are kept.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return;
        }
        match &mut self.target {
            RenderTarget::Window { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(self.context.device(), config);
            }
            RenderTarget::Offscreen { texture, view } => {
                texture.destroy();
                let (new_texture, new_view) =
                    create_offscreen_target(self.context.device(), width, height);
                *texture = new_texture;
                *view = new_view;
            }
        }
        self.width = width;
        self.height = height;
        debug!("GPU target resized to {}x{}", width, height);
    }

    /// Copy the live vertex ranges to the GPU if they changed.
    pub fn upload(&mut self, frame: &mut FrameBuffers) {
        if !frame.is_dirty() {
            return;
        }
        let queue = self.context.queue();
        if frame.particle_draw_range() > 0 {
            queue.write_buffer(&self.particle_buffer, 0, frame.particle_bytes());
        }
        if frame.edge_draw_range() > 0 {
            queue.write_buffer(&self.edge_buffer, 0, frame.edge_bytes());
        }
        self.particle_count = frame.particle_draw_range();
        self.edge_vertex_count = frame.edge_draw_range();
        frame.mark_uploaded();
    }

    /// Record and submit one frame. Returns `false` when the surface had no
    /// texture to give this frame (outdated, lost or timed out); the next
    /// tick simply tries again.
    pub fn draw(&mut self, uniforms: &FrameUniforms) -> bool {
        let raw = Uniforms::from_frame(uniforms);
        self.context
            .queue()
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&raw));

        let surface_texture = match &self.target {
            RenderTarget::Window { surface, config } => match surface.get_current_texture() {
                Ok(texture) => Some(texture),
                Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                    surface.configure(self.context.device(), config);
                    debug!("Surface outdated, reconfigured and skipped frame");
                    return false;
                }
                Err(e) => {
                    debug!("Skipping frame: {}", e);
                    return false;
                }
            },
            RenderTarget::Offscreen { .. } => None,
        };

        let window_view = surface_texture
            .as_ref()
            .map(|t| t.texture.create_view(&wgpu::TextureViewDescriptor::default()));
        let view = match (&window_view, &self.target) {
            (Some(view), _) | (None, RenderTarget::Offscreen { view, .. }) => view,
            (None, RenderTarget::Window { .. }) => return false,
        };

        let mut encoder =
            self.context
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Constellation Encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Constellation Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.bind_group, &[]);

            if self.edge_vertex_count > 0 {
                pass.set_pipeline(&self.edge_pipeline);
                pass.set_vertex_buffer(0, self.edge_buffer.slice(..));
                pass.draw(0..self.edge_vertex_count, 0..1);
            }
            if self.particle_count > 0 {
                pass.set_pipeline(&self.particle_pipeline);
                pass.set_vertex_buffer(0, self.particle_buffer.slice(..));
                pass.draw(0..6, 0..self.particle_count);
            }
        }
        self.context.queue().submit(std::iter::once(encoder.finish()));

        if let Some(texture) = surface_texture {
            texture.present();
        }
        trace!(
            "Drew {} particles, {} edge vertices",
            self.particle_count,
            self.edge_vertex_count
        );
        true
    }

    /// Destroy every GPU object and record the disposals.
    pub fn release(self, ledger: &mut ResourceLedger) {
        let Self {
            context,
            target,
            particle_pipeline,
            edge_pipeline,
            bind_group,
            uniform_buffer,
            particle_buffer,
            edge_buffer,
            ..
        } = self;

        for (buffer, label) in [
            (particle_buffer, labels::PARTICLE_BUFFER),
            (edge_buffer, labels::EDGE_BUFFER),
            (uniform_buffer, labels::UNIFORM_BUFFER),
        ] {
            buffer.destroy();
            ledger.release(label);
        }
        drop(bind_group);
        ledger.release(labels::BIND_GROUP);
        drop(particle_pipeline);
        ledger.release(labels::PARTICLE_PIPELINE);
        drop(edge_pipeline);
        ledger.release(labels::EDGE_PIPELINE);

        if let RenderTarget::Offscreen { texture, .. } = &target {
            texture.destroy();
        }
        drop(target);
        ledger.release(labels::SURFACE);

        let _ = context.device().poll(wgpu::Maintain::Wait);
        drop(context);
        ledger.release(labels::DEVICE);
        debug!("GPU renderer released");
    }

    #[must_use]
    pub fn adapter_name(&self) -> &str {
        self.context.adapter_name()
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

#[derive(Clone, Copy)]
enum PipelineKind {
    Particles,
    Edges,
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    kind: PipelineKind,
) -> wgpu::RenderPipeline {
    let (label, vs, fs, step_mode, topology) = match kind {
        PipelineKind::Particles => (
            labels::PARTICLE_PIPELINE,
            "vs_particle",
            "fs_particle",
            wgpu::VertexStepMode::Instance,
            wgpu::PrimitiveTopology::TriangleList,
        ),
        PipelineKind::Edges => (
            labels::EDGE_PIPELINE,
            "vs_edge",
            "fs_edge",
            wgpu::VertexStepMode::Vertex,
            wgpu::PrimitiveTopology::LineList,
        ),
    };

    // Additive: overlapping glows and crossing lines brighten
    let additive = wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent::OVER,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: vs,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<ParticleVertex>() as wgpu::BufferAddress,
                step_mode,
                attributes: &VERTEX_ATTRIBUTES,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: fs,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(additive),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn create_offscreen_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(labels::SURFACE),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Color;

    fn settings() -> RendererSettings {
        RendererSettings {
            particle_capacity: 16,
            edge_capacity: 32,
            particle_size: 3.0,
            background: Color::BLACK,
        }
    }

    #[test]
    fn test_offscreen_renderer_lifecycle() {
        let mut ledger = ResourceLedger::new();
        let surface = SurfaceHandle::Offscreen {
            width: 64,
            height: 48,
        };
        // Skip silently on machines without a usable adapter
        let Ok(mut renderer) = GpuRenderer::new(surface, &settings(), &mut ledger) else {
            assert!(ledger.is_empty());
            return;
        };
        assert!(ledger.is_live(labels::PARTICLE_BUFFER));

        renderer.resize(128, 96);
        assert_eq!(renderer.size(), (128, 96));

        let mut frame = FrameBuffers::with_capacity(16, 32);
        renderer.upload(&mut frame);
        assert!(renderer.draw(&FrameUniforms {
            view_proj: nalgebra::Matrix4::identity(),
            viewport: (128.0, 96.0),
            particle_size: 3.0,
            time: 0.0,
        }));

        renderer.release(&mut ledger);
        assert!(ledger.is_empty());
        assert_eq!(ledger.released().len(), 8);
    }

    #[test]
    fn test_headless_handle_is_rejected() {
        let mut ledger = ResourceLedger::new();
        let result = GpuRenderer::new(
            SurfaceHandle::Headless {
                width: 10,
                height: 10,
            },
            &settings(),
            &mut ledger,
        );
        assert!(matches!(result, Err(SurfaceError::SurfaceCreation(_))));
    }
}
