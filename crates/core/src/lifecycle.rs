//! Render binding and lifecycle management
//!
//! [`Background`] owns everything created at mount: the particle store, the
//! interaction field, the proximity graph, the frame buffers, the camera, the
//! rendering backend, the pending frame request and the listener ids. The
//! host drives it by calling [`Background::tick`] when a requested frame
//! fires.
//!
//! ```text
//! Unmounted ──mount──▶ Running ──stop──▶ Stopped
//!     ▲  │                │                 │
//!     │  └─(surface fail)─┼──▶ Degraded     │
//!     └──────unmount──────┴────────┴────────┘
//! ```
//!
//! Every transition that does not apply in the current state is a logged
//! no-op, so hosts may call `mount`, `stop` and `unmount` in any order.

use crate::camera::Camera;
use crate::config::FieldConfig;
use crate::error::{ConfigError, SurfaceError};
use crate::frame::{FrameBuffers, Palette};
use crate::graph::{EdgeSet, EdgeStrategy, ProximityGraph};
use crate::host::{FrameRequest, Host, ListenerId, ListenerKind};
use crate::interaction::{Influence, InteractionField};
use crate::particles::{ParticleStore, StepParams};
use crate::profiler::{FrameTimer, ProfilerScope};
use crate::render::{
    labels, FrameUniforms, RenderBackend, RendererSettings, ResourceLedger, SurfaceHandle,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Simulation ticks advanced per frame.
const TICKS_PER_FRAME: f32 = 1.0;

/// Where a [`Background`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unmounted,
    Running,
    /// Stopped between frames; resources are still held.
    Stopped,
    /// The surface could not be created. Nothing is rendered and no frames
    /// or listeners are registered.
    Degraded,
}

/// Summary of one completed tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Zero-based index of this frame since mount.
    pub frame: u64,
    /// Time since the first tick of this mount.
    pub elapsed: Duration,
    pub particles: usize,
    pub edges: usize,
    /// Connection capacity was reached; further qualifying pairs were dropped.
    pub saturated: bool,
    /// Time spent rebuilding the edge set.
    pub build_time: Duration,
    /// Interaction strength after this tick.
    pub strength: f32,
    /// Whether the backend produced a frame.
    pub presented: bool,
}

/// State that only exists while mounted.
#[derive(Debug)]
struct Mounted {
    store: ParticleStore,
    field: InteractionField,
    graph: ProximityGraph,
    frame: FrameBuffers,
    camera: Camera,
    backend: RenderBackend,
    listeners: Vec<ListenerId>,
    pending: Option<FrameRequest>,
    started: Option<Duration>,
    frame_index: u64,
    /// Logical viewport size (pointer coordinates are in this space).
    viewport: (u32, u32),
    /// Touch input has been seen; `mobile_resolution_scale` applies.
    touch_driven: bool,
}

/// Animated constellation background bound to a host.
#[derive(Debug)]
pub struct Background<H: Host> {
    config: FieldConfig,
    host: H,
    state: LifecycleState,
    mounted: Option<Mounted>,
    ledger: ResourceLedger,
    palette: Palette,
    step_params: StepParams,
    build_timer: FrameTimer,
    surface_error: Option<SurfaceError>,
}

impl<H: Host> Background<H> {
    /// Validate `config` and bind to `host`. Nothing is allocated until
    /// [`mount`](Self::mount).
    pub fn new(config: FieldConfig, host: H) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            palette: Palette::from_config(&config),
            step_params: StepParams::from_config(&config),
            config,
            host,
            state: LifecycleState::Unmounted,
            mounted: None,
            ledger: ResourceLedger::new(),
            build_timer: FrameTimer::new(),
            surface_error: None,
        })
    }

    /// Allocate the surface, buffers and simulation, register listeners and
    /// request the first frame.
    ///
    /// Mounting twice is a no-op. If the surface cannot be created the
    /// failure is logged once and the background enters
    /// [`LifecycleState::Degraded`].
    pub fn mount(&mut self, surface: SurfaceHandle) {
        if self.state != LifecycleState::Unmounted {
            debug!("Ignoring mount: already in state {:?}", self.state);
            return;
        }

        let (width, height) = self.clamp_viewport(surface.size());
        let (phys_w, phys_h) = self.physical_size(width, height);
        let settings = RendererSettings {
            particle_capacity: self.config.particle_count,
            edge_capacity: self.config.connection_capacity,
            particle_size: self.config.particle_size * self.config.resolution_scale,
            background: self.config.background_color,
        };

        let surface = surface.with_size(phys_w, phys_h);
        let backend = match RenderBackend::create(surface, &settings, &mut self.ledger) {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Rendering surface unavailable, background disabled: {}", e);
                self.surface_error = Some(e);
                self.state = LifecycleState::Degraded;
                return;
            }
        };
        self.ledger.acquire(labels::FRAME_BUFFERS);

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let config = &self.config;
        let store = ParticleStore::initialize(
            config.particle_count,
            config.bounds,
            (config.min_speed, config.initial_speed),
            &mut rng,
        );
        let strategy = EdgeStrategy::for_particle_count(config.particle_count);
        let mut mounted = Mounted {
            store,
            field: InteractionField::new(config.bounds, config.smoothing, config.decay),
            graph: ProximityGraph::new(
                config.connection_distance,
                config.connection_capacity,
                strategy,
            ),
            frame: FrameBuffers::with_capacity(config.particle_count, config.connection_capacity),
            camera: Camera::new(config.camera_distance, config.camera_parallax, width, height),
            backend,
            listeners: Vec::with_capacity(4),
            pending: None,
            started: None,
            frame_index: 0,
            viewport: (width, height),
            touch_driven: false,
        };

        if config.pointer_controls {
            mounted.listeners.push(self.host.subscribe(ListenerKind::PointerMove));
        }
        if config.touch_controls {
            mounted.listeners.push(self.host.subscribe(ListenerKind::TouchMove));
        }
        if config.pointer_controls || config.touch_controls {
            mounted.listeners.push(self.host.subscribe(ListenerKind::PointerLeave));
        }
        mounted.listeners.push(self.host.subscribe(ListenerKind::Resize));
        mounted.pending = Some(self.host.request_frame());

        info!(
            "Mounted background: {} particles, {:?} edge build, {}x{} ({})",
            config.particle_count,
            strategy,
            width,
            height,
            if mounted.backend.is_gpu() { "gpu" } else { "headless" }
        );
        self.mounted = Some(mounted);
        self.state = LifecycleState::Running;
    }

    /// Apply a viewport change. Zero dimensions are ignored; non-zero sizes
    /// below the configured minimum are clamped up. Returns whether the
    /// resize was applied.
    pub fn on_resize(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to {}x{}", width, height);
            return false;
        }
        let (width, height) = self.clamp_viewport((width, height));
        let (phys_w, phys_h) = self.physical_size(width, height);
        let Some(mounted) = self.mounted.as_mut() else {
            debug!("Ignoring resize while {:?}", self.state);
            return false;
        };

        mounted.viewport = (width, height);
        mounted.camera.set_viewport(width, height);
        mounted.backend.resize(phys_w, phys_h);
        debug!("Resized to {}x{}", width, height);
        true
    }

    /// Mouse or pen movement in viewport pixels.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        if self.config.pointer_controls {
            self.feed_pointer(x, y);
        }
    }

    /// Touch movement in viewport pixels. The first touch switches the
    /// surface to `mobile_resolution_scale`.
    pub fn on_touch_move(&mut self, x: f32, y: f32) {
        if !self.config.touch_controls {
            return;
        }
        let mobile_scale = self.config.mobile_resolution_scale;
        if let Some(mounted) = self.mounted.as_mut() {
            if !mounted.touch_driven {
                mounted.touch_driven = true;
                let (w, h) = mounted.viewport;
                if w > 0 && h > 0 {
                    let (phys_w, phys_h) = physical_size(w, h, mobile_scale);
                    mounted.backend.resize(phys_w, phys_h);
                }
                debug!("Touch input detected, resolution scale {}", mobile_scale);
            }
        }
        self.feed_pointer(x, y);
    }

    pub fn on_pointer_leave(&mut self) {
        if !(self.config.pointer_controls || self.config.touch_controls) {
            return;
        }
        if let Some(mounted) = self.mounted.as_mut() {
            mounted.field.on_pointer_leave();
        }
    }

    fn feed_pointer(&mut self, x: f32, y: f32) {
        if let Some(mounted) = self.mounted.as_mut() {
            let (w, h) = mounted.viewport;
            mounted.field.on_pointer_move(x, y, w as f32, h as f32);
        }
    }

    /// Run one frame of the pipeline and request the next one.
    ///
    /// `now` is the host's monotonic timestamp for this refresh. Returns
    /// `None` unless the background is running.
    pub fn tick(&mut self, now: Duration) -> Option<FrameStats> {
        if self.state != LifecycleState::Running {
            trace!("Skipping tick while {:?}", self.state);
            return None;
        }
        let mounted = self.mounted.as_mut()?;
        mounted.pending = None;

        // 1. Elapsed time since the loop started
        let started = *mounted.started.get_or_insert(now);
        let elapsed = now.saturating_sub(started);

        // 2. Advance the interaction field
        let influence = mounted.field.tick(TICKS_PER_FRAME);

        // 3. Advance particles under the influence point
        mounted
            .store
            .step(TICKS_PER_FRAME, &influence, &self.step_params);

        // 4. Rebuild the edge set
        let scope = ProfilerScope::new("edge build");
        let edges = mounted.graph.rebuild(mounted.store.positions());
        let build_time = scope.elapsed();
        drop(scope);
        self.build_timer.record(build_time);
        let (edge_count, saturated) = (edges.len(), edges.is_full());

        // 5. Repack frame buffers
        mounted
            .frame
            .pack(&mounted.store, edges.as_slice(), &influence, &self.palette);

        // 6. Ease the camera toward the influence point
        mounted
            .camera
            .follow(influence.point, self.config.camera_follow);

        // 7. Draw
        let scale = scale_for(&self.config, mounted.touch_driven);
        let (w, h) = mounted.viewport;
        let (phys_w, phys_h) = physical_size(w, h, scale);
        let uniforms = FrameUniforms {
            view_proj: mounted.camera.view_projection(),
            viewport: (phys_w as f32, phys_h as f32),
            particle_size: self.config.particle_size * scale,
            time: elapsed.as_secs_f32(),
        };
        let presented = mounted.backend.present(&mut mounted.frame, &uniforms);

        let stats = FrameStats {
            frame: mounted.frame_index,
            elapsed,
            particles: mounted.store.len(),
            edges: edge_count,
            saturated,
            build_time,
            strength: influence.strength,
            presented,
        };
        mounted.frame_index += 1;
        mounted.pending = Some(self.host.request_frame());

        trace!(
            "Frame {}: {} edges{}, build {:?}",
            stats.frame,
            stats.edges,
            if saturated { " (saturated)" } else { "" },
            build_time
        );
        Some(stats)
    }

    /// Stop the loop between frames. Resources stay allocated until
    /// [`unmount`](Self::unmount).
    pub fn stop(&mut self) {
        if self.state != LifecycleState::Running {
            debug!("Ignoring stop while {:?}", self.state);
            return;
        }
        if let Some(request) = self.mounted.as_mut().and_then(|m| m.pending.take()) {
            self.host.cancel_frame(request);
        }
        self.state = LifecycleState::Stopped;
        debug!("Background stopped");
    }

    /// Cancel the pending frame, deregister listeners and release every
    /// resource exactly once. Safe to call from any state, any number of
    /// times.
    pub fn unmount(&mut self) {
        if self.state == LifecycleState::Unmounted {
            debug!("Ignoring unmount: not mounted");
            return;
        }

        if let Some(mounted) = self.mounted.take() {
            let Mounted {
                backend,
                listeners,
                pending,
                ..
            } = mounted;
            if let Some(request) = pending {
                self.host.cancel_frame(request);
            }
            for id in listeners {
                self.host.unsubscribe(id);
            }
            backend.release(&mut self.ledger);
            self.ledger.release(labels::FRAME_BUFFERS);
        }

        let leaked = self.ledger.release_all();
        if !leaked.is_empty() {
            warn!("Released {} resources left live at unmount: {:?}", leaked.len(), leaked);
        }
        self.surface_error = None;
        self.state = LifecycleState::Unmounted;
        info!("Background unmounted");
    }

    fn clamp_viewport(&self, (width, height): (u32, u32)) -> (u32, u32) {
        let clamp = |value: u32, min: u32| if value == 0 { 0 } else { value.max(min) };
        (
            clamp(width, self.config.min_width),
            clamp(height, self.config.min_height),
        )
    }

    fn physical_size(&self, width: u32, height: u32) -> (u32, u32) {
        physical_size(width, height, self.resolution_scale())
    }

    /// Pixel scale in effect: `mobile_resolution_scale` once touch input has
    /// been seen on this mount, `resolution_scale` otherwise.
    #[must_use]
    pub fn resolution_scale(&self) -> f32 {
        let touch_driven = self.mounted.as_ref().is_some_and(|m| m.touch_driven);
        scale_for(&self.config, touch_driven)
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == LifecycleState::Running
    }

    #[must_use]
    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// Why the last mount degraded, if it did.
    #[must_use]
    pub fn surface_error(&self) -> Option<&SurfaceError> {
        self.surface_error.as_ref()
    }

    #[must_use]
    pub fn build_timer(&self) -> &FrameTimer {
        &self.build_timer
    }

    #[must_use]
    pub fn frame_buffers(&self) -> Option<&FrameBuffers> {
        self.mounted.as_ref().map(|m| &m.frame)
    }

    #[must_use]
    pub fn edges(&self) -> Option<&EdgeSet> {
        self.mounted.as_ref().map(|m| m.graph.edges())
    }

    #[must_use]
    pub fn particles(&self) -> Option<&ParticleStore> {
        self.mounted.as_ref().map(|m| &m.store)
    }

    #[must_use]
    pub fn influence(&self) -> Option<Influence> {
        self.mounted.as_ref().map(|m| m.field.influence())
    }

    #[must_use]
    pub fn camera(&self) -> Option<&Camera> {
        self.mounted.as_ref().map(|m| &m.camera)
    }

    /// Logical viewport size while mounted.
    #[must_use]
    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.mounted.as_ref().map(|m| m.viewport)
    }

    #[must_use]
    pub fn is_gpu(&self) -> bool {
        self.mounted.as_ref().is_some_and(|m| m.backend.is_gpu())
    }
}

impl<H: Host> Drop for Background<H> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn scale_for(config: &FieldConfig, touch_driven: bool) -> f32 {
    if touch_driven {
        config.mobile_resolution_scale
    } else {
        config.resolution_scale
    }
}

fn physical_size(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let scaled = |v: u32| ((v as f32 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;

    fn config() -> FieldConfig {
        FieldConfig {
            particle_count: 40,
            connection_capacity: 64,
            seed: Some(3),
            ..FieldConfig::default()
        }
    }

    fn headless(width: u32, height: u32) -> SurfaceHandle {
        SurfaceHandle::Headless { width, height }
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let bad = FieldConfig {
            connection_distance: 0.0,
            ..config()
        };
        let err = Background::new(bad, ManualHost::new()).unwrap_err();
        assert_eq!(err.field(), "connection_distance");
    }

    #[test]
    fn test_mount_registers_listeners_and_frame() {
        let mut bg = Background::new(config(), ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));

        assert_eq!(bg.state(), LifecycleState::Running);
        assert!(bg.host().has_pending_frame());
        assert_eq!(bg.host().listener_count(), 4);
        assert!(bg.ledger().is_live(labels::FRAME_BUFFERS));
    }

    #[test]
    fn test_disabled_controls_skip_listeners() {
        let config = FieldConfig {
            pointer_controls: false,
            touch_controls: false,
            ..config()
        };
        let mut bg = Background::new(config, ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));
        assert_eq!(bg.host().listener_count(), 1);
        assert!(bg.host().is_listening(ListenerKind::Resize));

        bg.on_pointer_move(10.0, 10.0);
        assert_eq!(bg.influence().unwrap().strength, 0.0);

        assert!(!bg.host().is_listening(ListenerKind::PointerLeave));
        bg.on_pointer_leave();
        bg.tick(Duration::ZERO);
        assert_eq!(bg.influence().unwrap().strength, 0.0);
    }

    #[test]
    fn test_non_finite_pointer_does_not_poison_frame() {
        let mut bg = Background::new(config(), ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));

        bg.on_pointer_move(f32::NAN, 300.0);
        bg.on_touch_move(400.0, f32::INFINITY);
        for frame in 0..5 {
            bg.tick(Duration::from_millis(frame * 16));
        }
        bg.on_pointer_move(400.0, 300.0);
        for frame in 5..300 {
            bg.tick(Duration::from_millis(frame * 16));
        }

        let influence = bg.influence().unwrap();
        assert!(influence.point.iter().all(|v| v.is_finite()));
        assert!(bg.camera().unwrap().eye().iter().all(|v| v.is_finite()));
        let colour = bg.frame_buffers().unwrap().particle_vertices()[0].color;
        assert!(colour.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_touch_switches_to_mobile_scale() {
        let config = FieldConfig {
            resolution_scale: 1.0,
            mobile_resolution_scale: 0.5,
            ..config()
        };
        let mut bg = Background::new(config, ManualHost::new()).unwrap();
        assert_eq!(bg.resolution_scale(), 1.0);
        bg.mount(headless(800, 600));
        bg.on_pointer_move(100.0, 100.0);
        assert_eq!(bg.resolution_scale(), 1.0);

        bg.on_touch_move(100.0, 100.0);
        assert_eq!(bg.resolution_scale(), 0.5);
        assert_eq!(physical_size(800, 600, bg.resolution_scale()), (400, 300));

        bg.unmount();
        bg.mount(headless(800, 600));
        assert_eq!(bg.resolution_scale(), 1.0);
    }

    #[test]
    fn test_touch_scale_ignored_without_touch_controls() {
        let config = FieldConfig {
            touch_controls: false,
            mobile_resolution_scale: 0.5,
            ..config()
        };
        let mut bg = Background::new(config, ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));
        bg.on_touch_move(100.0, 100.0);
        assert_eq!(bg.resolution_scale(), 1.0);
    }

    #[test]
    fn test_double_mount_is_noop() {
        let mut bg = Background::new(config(), ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));
        bg.mount(headless(1024, 768));
        assert_eq!(bg.viewport(), Some((800, 600)));
        assert_eq!(bg.host().requested_frames(), 1);
    }

    #[test]
    fn test_tick_advances_and_rerequests() {
        let mut bg = Background::new(config(), ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));

        let first = bg.tick(Duration::from_millis(1000)).unwrap();
        let second = bg.tick(Duration::from_millis(1016)).unwrap();
        assert_eq!(first.frame, 0);
        assert_eq!(first.elapsed, Duration::ZERO);
        assert_eq!(second.frame, 1);
        assert_eq!(second.elapsed, Duration::from_millis(16));
        assert_eq!(second.particles, 40);
        assert!(second.presented);
        assert_eq!(bg.host().requested_frames(), 3);

        let buffers = bg.frame_buffers().unwrap();
        assert_eq!(buffers.particle_draw_range(), 40);
        assert_eq!(buffers.edge_draw_range() as usize, second.edges * 2);
    }

    #[test]
    fn test_stop_halts_ticks() {
        let mut bg = Background::new(config(), ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));
        bg.tick(Duration::ZERO);
        bg.stop();

        assert_eq!(bg.state(), LifecycleState::Stopped);
        assert!(!bg.host().has_pending_frame());
        let before = bg.particles().unwrap().positions().to_vec();
        assert!(bg.tick(Duration::from_millis(16)).is_none());
        assert_eq!(bg.particles().unwrap().positions(), before.as_slice());
    }

    #[test]
    fn test_unmount_releases_everything_once() {
        let mut bg = Background::new(config(), ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));
        bg.unmount();

        assert_eq!(bg.state(), LifecycleState::Unmounted);
        assert_eq!(bg.host().listener_count(), 0);
        assert!(!bg.host().has_pending_frame());
        assert!(bg.ledger().is_empty());
        let released = bg.ledger().released().len();

        bg.unmount();
        assert_eq!(bg.ledger().released().len(), released);
        assert!(bg.tick(Duration::ZERO).is_none());
    }

    #[test]
    fn test_resize_clamps_to_minimum() {
        let mut bg = Background::new(config(), ManualHost::new()).unwrap();
        bg.mount(headless(800, 600));
        assert!(bg.on_resize(120, 90));
        assert_eq!(bg.viewport(), Some((200, 200)));
    }

    #[test]
    fn test_physical_size_scaling() {
        assert_eq!(physical_size(800, 600, 0.5), (400, 300));
        assert_eq!(physical_size(1, 1, 0.1), (1, 1));
    }
}
