//! CPU-side frame buffers mirroring particles and edges.
//!
//! Both arrays are allocated once at full capacity and repacked in place
//! every frame. Only the live prefix is drawn: one vertex per particle and
//! two vertices per edge. Nothing here is ever read back into the simulation.

use crate::core_types::Color;
use crate::graph::Edge;
use crate::interaction::Influence;
use crate::particles::ParticleStore;
use bytemuck::{Pod, Zeroable};

/// Interleaved `[x, y, z, r, g, b]` for one particle.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Interleaved `[x, y, z, r, g, b]` for one line endpoint.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EdgeVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

/// Colours and highlight radius used when packing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub base: Color,
    pub accent: Color,
    /// Particles inside this radius of the influence point blend toward
    /// `accent` in proportion to the interaction strength.
    pub highlight_radius: f32,
}

impl Palette {
    #[must_use]
    pub fn from_config(config: &crate::FieldConfig) -> Self {
        Self {
            base: config.base_color,
            accent: config.accent_color,
            highlight_radius: config.influence_radius,
        }
    }

    fn particle_color(&self, distance: f32, strength: f32) -> Color {
        if strength <= 0.0 || distance >= self.highlight_radius {
            return self.base;
        }
        let falloff = 1.0 - distance / self.highlight_radius;
        self.base.lerp(self.accent, falloff * strength)
    }

    /// Strong edges tend to `accent`; weak ones scale down to black.
    fn edge_color(&self, strength: f32) -> Color {
        self.base.lerp(self.accent, strength).scale(strength)
    }
}

/// Fixed-capacity vertex storage with live counts and a dirty flag.
#[derive(Debug, Clone)]
pub struct FrameBuffers {
    particles: Vec<ParticleVertex>,
    edges: Vec<EdgeVertex>,
    live_particles: usize,
    live_edges: usize,
    dirty: bool,
}

impl FrameBuffers {
    #[must_use]
    pub fn with_capacity(particle_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            particles: vec![ParticleVertex::default(); particle_capacity],
            edges: vec![EdgeVertex::default(); edge_capacity * 2],
            live_particles: 0,
            live_edges: 0,
            dirty: false,
        }
    }

    /// Repack from the current simulation state and mark the buffers dirty.
    /// Input beyond capacity is ignored.
    pub fn pack(
        &mut self,
        store: &ParticleStore,
        edges: &[Edge],
        influence: &Influence,
        palette: &Palette,
    ) {
        let positions = store.positions();

        let live_particles = positions.len().min(self.particles.len());
        for (vertex, position) in self.particles.iter_mut().zip(positions) {
            let distance = (position - influence.point).norm();
            *vertex = ParticleVertex {
                position: (*position).into(),
                color: palette.particle_color(distance, influence.strength).to_array(),
            };
        }

        let live_edges = edges.len().min(self.edge_capacity());
        for (pair, edge) in self.edges.chunks_exact_mut(2).zip(&edges[..live_edges]) {
            let color = palette.edge_color(edge.strength).to_array();
            let (a, b) = edge.pair();
            pair[0] = EdgeVertex {
                position: positions[a].into(),
                color,
            };
            pair[1] = EdgeVertex {
                position: positions[b].into(),
                color,
            };
        }

        self.live_particles = live_particles;
        self.live_edges = live_edges;
        self.dirty = true;
    }

    /// Number of particle vertices to draw.
    #[must_use]
    pub fn particle_draw_range(&self) -> u32 {
        self.live_particles as u32
    }

    /// Number of line vertices to draw (two per live edge).
    #[must_use]
    pub fn edge_draw_range(&self) -> u32 {
        (self.live_edges * 2) as u32
    }

    #[must_use]
    pub fn live_edges(&self) -> usize {
        self.live_edges
    }

    #[must_use]
    pub fn particle_capacity(&self) -> usize {
        self.particles.len()
    }

    #[must_use]
    pub fn edge_capacity(&self) -> usize {
        self.edges.len() / 2
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_uploaded(&mut self) {
        self.dirty = false;
    }

    /// Live particle vertices.
    #[must_use]
    pub fn particle_vertices(&self) -> &[ParticleVertex] {
        &self.particles[..self.live_particles]
    }

    /// Live edge vertices.
    #[must_use]
    pub fn edge_vertices(&self) -> &[EdgeVertex] {
        &self.edges[..self.live_edges * 2]
    }

    #[must_use]
    pub fn particle_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.particle_vertices())
    }

    #[must_use]
    pub fn edge_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.edge_vertices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;
    use crate::graph::build_edges;
    use approx::assert_relative_eq;

    fn palette() -> Palette {
        Palette {
            base: Color::new(0.2, 0.4, 0.2),
            accent: Color::WHITE,
            highlight_radius: 10.0,
        }
    }

    fn store() -> ParticleStore {
        ParticleStore::from_positions(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(100.0, 0.0, 0.0),
                Vec3::new(100.0, 1.0, 0.0),
            ],
            Vec3::new(200.0, 200.0, 200.0),
        )
    }

    #[test]
    fn test_vertex_layout_is_six_floats() {
        assert_eq!(std::mem::size_of::<ParticleVertex>(), 24);
        assert_eq!(std::mem::size_of::<EdgeVertex>(), 24);
    }

    #[test]
    fn test_pack_sets_draw_ranges() {
        let store = store();
        let edges = build_edges(store.positions(), 5.0, 8);
        let mut buffers = FrameBuffers::with_capacity(4, 8);
        assert!(!buffers.is_dirty());

        buffers.pack(&store, &edges, &Influence::default(), &palette());

        assert_eq!(buffers.particle_draw_range(), 4);
        assert_eq!(buffers.edge_draw_range(), 4);
        assert!(buffers.is_dirty());
        assert_eq!(buffers.particle_bytes().len(), 4 * 24);
        assert_eq!(buffers.edge_bytes().len(), 4 * 24);

        let lines = buffers.edge_vertices();
        assert_eq!(lines[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(lines[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(lines[2].position, [100.0, 0.0, 0.0]);
        assert_eq!(lines[3].position, [100.0, 1.0, 0.0]);

        buffers.mark_uploaded();
        assert!(!buffers.is_dirty());
    }

    #[test]
    fn test_capacity_never_grows() {
        let store = store();
        let edges = build_edges(store.positions(), 500.0, 16);
        assert_eq!(edges.len(), 6);

        let mut buffers = FrameBuffers::with_capacity(4, 2);
        buffers.pack(&store, &edges, &Influence::default(), &palette());
        assert_eq!(buffers.edge_capacity(), 2);
        assert_eq!(buffers.edge_draw_range(), 4);
    }

    #[test]
    fn test_edge_color_fades_with_strength() {
        let palette = palette();
        assert_eq!(palette.edge_color(0.0), Color::BLACK);
        let full = palette.edge_color(1.0);
        assert_relative_eq!(full.r, 1.0);
    }

    #[test]
    fn test_particles_near_influence_are_highlighted() {
        let store = store();
        let influence = Influence {
            point: Vec3::zeros(),
            strength: 1.0,
        };
        let mut buffers = FrameBuffers::with_capacity(4, 0);
        buffers.pack(&store, &[], &influence, &palette());

        let vertices = buffers.particle_vertices();
        for channel in vertices[0].color {
            assert_relative_eq!(channel, 1.0, epsilon = 1e-6);
        }
        assert_eq!(vertices[2].color, palette().base.to_array());
    }
}
