//! Proximity Graph Builder
//!
//! Recomputes the active connection set from scratch every frame. A pair
//! `(i, j)` with `i < j` is active when the Euclidean distance between the two
//! particles is strictly below the connection distance. Pairs are visited in
//! lexicographic order (`i` ascending, then `j` ascending) and emission stops
//! once the capacity is reached, so later pairs are dropped silently.
//!
//! Two strategies produce the identical ordered sequence:
//! - [`EdgeStrategy::BruteForce`]: every pair is tested, O(N²). Cheap enough
//!   for the reference N of 100–200 (≈ 20k pair checks).
//! - [`EdgeStrategy::Grid`]: a uniform grid with cell size equal to the
//!   connection distance limits each particle to its 27 neighbouring cells.
//!   Selected automatically above [`SPATIAL_INDEX_THRESHOLD`] particles to keep
//!   the build well under one frame time.

mod grid;

pub use grid::ProximityGrid;

use crate::core_types::Vec3;

/// Particle count above which the grid index replaces brute force.
pub const SPATIAL_INDEX_THRESHOLD: usize = 512;

/// One active connection for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Lower particle index.
    pub a: u32,
    /// Higher particle index.
    pub b: u32,
    /// `1 - distance / max_distance`: 1.0 at zero distance, 0.0 at the threshold.
    pub strength: f32,
}

impl Edge {
    #[inline]
    #[must_use]
    pub fn pair(&self) -> (usize, usize) {
        (self.a as usize, self.b as usize)
    }
}

/// Connection strength for a pair at `distance`.
#[inline]
#[must_use]
pub fn connection_strength(distance: f32, max_distance: f32) -> f32 {
    (1.0 - distance / max_distance).clamp(0.0, 1.0)
}

/// Fixed-capacity edge storage with an explicit live count.
///
/// The backing allocation is made once; rebuilding never grows it.
#[derive(Debug, Clone)]
pub struct EdgeSet {
    edges: Vec<Edge>,
    capacity: usize,
}

impl EdgeSet {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            edges: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    /// Append an edge; returns `false` once the set is full.
    #[inline]
    pub fn push(&mut self, edge: Edge) -> bool {
        if self.edges.len() >= self.capacity {
            return false;
        }
        self.edges.push(edge);
        true
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Edge] {
        &self.edges
    }

    /// Live edge count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Capacity reached; qualifying pairs beyond this point were dropped.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.edges.len() >= self.capacity
    }

    /// Whether `(a, b)` (in either order) is in the set.
    #[must_use]
    pub fn contains(&self, a: usize, b: usize) -> bool {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        self.edges.iter().any(|e| e.pair() == (lo, hi))
    }
}

/// Brute-force pair scan into `out`, stopping at its capacity.
pub fn build_edges_into(positions: &[Vec3], max_distance: f32, out: &mut EdgeSet) {
    out.clear();
    let max_sq = max_distance * max_distance;
    let n = positions.len();

    for i in 0..n {
        let pi = positions[i];
        for j in (i + 1)..n {
            let dist_sq = (positions[j] - pi).norm_squared();
            if dist_sq < max_sq {
                let edge = Edge {
                    a: i as u32,
                    b: j as u32,
                    strength: connection_strength(dist_sq.sqrt(), max_distance),
                };
                if !out.push(edge) {
                    return;
                }
            }
        }
    }
}

/// Ordered active edges for `positions`, at most `capacity` of them.
#[must_use]
pub fn build_edges(positions: &[Vec3], max_distance: f32, capacity: usize) -> Vec<Edge> {
    let mut set = EdgeSet::with_capacity(capacity);
    build_edges_into(positions, max_distance, &mut set);
    set.edges
}

/// How the per-frame edge set is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStrategy {
    BruteForce,
    Grid,
}

impl EdgeStrategy {
    /// Brute force up to the threshold, grid index above it.
    #[must_use]
    pub fn for_particle_count(count: usize) -> Self {
        if count > SPATIAL_INDEX_THRESHOLD {
            Self::Grid
        } else {
            Self::BruteForce
        }
    }
}

/// Per-mount graph builder owning the reusable edge storage and grid.
#[derive(Debug)]
pub struct ProximityGraph {
    strategy: EdgeStrategy,
    max_distance: f32,
    edges: EdgeSet,
    grid: Option<ProximityGrid>,
}

impl ProximityGraph {
    #[must_use]
    pub fn new(max_distance: f32, capacity: usize, strategy: EdgeStrategy) -> Self {
        let grid = match strategy {
            EdgeStrategy::Grid => Some(ProximityGrid::new(max_distance)),
            EdgeStrategy::BruteForce => None,
        };
        Self {
            strategy,
            max_distance,
            edges: EdgeSet::with_capacity(capacity),
            grid,
        }
    }

    /// Recompute the edge set for this frame.
    pub fn rebuild(&mut self, positions: &[Vec3]) -> &EdgeSet {
        match self.grid.as_mut() {
            Some(grid) => grid.build_edges_into(positions, &mut self.edges),
            None => build_edges_into(positions, self.max_distance, &mut self.edges),
        }
        &self.edges
    }

    #[must_use]
    pub fn edges(&self) -> &EdgeSet {
        &self.edges
    }

    #[must_use]
    pub fn strategy(&self) -> EdgeStrategy {
        self.strategy
    }

    #[must_use]
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }
}
