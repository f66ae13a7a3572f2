//! Uniform grid index for the proximity graph
//!
//! Cells are cubes with side equal to the connection distance, so every
//! partner of a particle lies in the 3×3×3 block around its own cell.
//! Candidate lists are gathered per particle in parallel, sorted by partner
//! index and merged sequentially, which reproduces the brute-force emission
//! order exactly (including which pairs are dropped at capacity).

use super::{connection_strength, Edge, EdgeSet};
use crate::core_types::Vec3;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

type CellKey = (i32, i32, i32);

/// Hash grid keyed by integer cell coordinates.
#[derive(Debug)]
pub struct ProximityGrid {
    cell_size: f32,
    cells: FxHashMap<CellKey, Vec<u32>>,
}

impl ProximityGrid {
    /// # Panics
    /// Panics if `cell_size` is not finite and positive.
    #[must_use]
    pub fn new(cell_size: f32) -> Self {
        assert!(
            cell_size.is_finite() && cell_size > 0.0,
            "cell_size must be positive and finite"
        );
        Self {
            cell_size,
            cells: FxHashMap::default(),
        }
    }

    #[inline]
    fn cell_key(&self, pos: Vec3) -> CellKey {
        (
            (pos.x / self.cell_size).floor() as i32,
            (pos.y / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    /// Re-bucket all particles. Cell vectors are kept to avoid reallocating.
    pub fn rebuild(&mut self, positions: &[Vec3]) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        for (idx, &pos) in positions.iter().enumerate() {
            let key = self.cell_key(pos);
            self.cells.entry(key).or_default().push(idx as u32);
        }
        self.cells.retain(|_, cell| !cell.is_empty());
    }

    /// Indices in the 27 cells surrounding `pos`, unsorted.
    pub fn query_neighbors(&self, pos: Vec3, out: &mut Vec<u32>) {
        out.clear();
        let (cx, cy, cz) = self.cell_key(pos);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if let Some(indices) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                        out.extend_from_slice(indices);
                    }
                }
            }
        }
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Build the ordered edge set using the grid; `cell_size` is the
    /// connection distance.
    pub fn build_edges_into(&mut self, positions: &[Vec3], out: &mut EdgeSet) {
        out.clear();
        self.rebuild(positions);

        let max_distance = self.cell_size;
        let max_sq = max_distance * max_distance;
        let grid = &*self;

        let per_particle: Vec<Vec<(u32, f32)>> = positions
            .par_iter()
            .enumerate()
            .map_init(Vec::new, |candidates, (i, &pi)| {
                grid.query_neighbors(pi, candidates);
                let mut hits: Vec<(u32, f32)> = candidates
                    .iter()
                    .filter(|&&j| j as usize > i)
                    .filter_map(|&j| {
                        let dist_sq = (positions[j as usize] - pi).norm_squared();
                        (dist_sq < max_sq).then(|| (j, dist_sq.sqrt()))
                    })
                    .collect();
                hits.sort_unstable_by_key(|&(j, _)| j);
                hits
            })
            .collect();

        for (i, hits) in per_particle.into_iter().enumerate() {
            for (j, distance) in hits {
                let edge = Edge {
                    a: i as u32,
                    b: j,
                    strength: connection_strength(distance, max_distance),
                };
                if !out.push(edge) {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_edges_into;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_positions(count: usize, extent: f32, seed: u64) -> Vec<Vec3> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                Vec3::new(
                    rng.random_range(-extent..extent),
                    rng.random_range(-extent..extent),
                    rng.random_range(-extent..extent),
                )
            })
            .collect()
    }

    #[test]
    #[should_panic(expected = "cell_size must be positive and finite")]
    fn test_rejects_zero_cell_size() {
        let _ = ProximityGrid::new(0.0);
    }

    #[test]
    fn test_neighbors_cover_adjacent_cells() {
        let mut grid = ProximityGrid::new(10.0);
        let positions = vec![
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(35.0, 0.0, 0.0),
        ];
        grid.rebuild(&positions);

        let mut out = Vec::new();
        grid.query_neighbors(Vec3::new(0.5, 0.5, 0.5), &mut out);
        out.sort_unstable();
        assert_eq!(out, vec![0, 1]);
        assert_eq!(grid.cell_count(), 3);
    }

    #[test]
    fn test_matches_brute_force_order() {
        let positions = random_positions(700, 60.0, 42);
        let mut brute = EdgeSet::with_capacity(100_000);
        let mut indexed = EdgeSet::with_capacity(100_000);

        build_edges_into(&positions, 9.0, &mut brute);
        ProximityGrid::new(9.0).build_edges_into(&positions, &mut indexed);

        assert!(!brute.is_empty());
        assert_eq!(brute.len(), indexed.len());
        for (b, g) in brute.as_slice().iter().zip(indexed.as_slice()) {
            assert_eq!(b.pair(), g.pair());
            approx::assert_relative_eq!(b.strength, g.strength, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_matches_brute_force_when_truncated() {
        let positions = random_positions(600, 30.0, 9);
        let mut brute = EdgeSet::with_capacity(250);
        let mut indexed = EdgeSet::with_capacity(250);

        build_edges_into(&positions, 8.0, &mut brute);
        ProximityGrid::new(8.0).build_edges_into(&positions, &mut indexed);

        assert!(brute.is_full());
        let brute_pairs: Vec<_> = brute.as_slice().iter().map(Edge::pair).collect();
        let grid_pairs: Vec<_> = indexed.as_slice().iter().map(Edge::pair).collect();
        assert_eq!(brute_pairs, grid_pairs);
    }
}
