//! Particle State Store
//!
//! Owns the position and velocity arrays for the N particles of one mount.
//! Particles are never created or destroyed after initialization; identity is
//! the array index. Stepping is a single synchronous pass over fixed-size
//! arrays with no failure mode.
//!
//! Step order per particle:
//! 1. Euler integration, `position += velocity * dt`
//! 2. Attraction impulse toward the influence point when inside its radius
//! 3. Boundary reflection (velocity sign flip, position untouched)
//! 4. Damping, followed by the speed floor and cap

use crate::core_types::Vec3;
use crate::interaction::Influence;
use rand::Rng;

/// Per-step tunables pulled from [`FieldConfig`](crate::FieldConfig).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub influence_radius: f32,
    pub influence_gain: f32,
    pub damping: f32,
    pub min_speed: f32,
    pub max_speed: f32,
}

impl StepParams {
    #[must_use]
    pub fn from_config(config: &crate::FieldConfig) -> Self {
        Self {
            influence_radius: config.influence_radius,
            influence_gain: config.influence_gain,
            damping: config.damping,
            min_speed: config.min_speed,
            max_speed: config.max_speed,
        }
    }
}

/// Position/velocity arrays for a fixed particle set.
#[derive(Debug, Clone)]
pub struct ParticleStore {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    bounds: Vec3,
}

impl ParticleStore {
    /// Allocate `count` particles uniformly inside `[-bounds, bounds]` with
    /// random headings and speeds drawn from `speed_range`.
    pub fn initialize<R: Rng>(
        count: usize,
        bounds: Vec3,
        speed_range: (f32, f32),
        rng: &mut R,
    ) -> Self {
        let (min_speed, max_speed) = speed_range;
        let mut positions = Vec::with_capacity(count);
        let mut velocities = Vec::with_capacity(count);

        for _ in 0..count {
            positions.push(Vec3::new(
                rng.random_range(-bounds.x..=bounds.x),
                rng.random_range(-bounds.y..=bounds.y),
                rng.random_range(-bounds.z..=bounds.z),
            ));

            let heading = random_unit(rng);
            let speed = if max_speed > min_speed {
                rng.random_range(min_speed..=max_speed)
            } else {
                min_speed
            };
            velocities.push(heading * speed);
        }

        Self {
            positions,
            velocities,
            bounds,
        }
    }

    /// Build a store from explicit positions at rest.
    #[must_use]
    pub fn from_positions(positions: Vec<Vec3>, bounds: Vec3) -> Self {
        let velocities = vec![Vec3::zeros(); positions.len()];
        Self {
            positions,
            velocities,
            bounds,
        }
    }

    /// Build a store from explicit positions and velocities.
    ///
    /// # Panics
    /// Panics if the two arrays differ in length.
    #[must_use]
    pub fn from_parts(positions: Vec<Vec3>, velocities: Vec<Vec3>, bounds: Vec3) -> Self {
        assert_eq!(
            positions.len(),
            velocities.len(),
            "positions and velocities must have the same length"
        );
        Self {
            positions,
            velocities,
            bounds,
        }
    }

    /// Advance every particle by `dt` ticks.
    pub fn step(&mut self, dt: f32, influence: &Influence, params: &StepParams) {
        let attract = influence.strength > 0.0 && params.influence_gain > 0.0;
        let radius = params.influence_radius;
        let radius_sq = radius * radius;
        let bounds = self.bounds;

        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            *position += *velocity * dt;

            if attract {
                let offset = influence.point - *position;
                let dist_sq = offset.norm_squared();
                if dist_sq < radius_sq && dist_sq > f32::EPSILON {
                    let distance = dist_sq.sqrt();
                    let falloff = (radius - distance) / radius;
                    let impulse = falloff * influence.strength * params.influence_gain;
                    *velocity += offset / distance * impulse * dt;
                }
            }

            // Reflect only while heading outward
            for axis in 0..3 {
                let limit = bounds[axis];
                if (position[axis] > limit && velocity[axis] > 0.0)
                    || (position[axis] < -limit && velocity[axis] < 0.0)
                {
                    velocity[axis] = -velocity[axis];
                }
            }

            *velocity *= params.damping.powf(dt);

            let speed = velocity.norm();
            if speed > params.max_speed {
                *velocity *= params.max_speed / speed;
            } else if speed < params.min_speed && speed > f32::EPSILON {
                *velocity *= params.min_speed / speed;
            }
        }
    }

    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    #[must_use]
    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    #[must_use]
    pub fn bounds(&self) -> Vec3 {
        self.bounds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn random_unit<R: Rng>(rng: &mut R) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        );
        let len_sq = candidate.norm_squared();
        if len_sq > 1e-6 && len_sq <= 1.0 {
            return candidate / len_sq.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> StepParams {
        StepParams {
            influence_radius: 10.0,
            influence_gain: 0.1,
            damping: 1.0,
            min_speed: 0.0,
            max_speed: 100.0,
        }
    }

    #[test]
    fn test_initialize_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let bounds = Vec3::new(10.0, 5.0, 2.0);
        let store = ParticleStore::initialize(200, bounds, (0.1, 0.3), &mut rng);

        assert_eq!(store.len(), 200);
        for (p, v) in store.positions().iter().zip(store.velocities()) {
            assert!(p.x.abs() <= bounds.x && p.y.abs() <= bounds.y && p.z.abs() <= bounds.z);
            let speed = v.norm();
            assert!((0.1 - 1e-4..=0.3 + 1e-4).contains(&speed), "speed {speed}");
        }
    }

    #[test]
    fn test_euler_step_without_influence() {
        let mut store = ParticleStore::from_parts(
            vec![Vec3::new(1.0, 2.0, 3.0)],
            vec![Vec3::new(0.5, -0.5, 0.25)],
            Vec3::new(50.0, 50.0, 50.0),
        );
        store.step(1.0, &Influence::default(), &params());
        assert_relative_eq!(store.positions()[0], Vec3::new(1.5, 1.5, 3.25));
    }

    #[test]
    fn test_attraction_pulls_toward_point() {
        let mut store = ParticleStore::from_positions(
            vec![Vec3::new(5.0, 0.0, 0.0)],
            Vec3::new(50.0, 50.0, 50.0),
        );
        let influence = Influence {
            point: Vec3::zeros(),
            strength: 1.0,
        };
        store.step(1.0, &influence, &params());

        // (10 - 5) / 10 * 1.0 * 0.1 = 0.05 toward -X
        assert_relative_eq!(store.velocities()[0].x, -0.05, epsilon = 1e-6);
        assert_relative_eq!(store.velocities()[0].y, 0.0);
    }

    #[test]
    fn test_no_attraction_outside_radius_or_without_strength() {
        let bounds = Vec3::new(50.0, 50.0, 50.0);
        let mut far = ParticleStore::from_positions(vec![Vec3::new(20.0, 0.0, 0.0)], bounds);
        let influence = Influence {
            point: Vec3::zeros(),
            strength: 1.0,
        };
        far.step(1.0, &influence, &params());
        assert_eq!(far.velocities()[0], Vec3::zeros());

        let mut idle = ParticleStore::from_positions(vec![Vec3::new(5.0, 0.0, 0.0)], bounds);
        idle.step(1.0, &Influence::default(), &params());
        assert_eq!(idle.velocities()[0], Vec3::zeros());
    }

    #[test]
    fn test_reflects_at_boundary_without_clamping() {
        let mut store = ParticleStore::from_parts(
            vec![Vec3::new(9.8, 0.0, 0.0)],
            vec![Vec3::new(0.5, 0.0, 0.0)],
            Vec3::new(10.0, 10.0, 10.0),
        );
        store.step(1.0, &Influence::default(), &params());

        // Overshoots by one step, is not clamped, heads back inward
        assert_relative_eq!(store.positions()[0].x, 10.3, epsilon = 1e-5);
        assert_relative_eq!(store.velocities()[0].x, -0.5);

        store.step(1.0, &Influence::default(), &params());
        assert_relative_eq!(store.positions()[0].x, 9.8, epsilon = 1e-5);
        assert_relative_eq!(store.velocities()[0].x, -0.5);
    }

    #[test]
    fn test_damping_respects_speed_floor() {
        let mut store = ParticleStore::from_parts(
            vec![Vec3::zeros()],
            vec![Vec3::new(1.0, 0.0, 0.0)],
            Vec3::new(1000.0, 1000.0, 1000.0),
        );
        let damped = StepParams {
            damping: 0.5,
            min_speed: 0.2,
            ..params()
        };
        store.step(1.0, &Influence::default(), &damped);
        assert_relative_eq!(store.velocities()[0].x, 0.5);
        store.step(1.0, &Influence::default(), &damped);
        store.step(1.0, &Influence::default(), &damped);
        assert_relative_eq!(store.velocities()[0].norm(), 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_speed_cap_bounds_repeated_impulses() {
        let mut store = ParticleStore::from_positions(
            vec![Vec3::new(5.0, 0.0, 0.0)],
            Vec3::new(50.0, 50.0, 50.0),
        );
        let capped = StepParams {
            influence_gain: 10.0,
            max_speed: 0.75,
            ..params()
        };
        let influence = Influence {
            point: Vec3::zeros(),
            strength: 1.0,
        };
        for _ in 0..20 {
            store.step(1.0, &influence, &capped);
            assert!(store.velocities()[0].norm() <= 0.75 + 1e-5);
        }
    }
}
