//! Property and scenario tests for the simulation pipeline
//!
//! Run tests with: cargo test --test `constellation_properties`

use constellation_core::{
    build_edges, Background, DensityPreset, Edge, EdgeSet, EdgeStrategy, FieldConfig, Influence,
    InteractionField, ManualHost, ParticleStore, ProximityGraph, ProximityGrid, StepParams,
    SurfaceHandle, Vec3,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mounted(config: FieldConfig) -> Background<ManualHost> {
    let mut bg = Background::new(config, ManualHost::new()).expect("valid config");
    bg.mount(SurfaceHandle::Headless {
        width: 800,
        height: 600,
    });
    bg
}

fn frame_time(frame: u64) -> Duration {
    Duration::from_micros(frame * 16_667)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Particle bounds
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_positions_stay_within_bounds_plus_one_step() {
    let config = FieldConfig {
        seed: Some(11),
        ..FieldConfig::default()
    };
    let bounds = config.bounds;
    let slack = config.max_speed + 1e-4;
    let mut bg = mounted(config);
    let mut rng = StdRng::seed_from_u64(5);

    for frame in 0..2000 {
        if frame % 7 == 0 {
            bg.on_pointer_move(rng.random_range(0.0..800.0), rng.random_range(0.0..600.0));
        }
        bg.tick(frame_time(frame)).expect("running");

        for p in bg.particles().unwrap().positions() {
            assert!(
                p.x.abs() <= bounds.x + slack
                    && p.y.abs() <= bounds.y + slack
                    && p.z.abs() <= bounds.z + slack,
                "frame {frame}: {p:?} escaped {bounds:?}"
            );
        }
    }
}

#[test]
fn test_reflection_turns_particles_around() {
    let bounds = Vec3::new(10.0, 10.0, 10.0);
    let mut store = ParticleStore::from_parts(
        vec![Vec3::new(9.9, -9.9, 0.0)],
        vec![Vec3::new(0.4, -0.4, 0.0)],
        bounds,
    );
    let params = StepParams {
        influence_radius: 5.0,
        influence_gain: 0.0,
        damping: 1.0,
        min_speed: 0.0,
        max_speed: 1.0,
    };
    for _ in 0..100 {
        store.step(1.0, &Influence::default(), &params);
        let p = store.positions()[0];
        assert!(p.x <= 10.4 + 1e-5 && p.y >= -10.4 - 1e-5);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Proximity graph
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_edges_never_exceed_capacity() {
    let config = FieldConfig {
        connection_distance: 40.0,
        connection_capacity: 50,
        seed: Some(2),
        ..FieldConfig::default()
    };
    let mut bg = mounted(config);
    for frame in 0..30 {
        let stats = bg.tick(frame_time(frame)).unwrap();
        assert!(stats.edges <= 50);
        assert!(stats.saturated);
        assert_eq!(bg.frame_buffers().unwrap().edge_draw_range(), 100);
    }
}

#[test]
fn test_every_close_pair_is_connected_when_unsaturated() {
    let config = FieldConfig {
        connection_capacity: 100_000,
        seed: Some(8),
        ..FieldConfig::default()
    };
    let max_distance = config.connection_distance;
    let mut bg = mounted(config);

    for frame in 0..20 {
        let stats = bg.tick(frame_time(frame)).unwrap();
        assert!(!stats.saturated);

        let positions = bg.particles().unwrap().positions();
        let edges: &EdgeSet = bg.edges().unwrap();
        let mut expected = 0;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                if (positions[j] - positions[i]).norm_squared() < max_distance * max_distance {
                    expected += 1;
                    assert!(edges.contains(i, j), "missing ({i}, {j})");
                }
            }
        }
        assert_eq!(edges.len(), expected);
    }
}

#[test]
fn test_edges_follow_lexicographic_order() {
    let mut rng = StdRng::seed_from_u64(99);
    let positions: Vec<Vec3> = (0..200)
        .map(|_| {
            Vec3::new(
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
            )
        })
        .collect();
    let edges = build_edges(&positions, 12.0, 10_000);
    assert!(edges.windows(2).all(|w| w[0].pair() < w[1].pair()));
    assert!(edges.iter().all(|e| e.a < e.b));
    assert!(edges.iter().all(|e| (0.0..=1.0).contains(&e.strength)));
}

#[test]
fn test_four_particle_scenario() {
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(100.0, 0.0, 0.0),
        Vec3::new(100.0, 1.0, 0.0),
    ];
    for strategy in [EdgeStrategy::BruteForce, EdgeStrategy::Grid] {
        let mut graph = ProximityGraph::new(5.0, 16, strategy);
        let edges = graph.rebuild(&positions);
        let pairs: Vec<_> = edges.as_slice().iter().map(Edge::pair).collect();
        assert_eq!(pairs, vec![(0, 1), (2, 3)], "{strategy:?}");
        approx::assert_relative_eq!(edges.as_slice()[0].strength, 0.8, epsilon = 1e-6);
    }
}

#[test]
fn test_high_density_uses_grid_and_matches_brute_force() {
    let config = FieldConfig {
        seed: Some(21),
        ..FieldConfig::from_preset(DensityPreset::High)
    };
    assert!(config.uses_spatial_index());
    let max_distance = config.connection_distance;
    let capacity = config.connection_capacity;
    let mut bg = mounted(config);

    for frame in 0..5 {
        bg.tick(frame_time(frame)).unwrap();
    }
    let positions = bg.particles().unwrap().positions();
    let reference = build_edges(positions, max_distance, capacity);

    let mut grid = ProximityGrid::new(max_distance);
    let mut indexed = EdgeSet::with_capacity(capacity);
    grid.build_edges_into(positions, &mut indexed);

    let from_bg: Vec<_> = bg.edges().unwrap().as_slice().iter().map(Edge::pair).collect();
    let from_brute: Vec<_> = reference.iter().map(Edge::pair).collect();
    let from_grid: Vec<_> = indexed.as_slice().iter().map(Edge::pair).collect();
    assert_eq!(from_bg, from_brute);
    assert_eq!(from_grid, from_brute);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Interaction field
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_strength_is_one_after_event_and_never_increases_between_events() {
    let mut bg = mounted(FieldConfig {
        seed: Some(4),
        ..FieldConfig::default()
    });
    let mut rng = StdRng::seed_from_u64(17);
    let mut last = bg.influence().unwrap().strength;

    for frame in 0..300 {
        if rng.random_bool(0.05) {
            bg.on_pointer_move(rng.random_range(0.0..800.0), rng.random_range(0.0..600.0));
            assert_eq!(bg.influence().unwrap().strength, 1.0);
            last = 1.0;
        }
        let stats = bg.tick(frame_time(frame)).unwrap();
        assert!(stats.strength <= last, "frame {frame}: {} > {last}", stats.strength);
        assert!(stats.strength >= 0.0);
        last = stats.strength;
    }
}

#[test]
fn test_decay_scenario() {
    let mut bg = mounted(FieldConfig {
        decay: 0.95,
        seed: Some(1),
        ..FieldConfig::default()
    });
    bg.on_pointer_move(400.0, 300.0);

    let strengths: Vec<f32> = (0..60)
        .map(|frame| bg.tick(frame_time(frame)).unwrap().strength)
        .collect();
    approx::assert_relative_eq!(strengths[9], 0.599, epsilon = 1e-3);
    approx::assert_relative_eq!(strengths[59], 0.046, epsilon = 1e-3);
    assert!(strengths[59] > 0.0);
}

#[test]
fn test_influence_point_eases_toward_pointer() {
    let mut field = InteractionField::new(Vec3::new(80.0, 50.0, 40.0), 0.1, 0.95);
    field.on_pointer_move(800.0, 0.0, 800.0, 600.0);
    let target = field.target_world();

    let mut previous_gap = (target - field.current()).norm();
    for _ in 0..50 {
        field.tick(1.0);
        let gap = (target - field.current()).norm();
        assert!(gap < previous_gap);
        previous_gap = gap;
    }
    assert!(previous_gap < 1.0);
}
