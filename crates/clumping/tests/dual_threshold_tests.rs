//! Tests for dual-threshold growing.

use clumping::{
    ClumpOrigin, ClumpingConfig, ClumpingError, ClumpingManager, ClumpingState,
    DualThresholdConfig, Field, Threshold,
};
use storm_common::GridGeom;
use test_utils::fixtures::{self, Fixture, PRIMARY_THRESHOLD, SECONDARY_THRESHOLD};
use test_utils::{assert_approx_eq, empty_field, init_test_tracing, paint_rect};

fn dual_config() -> DualThresholdConfig {
    DualThresholdConfig {
        secondary_threshold: SECONDARY_THRESHOLD as f64,
        min_fraction_all_parts: 0.2,
        min_fraction_each_part: 0.1,
        min_size_each_part: 1,
        min_clump_volume_km3: 0.0,
        max_clump_volume_km3: 1.0e9,
        debug: true,
    }
}

fn unit_geom(fx: &Fixture) -> GridGeom {
    GridGeom::flat(fx.nx, fx.ny, 1.0, 1.0)
}

fn run(fx: &Fixture, config: DualThresholdConfig) -> (ClumpingManager, Vec<clumping::ClumpProps>) {
    run_on(fx, &unit_geom(fx), config)
}

fn run_on(
    fx: &Fixture,
    geom: &GridGeom,
    config: DualThresholdConfig,
) -> (ClumpingManager, Vec<clumping::ClumpProps>) {
    let mut manager = ClumpingManager::new();
    manager.set_use_dual_thresholds(config).unwrap();
    let props = manager
        .load_clump_vector(
            geom,
            Field::Float(&fx.data),
            Threshold::Float(PRIMARY_THRESHOLD),
            1,
            0.0,
        )
        .unwrap();
    (manager, props)
}

// ============================================================================
// Splitting
// ============================================================================

#[test]
fn test_twin_cores_split_into_two_parts() {
    init_test_tracing();
    let fx = fixtures::twin_cores();
    let (manager, props) = run(&fx, dual_config());

    assert_eq!(props.len(), 2);
    assert_eq!(manager.state(), ClumpingState::Finalized);

    let (west, east) = (&props[0], &props[1]);
    assert_eq!((west.id, east.id), (1, 2));
    assert!(props.iter().all(|p| p.origin == ClumpOrigin::DualThresholdPart));

    assert_eq!(west.n_points, 78);
    assert_eq!(east.n_points, 78);
    assert_eq!((west.bbox.xmin, west.bbox.xmax), (2, 14));
    assert_eq!((east.bbox.xmin, east.bbox.xmax), (15, 27));
    assert_eq!((west.bbox.ymin, west.bbox.ymax), (3, 8));

    for part in &props {
        assert_eq!(part.n_intervals(), 6);
        assert_eq!(part.n_seed_points, 24);
        assert_eq!(part.seed_intervals.len(), 4);
        assert!(part.intervals.iter().all(|iv| iv.id == part.id));
        assert!(part
            .intervals
            .iter()
            .all(|iv| iv.row_in_vol == iv.row_in_plane));
    }

    let stats = manager.dual_threshold_stats().unwrap();
    assert_eq!(stats.n_seed_clumps, 2);
    assert_eq!(stats.n_candidates, 1);
    assert_eq!(stats.n_accepted, 1);
    assert_eq!(stats.n_props, 2);
}

#[test]
fn test_parts_cover_candidate() {
    let fx = fixtures::twin_cores();
    let (_, props) = run(&fx, dual_config());
    let total: usize = props.iter().map(|p| p.n_points).sum();
    assert_eq!(total, 156);
}

#[test]
fn test_stacked_cores_split_through_planes() {
    let fx = fixtures::stacked_cores();
    // layer thicknesses 1, 1.5 and 2 km
    let geom = unit_geom(&fx).with_z_levels(vec![1.0, 2.0, 4.0]);
    let config = DualThresholdConfig {
        min_fraction_all_parts: 0.1,
        ..dual_config()
    };
    let (manager, props) = run_on(&fx, &geom, config);

    assert_eq!(props.len(), 2);
    assert!(props.iter().all(|p| p.origin == ClumpOrigin::DualThresholdPart));
    let (lower, upper) = (&props[0], &props[1]);

    // each plane is split where the two seeds are equally far away
    let columns = |part: &clumping::ClumpProps, plane: usize| {
        let runs: Vec<(usize, usize)> = part
            .intervals
            .iter()
            .filter(|iv| iv.plane == plane)
            .map(|iv| (iv.begin, iv.end))
            .collect();
        assert_eq!(runs.len(), 2);
        runs[0]
    };
    assert_eq!(columns(lower, 0), (2, 6));
    assert_eq!(columns(lower, 1), (2, 5));
    assert_eq!(columns(lower, 2), (2, 4));
    assert_eq!(columns(upper, 0), (7, 9));
    assert_eq!(columns(upper, 1), (6, 9));
    assert_eq!(columns(upper, 2), (5, 9));

    assert_eq!((lower.n_points, upper.n_points), (24, 24));
    assert_approx_eq!(lower.volume_km3, 34.0, 1e-9);
    assert_approx_eq!(upper.volume_km3, 38.0, 1e-9);
    assert_eq!((lower.n_seed_points, upper.n_seed_points), (4, 4));
    assert_eq!((lower.bbox.zmin, lower.bbox.zmax), (0, 2));
    assert_eq!((upper.bbox.xmin, upper.bbox.xmax), (5, 9));

    for part in &props {
        assert_eq!(part.n_intervals(), 6);
        for iv in &part.intervals {
            assert_eq!(iv.id, part.id);
            assert_eq!(iv.row_in_vol, iv.plane * fx.ny + iv.row_in_plane);
        }
    }
    assert_eq!(manager.dual_threshold_stats().unwrap().n_props, 2);
}

// ============================================================================
// Rejection
// ============================================================================

#[test]
fn test_seed_fraction_is_weighted_by_layer_volume() {
    // one seed cell in a thick top layer above a wide thin base
    let (nx, ny, nz) = (4, 1, 3);
    let mut data = empty_field(nx, ny, nz);
    paint_rect(&mut data, nx, ny, 0, 0, 0, 3, 1, 20.0);
    paint_rect(&mut data, nx, ny, 1, 0, 0, 1, 1, 20.0);
    paint_rect(&mut data, nx, ny, 2, 0, 0, 1, 1, 50.0);
    let fx = Fixture { nx, ny, nz, data };
    // layer thicknesses 1, 5 and 9 km
    let geom = unit_geom(&fx).with_z_levels(vec![0.0, 1.0, 10.0]);

    // 1 of 5 points, but 9 of 17 km3, lies in the seed
    let (_, props) = run_on(
        &fx,
        &geom,
        DualThresholdConfig {
            min_fraction_all_parts: 0.4,
            ..dual_config()
        },
    );
    assert_eq!(props.len(), 1);
    let whole = &props[0];
    assert_eq!(whole.origin, ClumpOrigin::DualThresholdWhole);
    assert_eq!(whole.n_points, 5);
    assert_eq!(whole.n_intervals(), 3);
    assert_eq!(whole.n_seed_points, 1);
    assert_approx_eq!(whole.volume_km3, 17.0, 1e-9);

    let (_, props) = run_on(
        &fx,
        &geom,
        DualThresholdConfig {
            min_fraction_all_parts: 0.6,
            ..dual_config()
        },
    );
    assert!(props.is_empty());
}

#[test]
fn test_weak_candidate_is_dropped() {
    let fx = fixtures::weak_and_strong();
    let config = DualThresholdConfig {
        min_fraction_all_parts: 0.1,
        ..dual_config()
    };
    let (manager, props) = run(&fx, config);

    assert_eq!(props.len(), 1);
    let strong = &props[0];
    assert_eq!(strong.origin, ClumpOrigin::DualThresholdWhole);
    assert_eq!(strong.bbox.xmin, 26);
    assert_eq!(strong.n_points, 36);
    assert_eq!(strong.n_intervals(), 6);
    assert_eq!(strong.n_seed_points, 16);

    let stats = manager.dual_threshold_stats().unwrap();
    assert_eq!(stats.n_candidates, 2);
    assert_eq!(stats.n_rejected, 1);
}

#[test]
fn test_small_part_fraction_rejects_candidate() {
    let fx = fixtures::twin_cores();
    let config = DualThresholdConfig {
        min_fraction_each_part: 0.6,
        ..dual_config()
    };
    let (_, props) = run(&fx, config);
    assert!(props.is_empty());
}

#[test]
fn test_part_interval_count_rejects_candidate() {
    let fx = fixtures::twin_cores();
    let config = DualThresholdConfig {
        min_size_each_part: 7,
        ..dual_config()
    };
    let (_, props) = run(&fx, config);
    assert!(props.is_empty());
}

#[test]
fn test_volume_bounds() {
    let fx = fixtures::twin_cores();

    let (_, props) = run(
        &fx,
        DualThresholdConfig {
            min_clump_volume_km3: 200.0,
            ..dual_config()
        },
    );
    assert!(props.is_empty());

    let (_, props) = run(
        &fx,
        DualThresholdConfig {
            max_clump_volume_km3: 100.0,
            ..dual_config()
        },
    );
    assert!(props.is_empty());

    let (_, props) = run(
        &fx,
        DualThresholdConfig {
            min_clump_volume_km3: 150.0,
            max_clump_volume_km3: 160.0,
            ..dual_config()
        },
    );
    assert_eq!(props.len(), 2);
}

#[test]
fn test_call_min_volume_applies() {
    let fx = fixtures::twin_cores();
    let mut manager = ClumpingManager::new();
    manager.set_use_dual_thresholds(dual_config()).unwrap();
    let props = manager
        .load_clump_vector(
            &unit_geom(&fx),
            Field::Float(&fx.data),
            Threshold::Float(PRIMARY_THRESHOLD),
            1,
            200.0,
        )
        .unwrap();
    assert!(props.is_empty());
}

#[test]
fn test_candidate_without_seed_is_dropped() {
    let fx = fixtures::block_3x3();
    let config = DualThresholdConfig {
        secondary_threshold: 50.0,
        min_fraction_all_parts: 0.0,
        ..dual_config()
    };
    let mut manager = ClumpingManager::new();
    manager.set_use_dual_thresholds(config).unwrap();
    let props = manager
        .load_clump_vector(
            &unit_geom(&fx),
            Field::Float(&fx.data),
            Threshold::Float(5.0),
            1,
            0.0,
        )
        .unwrap();
    assert!(props.is_empty());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_secondary_not_above_primary_is_config_error() {
    let fx = fixtures::twin_cores();
    let mut manager = ClumpingManager::new();
    manager.set_use_dual_thresholds(dual_config()).unwrap();
    let err = manager
        .load_clump_vector(
            &unit_geom(&fx),
            Field::Float(&fx.data),
            Threshold::Float(SECONDARY_THRESHOLD),
            1,
            0.0,
        )
        .unwrap_err();
    assert!(matches!(err, ClumpingError::InvalidConfig(_)));
}

#[test]
fn test_invalid_dual_config_is_rejected() {
    let mut manager = ClumpingManager::new();
    let err = manager
        .set_use_dual_thresholds(DualThresholdConfig {
            min_fraction_all_parts: -0.5,
            ..dual_config()
        })
        .unwrap_err();
    assert!(err.is_config_error());
    assert!(manager.config().dual_threshold.is_none());
}

#[test]
fn test_config_enables_dual_path() {
    let fx = fixtures::twin_cores();
    let config = ClumpingConfig {
        dual_threshold: Some(dual_config()),
        ..Default::default()
    };
    let mut manager = ClumpingManager::with_config(config).unwrap();
    let props = manager
        .load_clump_vector(
            &unit_geom(&fx),
            Field::Float(&fx.data),
            Threshold::Float(PRIMARY_THRESHOLD),
            1,
            0.0,
        )
        .unwrap();
    assert_eq!(props.len(), 2);

    manager.clear_dual_thresholds();
    let props = manager
        .load_clump_vector(
            &unit_geom(&fx),
            Field::Float(&fx.data),
            Threshold::Float(PRIMARY_THRESHOLD),
            1,
            0.0,
        )
        .unwrap();
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].origin, ClumpOrigin::Single);
}

#[test]
fn test_byte_field_dual_path() {
    let fx = fixtures::twin_cores();
    let bytes: Vec<u8> = fx.data.iter().map(|&v| v as u8).collect();
    let mut manager = ClumpingManager::new();
    manager.set_use_dual_thresholds(dual_config()).unwrap();
    let props = manager
        .load_clump_vector(
            &unit_geom(&fx),
            Field::Byte(&bytes),
            Threshold::Byte(PRIMARY_THRESHOLD as u8),
            1,
            0.0,
        )
        .unwrap();
    assert_eq!(props.len(), 2);
    assert_eq!(props[0].n_points + props[1].n_points, 156);
}
