//! Tests for clump labeling.

use clumping::{
    ClumpingConfig, ClumpingError, ClumpingManager, ClumpingState, Field, Threshold,
};
use storm_common::GridDims;
use test_utils::{empty_field, fixtures, init_test_tracing, paint_box, rect_field};

fn clump_float(
    manager: &mut ClumpingManager,
    dims: GridDims,
    data: &[f32],
    threshold: f32,
    min_overlap: usize,
) -> usize {
    manager
        .perform_clumping(dims, Field::Float(data), Threshold::Float(threshold), min_overlap)
        .unwrap()
}

// ============================================================================
// Plane clumping
// ============================================================================

#[test]
fn test_empty_grid_has_no_clumps() {
    let dims = GridDims::plane(12, 12);
    let data = empty_field(12, 12, 1);
    let mut manager = ClumpingManager::new();
    assert_eq!(clump_float(&mut manager, dims, &data, 0.0, 1), 0);
    assert!(manager.clumps().is_empty());
    assert_eq!(manager.state(), ClumpingState::Clumped);
}

#[test]
fn test_block_scenario() {
    init_test_tracing();
    let fx = fixtures::block_3x3();
    let dims = GridDims::plane(fx.nx, fx.ny);
    let mut manager = ClumpingManager::new();

    assert_eq!(clump_float(&mut manager, dims, &fx.data, 5.0, 1), 1);
    assert_eq!(manager.n_intervals(), 3);

    let clump = manager.clumps()[0];
    assert_eq!(clump.id, 1);
    assert_eq!(clump.n_points, 9);
    assert_eq!(clump.n_intervals, 3);
    assert_eq!((clump.bbox.xmin, clump.bbox.ymin), (2, 2));
    assert_eq!((clump.bbox.xmax, clump.bbox.ymax), (4, 4));
    assert!(manager.clump_intervals(&clump).all(|iv| iv.id == 1));
}

#[test]
fn test_single_rectangle_cell_count() {
    let (nx, ny) = (30, 20);
    let data = rect_field(nx, ny, &[(3, 4, 17, 11, 25.0)]);
    let mut manager = ClumpingManager::new();
    assert_eq!(clump_float(&mut manager, GridDims::plane(nx, ny), &data, 10.0, 1), 1);
    assert_eq!(manager.clumps()[0].n_points, 17 * 11);
}

#[test]
fn test_separated_rectangles() {
    let (nx, ny) = (20, 10);
    let data = rect_field(nx, ny, &[(1, 1, 5, 4, 20.0), (7, 1, 5, 4, 20.0), (1, 6, 5, 3, 20.0)]);
    let mut manager = ClumpingManager::new();
    assert_eq!(clump_float(&mut manager, GridDims::plane(nx, ny), &data, 10.0, 1), 3);

    let points: Vec<usize> = manager.clumps().iter().map(|c| c.n_points).collect();
    assert_eq!(points, vec![20, 20, 15]);
}

#[test]
fn test_overlap_equal_to_min_overlap_merges() {
    let (nx, ny) = (14, 8);
    // upper block columns 2..=6, lower block columns 5..=10: overlap 2
    let data = rect_field(nx, ny, &[(2, 2, 5, 2, 20.0), (5, 4, 6, 2, 20.0)]);
    let dims = GridDims::plane(nx, ny);
    let mut manager = ClumpingManager::new();
    assert_eq!(clump_float(&mut manager, dims, &data, 10.0, 2), 1);
    assert_eq!(clump_float(&mut manager, dims, &data, 10.0, 3), 2);
}

#[test]
fn test_overlap_below_min_overlap_separates() {
    let (nx, ny) = (14, 8);
    // lower block shifted to columns 6..=11: overlap 1
    let data = rect_field(nx, ny, &[(2, 2, 5, 2, 20.0), (6, 4, 6, 2, 20.0)]);
    let dims = GridDims::plane(nx, ny);
    let mut manager = ClumpingManager::new();
    assert_eq!(clump_float(&mut manager, dims, &data, 10.0, 2), 2);
    assert_eq!(clump_float(&mut manager, dims, &data, 10.0, 1), 1);
}

#[test]
fn test_bridge_merges_three_labels() {
    let (nx, ny) = (15, 8);
    // three bars that only meet at the bottom row
    let data = rect_field(
        nx,
        ny,
        &[
            (1, 1, 2, 5, 20.0),
            (6, 1, 2, 5, 20.0),
            (11, 1, 2, 5, 20.0),
            (1, 6, 12, 1, 20.0),
        ],
    );
    let mut manager = ClumpingManager::new();
    assert_eq!(clump_float(&mut manager, GridDims::plane(nx, ny), &data, 10.0, 1), 1);
    assert!(manager.intervals().iter().all(|iv| iv.id == 1));
    assert_eq!(manager.clumps()[0].n_points, 3 * 10 + 12);
}

#[test]
fn test_ids_are_contiguous_in_scan_order() {
    let (nx, ny) = (20, 10);
    let data = rect_field(nx, ny, &[(12, 1, 3, 2, 20.0), (2, 3, 3, 2, 20.0), (8, 7, 3, 2, 20.0)]);
    let mut manager = ClumpingManager::new();
    clump_float(&mut manager, GridDims::plane(nx, ny), &data, 10.0, 1);

    let ids: Vec<u32> = manager.clumps().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(manager.clump(1).unwrap().bbox.xmin, 12);
    assert_eq!(manager.clump(2).unwrap().bbox.xmin, 2);
    assert!(manager.clump(0).is_none());
    assert!(manager.clump(4).is_none());
}

// ============================================================================
// Volume clumping
// ============================================================================

#[test]
fn test_column_is_one_clump() {
    let fx = fixtures::column_with_overhang();
    let dims = GridDims::new(fx.nx, fx.ny, fx.nz);
    let mut manager = ClumpingManager::new();
    assert_eq!(clump_float(&mut manager, dims, &fx.data, 0.0, 1), 1);

    let clump = manager.clumps()[0];
    assert_eq!(clump.n_points, 54);
    assert_eq!((clump.bbox.zmin, clump.bbox.zmax), (0, 2));
    assert_eq!(clump.bbox.xmax, 9);
}

#[test]
fn test_zero_link_depth_clumps_planes_separately() {
    let fx = fixtures::column_with_overhang();
    let dims = GridDims::new(fx.nx, fx.ny, fx.nz);
    let config = ClumpingConfig {
        plane_link_depth: 0,
        ..Default::default()
    };
    let mut manager = ClumpingManager::with_config(config).unwrap();
    assert_eq!(clump_float(&mut manager, dims, &fx.data, 0.0, 1), 3);
    assert!(manager.clumps().iter().all(|c| c.bbox.nz() == 1));
}

#[test]
fn test_link_depth_bridges_empty_plane() {
    let (nx, ny, nz) = (8, 8, 3);
    let mut data = empty_field(nx, ny, nz);
    paint_box(&mut data, nx, ny, 2, 2, 0, 3, 3, 1, 20.0);
    paint_box(&mut data, nx, ny, 2, 2, 2, 3, 3, 1, 20.0);
    let dims = GridDims::new(nx, ny, nz);

    let mut adjacent = ClumpingManager::new();
    assert_eq!(clump_float(&mut adjacent, dims, &data, 10.0, 1), 2);

    let config = ClumpingConfig {
        plane_link_depth: 2,
        ..Default::default()
    };
    let mut wide = ClumpingManager::with_config(config).unwrap();
    assert_eq!(clump_float(&mut wide, dims, &data, 10.0, 1), 1);
}

// ============================================================================
// Clump grid
// ============================================================================

#[test]
fn test_load_clump_grid() {
    let (nx, ny) = (10, 6);
    let data = rect_field(nx, ny, &[(1, 1, 3, 2, 20.0), (6, 3, 2, 2, 20.0)]);
    let dims = GridDims::plane(nx, ny);
    let mut manager = ClumpingManager::new();
    clump_float(&mut manager, dims, &data, 10.0, 1);

    let mut grid = vec![0u32; dims.len()];
    manager.load_clump_grid(&mut grid).unwrap();
    assert_eq!(grid[nx + 1], 1);
    assert_eq!(grid[3 * nx + 6], 2);
    assert_eq!(grid[0], 0);
    assert_eq!(grid.iter().filter(|&&id| id == 1).count(), 6);
    assert_eq!(grid.iter().filter(|&&id| id == 2).count(), 4);

    let mut short = vec![0u32; 5];
    assert!(matches!(
        manager.load_clump_grid(&mut short),
        Err(ClumpingError::OutputSizeMismatch { expected: 60, actual: 5 })
    ));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_zero_min_overlap_is_rejected() {
    let fx = fixtures::block_3x3();
    let mut manager = ClumpingManager::new();
    let err = manager
        .perform_clumping(
            GridDims::plane(fx.nx, fx.ny),
            Field::Float(&fx.data),
            Threshold::Float(5.0),
            0,
        )
        .unwrap_err();
    assert!(matches!(err, ClumpingError::InvalidMinOverlap(0)));
    assert!(err.is_config_error());
    assert_eq!(manager.state(), ClumpingState::Idle);
}
