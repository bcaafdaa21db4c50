//! Common test fixtures for clumping tests.
//!
//! Each fixture is a small synthetic field that exercises one behaviour of
//! the engine. Values are in dBZ-like units; the usual thresholds are
//! [`PRIMARY_THRESHOLD`] for the loose pass and [`SECONDARY_THRESHOLD`] for
//! the strict pass.

use crate::generators::{empty_field, paint_rect};

/// Loose threshold used by the dual-threshold fixtures.
pub const PRIMARY_THRESHOLD: f32 = 10.0;

/// Strict threshold used by the dual-threshold fixtures.
pub const SECONDARY_THRESHOLD: f32 = 40.0;

/// A synthetic field and its dimensions.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub data: Vec<f32>,
}

/// 10x10 grid with a 3x3 block of 10 at rows 2-4, columns 2-4.
pub fn block_3x3() -> Fixture {
    let (nx, ny) = (10, 10);
    let mut data = empty_field(nx, ny, 1);
    paint_rect(&mut data, nx, ny, 0, 2, 2, 3, 3, 10.0);
    Fixture { nx, ny, nz: 1, data }
}

/// One echo with two strong cores joined by a weaker band.
///
/// Envelope: 26x6 cells of 20 at (2, 3). Cores: 6x4 cells of 50 at
/// (4, 4) and (19, 4).
pub fn twin_cores() -> Fixture {
    let (nx, ny) = (30, 12);
    let mut data = empty_field(nx, ny, 1);
    paint_rect(&mut data, nx, ny, 0, 2, 3, 26, 6, 20.0);
    paint_rect(&mut data, nx, ny, 0, 4, 4, 6, 4, 50.0);
    paint_rect(&mut data, nx, ny, 0, 19, 4, 6, 4, 50.0);
    Fixture { nx, ny, nz: 1, data }
}

/// Two separate echoes, one dominated by weak returns.
///
/// Left echo: 20x10 cells of 20 at (2, 2) around a 2x2 core of 50, so the
/// core is 2% of the echo. Right echo: 6x6 cells of 20 at (26, 3) around a
/// 4x4 core of 50, so the core is 44% of the echo.
pub fn weak_and_strong() -> Fixture {
    let (nx, ny) = (40, 14);
    let mut data = empty_field(nx, ny, 1);
    paint_rect(&mut data, nx, ny, 0, 2, 2, 20, 10, 20.0);
    paint_rect(&mut data, nx, ny, 0, 10, 6, 2, 2, 50.0);
    paint_rect(&mut data, nx, ny, 0, 26, 3, 6, 6, 20.0);
    paint_rect(&mut data, nx, ny, 0, 27, 4, 4, 4, 50.0);
    Fixture { nx, ny, nz: 1, data }
}

/// A three-plane echo: a 4x4 column through all planes plus a 3x2
/// overhang extending the top plane eastwards.
pub fn column_with_overhang() -> Fixture {
    let (nx, ny, nz) = (12, 12, 3);
    let mut data = empty_field(nx, ny, nz);
    for z in 0..nz {
        paint_rect(&mut data, nx, ny, z, 3, 3, 4, 4, 30.0);
    }
    paint_rect(&mut data, nx, ny, 2, 7, 3, 3, 2, 30.0);
    Fixture { nx, ny, nz, data }
}

/// A three-plane echo with its two cores in different planes.
///
/// Envelope: 8x2 cells of 20 at (2, 1) in every plane. Cores: 2x2 cells of
/// 50 at (2, 1) in plane 0 and at (8, 1) in plane 2.
pub fn stacked_cores() -> Fixture {
    let (nx, ny, nz) = (12, 4, 3);
    let mut data = empty_field(nx, ny, nz);
    for z in 0..nz {
        paint_rect(&mut data, nx, ny, z, 2, 1, 8, 2, 20.0);
    }
    paint_rect(&mut data, nx, ny, 0, 2, 1, 2, 2, 50.0);
    paint_rect(&mut data, nx, ny, 2, 8, 1, 2, 2, 50.0);
    Fixture { nx, ny, nz, data }
}
