//! Finalized clump properties handed to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use storm_common::{Box3d, CellVolume, GridGeom};

use crate::types::Interval;

/// How a set of clump properties came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClumpOrigin {
    /// A clump at the primary threshold, no dual-threshold processing.
    Single,
    /// A candidate containing exactly one seed, kept whole.
    DualThresholdWhole,
    /// One grown part of a candidate containing several seeds.
    DualThresholdPart,
}

/// A point in grid-index or projected space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Caller-owned description of an accepted clump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClumpProps {
    /// 1-based id, contiguous over one result vector
    pub id: u32,
    /// Member intervals in full-grid coordinates; each carries `id`
    pub intervals: Vec<Interval>,
    pub n_points: usize,
    pub volume_km3: f64,
    /// Area of the clump's projection onto the ground plane
    pub area_km2: f64,
    /// Mean cell position in grid indices
    pub centroid: Centroid,
    /// Mean cell position in grid units, with z in km
    pub centroid_km: Centroid,
    pub bbox: Box3d,
    pub origin: ClumpOrigin,
    /// Seed intervals that lie inside this clump (dual-threshold only)
    pub seed_intervals: Vec<Interval>,
    pub n_seed_points: usize,
}

impl ClumpProps {
    /// Derive properties from a non-empty set of intervals.
    pub(crate) fn from_intervals(
        id: u32,
        mut intervals: Vec<Interval>,
        geom: &GridGeom,
        origin: ClumpOrigin,
    ) -> Self {
        let mut bbox: Option<Box3d> = None;
        let mut n_points = 0usize;
        let mut volume_km3 = 0.0;
        let (mut sum_x, mut sum_y, mut sum_z) = (0.0f64, 0.0f64, 0.0f64);

        for interval in intervals.iter_mut() {
            interval.id = id;
            let n = interval.len();
            n_points += n;
            volume_km3 += n as f64 * geom.cell_volume_km3(interval.plane);

            // sum of begin..=end is n * (begin + end) / 2
            sum_x += n as f64 * (interval.begin + interval.end) as f64 / 2.0;
            sum_y += (n * interval.row_in_plane) as f64;
            sum_z += (n * interval.plane) as f64;

            match bbox.as_mut() {
                Some(b) => b.include_run(
                    interval.begin,
                    interval.end,
                    interval.row_in_plane,
                    interval.plane,
                ),
                None => {
                    bbox = Some(Box3d::from_run(
                        interval.begin,
                        interval.end,
                        interval.row_in_plane,
                        interval.plane,
                    ))
                }
            }
        }

        let centroid = if n_points > 0 {
            let n = n_points as f64;
            Centroid {
                x: sum_x / n,
                y: sum_y / n,
                z: sum_z / n,
            }
        } else {
            Centroid::default()
        };

        let centroid_km = Centroid {
            x: geom.x_coord(centroid.x),
            y: geom.y_coord(centroid.y),
            z: height_at(geom, centroid.z),
        };

        let area_km2 = projected_cells(&intervals) as f64 * geom.cell_area_km2();

        Self {
            id,
            intervals,
            n_points,
            volume_km3,
            area_km2,
            centroid,
            centroid_km,
            bbox: bbox.unwrap_or(Box3d::from_run(0, 0, 0, 0)),
            origin,
            seed_intervals: Vec::new(),
            n_seed_points: 0,
        }
    }

    /// Attach the seed intervals found inside the clump.
    pub(crate) fn with_seeds(mut self, mut seeds: Vec<Interval>) -> Self {
        for seed in seeds.iter_mut() {
            seed.id = self.id;
        }
        self.n_seed_points = seeds.iter().map(Interval::len).sum();
        self.seed_intervals = seeds;
        self
    }

    /// Number of member intervals.
    pub fn n_intervals(&self) -> usize {
        self.intervals.len()
    }

    /// Share of the clump's cells that lie in seeds.
    pub fn seed_fraction(&self) -> f64 {
        if self.n_points == 0 {
            return 0.0;
        }
        self.n_seed_points as f64 / self.n_points as f64
    }
}

/// Height of a fractional plane index, interpolated between levels.
fn height_at(geom: &GridGeom, z: f64) -> f64 {
    let lower = z.floor().max(0.0) as usize;
    let frac = z - lower as f64;
    let z0 = geom.z_coord(lower);
    if frac <= 0.0 || lower + 1 >= geom.nz() {
        return z0;
    }
    z0 + frac * (geom.z_coord(lower + 1) - z0)
}

/// Number of distinct (x, y) columns covered by the intervals.
fn projected_cells(intervals: &[Interval]) -> usize {
    let mut by_row: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
    for interval in intervals {
        by_row
            .entry(interval.row_in_plane)
            .or_default()
            .push((interval.begin, interval.end));
    }

    let mut count = 0;
    for runs in by_row.values_mut() {
        runs.sort_unstable();
        let (mut begin, mut end) = runs[0];
        for &(b, e) in &runs[1..] {
            if b > end + 1 {
                count += end - begin + 1;
                begin = b;
                end = e;
            } else {
                end = end.max(e);
            }
        }
        count += end - begin + 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    fn iv(plane: usize, row: usize, begin: usize, end: usize) -> Interval {
        Interval {
            id: 0,
            plane,
            row_in_plane: row,
            row_in_vol: row,
            begin,
            end,
        }
    }

    #[test]
    fn test_centroid_and_bbox() {
        let geom = GridGeom::flat(10, 10, 2.0, 2.0).with_origin(100.0, 50.0);
        let intervals = vec![iv(0, 2, 2, 4), iv(0, 3, 2, 4), iv(0, 4, 2, 4)];
        let props = ClumpProps::from_intervals(7, intervals, &geom, ClumpOrigin::Single);

        assert_eq!(props.n_points, 9);
        assert_eq!(props.n_intervals(), 3);
        assert!(props.intervals.iter().all(|i| i.id == 7));
        assert_approx_eq!(props.centroid.x, 3.0, 1e-12);
        assert_approx_eq!(props.centroid.y, 3.0, 1e-12);
        assert_approx_eq!(props.centroid_km.x, 106.0, 1e-12);
        assert_approx_eq!(props.centroid_km.y, 56.0, 1e-12);
        assert_eq!((props.bbox.xmin, props.bbox.xmax), (2, 4));
        assert_approx_eq!(props.area_km2, 36.0, 1e-9);
    }

    #[test]
    fn test_area_counts_columns_once() {
        let geom = GridGeom::flat(10, 10, 1.0, 1.0).with_uniform_z(3, 1.0, 1.0);
        let intervals = vec![iv(0, 1, 0, 3), iv(1, 1, 2, 5), iv(2, 1, 8, 8)];
        let props = ClumpProps::from_intervals(1, intervals, &geom, ClumpOrigin::Single);
        assert_eq!(props.n_points, 9);
        // columns 0..=5 and 8
        assert_approx_eq!(props.area_km2, 7.0, 1e-12);
        assert_approx_eq!(props.volume_km3, 9.0, 1e-12);
    }

    #[test]
    fn test_height_interpolation() {
        let geom = GridGeom::flat(4, 4, 1.0, 1.0).with_z_levels(vec![1.0, 2.0, 4.0]);
        assert_approx_eq!(height_at(&geom, 0.0), 1.0, 1e-12);
        assert_approx_eq!(height_at(&geom, 1.5), 3.0, 1e-12);
        assert_approx_eq!(height_at(&geom, 2.0), 4.0, 1e-12);
    }

    #[test]
    fn test_seed_fraction() {
        let geom = GridGeom::flat(10, 10, 1.0, 1.0);
        let props = ClumpProps::from_intervals(
            1,
            vec![iv(0, 0, 0, 9)],
            &geom,
            ClumpOrigin::DualThresholdWhole,
        )
        .with_seeds(vec![iv(0, 0, 3, 5)]);
        assert_eq!(props.n_seed_points, 3);
        assert_approx_eq!(props.seed_fraction(), 0.3, 1e-12);
    }
}
