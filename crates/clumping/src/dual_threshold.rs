//! Dual-threshold growing.
//!
//! Strong cores found at the secondary threshold act as seeds. Each clump
//! found at the primary threshold is a candidate: it must contain seeds
//! holding enough of its volume, and when it holds several seeds it is split by
//! growing every seed outwards through the candidate's cells, one ring at a
//! time, until the cells are exhausted. Each grown part must be large
//! enough on its own, and the whole must fall inside the volume bounds, or
//! the candidate is dropped with all of its seeds.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use storm_common::{CellVolume, GridDims, GridGeom};

use crate::arena::Arena;
use crate::config::DualThresholdConfig;
use crate::error::Result;
use crate::manager::ClumpingManager;
use crate::props::{ClumpOrigin, ClumpProps};
use crate::types::{Clump, Field, Interval, Threshold};

/// Owner value of a candidate cell no seed has reached yet.
const UNCLAIMED: u32 = u32::MAX;

/// Counts from the last dual-threshold run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualThresholdStats {
    /// Clumps at the secondary threshold
    pub n_seed_clumps: usize,
    /// Clumps at the primary threshold
    pub n_candidates: usize,
    pub n_accepted: usize,
    pub n_rejected: usize,
    /// Props produced by accepted candidates
    pub n_props: usize,
}

/// Why a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    NoSeed,
    FractionAll,
    FractionEach,
    SizeEach,
    Volume,
}

impl Rejection {
    fn as_str(&self) -> &'static str {
        match self {
            Self::NoSeed => "no seed",
            Self::FractionAll => "seed volume fraction below min_fraction_all_parts",
            Self::FractionEach => "part volume fraction below min_fraction_each_part",
            Self::SizeEach => "part smaller than min_size_each_part",
            Self::Volume => "volume outside bounds",
        }
    }
}

/// One accepted part of a candidate, in full-grid coordinates.
struct Part {
    intervals: Vec<Interval>,
    seeds: Vec<Interval>,
}

/// Runs the two clumping passes and the seed growth.
#[derive(Debug)]
pub(crate) struct DualThresholdGrower {
    config: DualThresholdConfig,
    valid: ClumpingManager,
    part: ClumpingManager,
    owner: Arena<u32>,
    part_field: Arena<f32>,
    queue: VecDeque<usize>,
    stats: DualThresholdStats,
}

impl DualThresholdGrower {
    pub(crate) fn new(config: DualThresholdConfig, plane_link_depth: usize) -> Self {
        Self {
            config,
            valid: ClumpingManager::with_plane_link_depth(plane_link_depth),
            part: ClumpingManager::with_plane_link_depth(plane_link_depth),
            owner: Arena::new(),
            part_field: Arena::new(),
            queue: VecDeque::new(),
            stats: DualThresholdStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> DualThresholdStats {
        self.stats
    }

    /// Clump `field` at both thresholds and return the accepted props.
    ///
    /// `primary` is left holding the clumps at the primary threshold.
    pub(crate) fn grow(
        &mut self,
        primary: &mut ClumpingManager,
        geom: &GridGeom,
        field: Field<'_>,
        threshold: Threshold,
        min_overlap: usize,
        min_volume_km3: f64,
    ) -> Result<Vec<ClumpProps>> {
        self.config.check_primary(threshold.value())?;
        let secondary = Threshold::for_field(&field, self.config.secondary_threshold)?;
        let dims = geom.dims();

        let n_seed_clumps = self
            .valid
            .perform_clumping(dims, field, secondary, min_overlap)?;
        let n_candidates = primary.perform_clumping(dims, field, threshold, min_overlap)?;
        let primary: &ClumpingManager = primary;

        let seed_groups: Vec<Vec<Interval>> = self
            .valid
            .clumps()
            .iter()
            .map(|clump| self.valid.clump_intervals(clump).copied().collect())
            .collect();

        let mut seeds_of: Vec<Vec<usize>> = vec![Vec::new(); n_candidates];
        for (k, group) in seed_groups.iter().enumerate() {
            let candidate = group.first().and_then(|seed| containing_clump(primary, seed));
            if let Some(id) = candidate {
                seeds_of[id as usize - 1].push(k);
            }
        }

        self.stats = DualThresholdStats {
            n_seed_clumps,
            n_candidates,
            ..Default::default()
        };

        let min_volume = self.config.min_clump_volume_km3.max(min_volume_km3);
        let mut props = Vec::new();

        for (candidate, seeds) in primary.clumps().iter().zip(&seeds_of) {
            let seed_volume = volume_km3(seeds.iter().flat_map(|&k| &seed_groups[k]), geom);
            let candidate_volume = volume_km3(primary.clump_intervals(candidate), geom);
            let fraction_all = seed_volume / candidate_volume;

            let outcome = self.evaluate(
                primary,
                candidate,
                seeds,
                &seed_groups,
                fraction_all,
                candidate_volume,
                geom,
                min_volume,
            )?;

            match outcome {
                Ok(parts) => {
                    self.stats.n_accepted += 1;
                    self.log_decision(candidate, seeds.len(), fraction_all, "accepted");
                    let origin = if parts.len() == 1 {
                        ClumpOrigin::DualThresholdWhole
                    } else {
                        ClumpOrigin::DualThresholdPart
                    };
                    for part in parts {
                        let id = props.len() as u32 + 1;
                        props.push(
                            ClumpProps::from_intervals(id, part.intervals, geom, origin)
                                .with_seeds(part.seeds),
                        );
                    }
                }
                Err(rejection) => {
                    self.stats.n_rejected += 1;
                    self.log_decision(candidate, seeds.len(), fraction_all, rejection.as_str());
                }
            }
        }

        self.stats.n_props = props.len();
        tracing::debug!(
            n_seed_clumps,
            n_candidates,
            n_accepted = self.stats.n_accepted,
            n_rejected = self.stats.n_rejected,
            n_props = props.len(),
            "Dual-threshold growing complete"
        );

        Ok(props)
    }

    /// Apply the acceptance criteria to one candidate.
    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &mut self,
        primary: &ClumpingManager,
        candidate: &Clump,
        seeds: &[usize],
        seed_groups: &[Vec<Interval>],
        fraction_all: f64,
        candidate_volume: f64,
        geom: &GridGeom,
        min_volume: f64,
    ) -> Result<std::result::Result<Vec<Part>, Rejection>> {
        if seeds.is_empty() {
            return Ok(Err(Rejection::NoSeed));
        }
        if fraction_all < self.config.min_fraction_all_parts {
            return Ok(Err(Rejection::FractionAll));
        }

        let parts = if seeds.len() == 1 {
            vec![Part {
                intervals: primary.clump_intervals(candidate).copied().collect(),
                seeds: seed_groups[seeds[0]].clone(),
            }]
        } else {
            self.split(primary, candidate, seeds, seed_groups, geom.dims())?
        };

        let mut volume = 0.0;
        for part in &parts {
            let part_volume = volume_km3(&part.intervals, geom);
            if part_volume / candidate_volume < self.config.min_fraction_each_part {
                return Ok(Err(Rejection::FractionEach));
            }
            if part.intervals.len() < self.config.min_size_each_part {
                return Ok(Err(Rejection::SizeEach));
            }
            volume += part_volume;
        }

        if volume < min_volume || volume > self.config.max_clump_volume_km3 {
            return Ok(Err(Rejection::Volume));
        }

        Ok(Ok(parts))
    }

    /// Grow every seed through the candidate and return one part per seed.
    ///
    /// Works on the candidate's x/y bounding box with all planes. Cells at
    /// equal distance from two seeds go to the seed listed first.
    fn split(
        &mut self,
        primary: &ClumpingManager,
        candidate: &Clump,
        seeds: &[usize],
        seed_groups: &[Vec<Interval>],
        dims: GridDims,
    ) -> Result<Vec<Part>> {
        let b = candidate.bbox;
        let crop = GridDims::new(b.nx(), b.ny(), dims.nz);
        let local = |x: usize, row: usize, plane: usize| {
            crop.offset(x - b.xmin, row - b.ymin, plane)
        };

        self.owner.fill(crop.len(), 0)?;
        for iv in primary.clump_intervals(candidate) {
            for x in iv.begin..=iv.end {
                self.owner[local(x, iv.row_in_plane, iv.plane)] = UNCLAIMED;
            }
        }

        self.queue.clear();
        for (i, &k) in seeds.iter().enumerate() {
            let label = i as u32 + 1;
            for iv in &seed_groups[k] {
                for x in iv.begin..=iv.end {
                    let idx = local(x, iv.row_in_plane, iv.plane);
                    self.owner[idx] = label;
                    self.queue.push_back(idx);
                }
            }
        }

        while let Some(idx) = self.queue.pop_front() {
            let label = self.owner[idx];
            for next in face_neighbours(crop, idx).into_iter().flatten() {
                if self.owner[next] == UNCLAIMED {
                    self.owner[next] = label;
                    self.queue.push_back(next);
                }
            }
        }

        let mut parts = Vec::with_capacity(seeds.len());
        for (i, &k) in seeds.iter().enumerate() {
            let label = i as u32 + 1;
            self.part_field.fill(crop.len(), 0.0)?;
            for (value, &owner) in self.part_field.iter_mut().zip(self.owner.iter()) {
                if owner == label {
                    *value = 1.0;
                }
            }

            self.part
                .find_intervals(crop, Field::Float(&self.part_field[..]), Threshold::Float(0.5))?;
            self.part
                .add_xy_offset_to_intervals(b.xmin as isize, b.ymin as isize, dims.ny)?;
            let intervals = self.part.intervals().to_vec();

            parts.push(Part {
                intervals,
                seeds: seed_groups[k].clone(),
            });
        }

        Ok(parts)
    }

    fn log_decision(&self, candidate: &Clump, n_seeds: usize, fraction_all: f64, decision: &str) {
        if self.config.debug {
            tracing::info!(
                candidate = candidate.id,
                n_points = candidate.n_points,
                n_seeds,
                fraction_all,
                decision,
                "Dual-threshold candidate"
            );
        } else {
            tracing::debug!(
                candidate = candidate.id,
                n_points = candidate.n_points,
                n_seeds,
                fraction_all,
                decision,
                "Dual-threshold candidate"
            );
        }
    }
}

/// Physical volume of a set of intervals.
fn volume_km3<'a>(intervals: impl IntoIterator<Item = &'a Interval>, geom: &GridGeom) -> f64 {
    intervals
        .into_iter()
        .map(|iv| iv.len() as f64 * geom.cell_volume_km3(iv.plane))
        .sum()
}

/// Id of the primary clump whose interval contains the first cell of `seed`.
fn containing_clump(primary: &ClumpingManager, seed: &Interval) -> Option<u32> {
    let row = primary.row_intervals(seed.row_in_plane, seed.plane);
    let idx = row.partition_point(|iv| iv.end < seed.begin);
    row.get(idx)
        .filter(|iv| iv.begin <= seed.begin)
        .map(|iv| iv.id)
}

/// Face-adjacent cells of `idx` inside `dims`.
fn face_neighbours(dims: GridDims, idx: usize) -> [Option<usize>; 6] {
    let plane = dims.plane_len();
    let x = idx % dims.nx;
    let y = (idx / dims.nx) % dims.ny;
    let z = idx / plane;
    [
        (x > 0).then(|| idx - 1),
        (x + 1 < dims.nx).then(|| idx + 1),
        (y > 0).then(|| idx - dims.nx),
        (y + 1 < dims.ny).then(|| idx + dims.nx),
        (z > 0).then(|| idx - plane),
        (z + 1 < dims.nz).then(|| idx + plane),
    ]
}
