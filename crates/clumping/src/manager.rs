//! The clumping façade.
//!
//! [`ClumpingManager`] owns every buffer the engine needs and sequences the
//! stages:
//!
//! ```text
//! Idle -> IntervalsFound -> Clumped -> EdmComputed / Eroded -> DualThresholdGrown -> Finalized
//! ```
//!
//! Running a stage discards the results of every later stage. Accessors
//! borrow the manager's buffers; the views stay valid until the next
//! mutating call.

use std::fmt;

use serde::{Deserialize, Serialize};
use storm_common::{CellVolume, GridDims, GridGeom};

use crate::arena::Arena;
use crate::config::{ClumpingConfig, DualThresholdConfig};
use crate::dual_threshold::{DualThresholdGrower, DualThresholdStats};
use crate::edm::{EdmMode, EdmWorkspace, ErosionSummary};
use crate::error::{ClumpingError, Result};
use crate::intervals;
use crate::labeler::{ClumpLabeler, LinkOptions};
use crate::props::{ClumpOrigin, ClumpProps};
use crate::types::{Clump, Field, Interval, RowHeader, Threshold};

/// Stage reached by a [`ClumpingManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClumpingState {
    Idle,
    IntervalsFound,
    Clumped,
    EdmComputed,
    Eroded,
    DualThresholdGrown,
    Finalized,
}

impl ClumpingState {
    /// Get the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::IntervalsFound => "intervals_found",
            Self::Clumped => "clumped",
            Self::EdmComputed => "edm_computed",
            Self::Eroded => "eroded",
            Self::DualThresholdGrown => "dual_threshold_grown",
            Self::Finalized => "finalized",
        }
    }

    /// True once intervals are available.
    pub fn has_intervals(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// True once intervals carry clump ids.
    pub fn has_clumps(&self) -> bool {
        !matches!(self, Self::Idle | Self::IntervalsFound)
    }
}

impl fmt::Display for ClumpingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// High-water marks of the manager's arenas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaStats {
    pub row_headers: usize,
    pub intervals: usize,
    pub clumps: usize,
    pub grid_cells: usize,
}

/// Connected-component clumping of gridded fields.
///
/// One instance is meant for one thread; it holds no locks.
#[derive(Debug)]
pub struct ClumpingManager {
    config: ClumpingConfig,
    state: ClumpingState,
    dims: GridDims,
    x_offset: isize,
    y_offset: isize,

    rows: Arena<RowHeader>,
    intervals: Arena<Interval>,
    order: Arena<usize>,
    clumps: Arena<Clump>,
    labeler: ClumpLabeler,

    label_grid: Arena<u32>,
    edm_grid: Arena<f32>,
    edm_mode: Option<EdmMode>,
    edm_workspace: EdmWorkspace,

    grower: Option<Box<DualThresholdGrower>>,
}

impl Default for ClumpingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClumpingManager {
    /// Create a manager with the default configuration.
    pub fn new() -> Self {
        Self {
            config: ClumpingConfig::default(),
            state: ClumpingState::Idle,
            dims: GridDims::new(0, 0, 0),
            x_offset: 0,
            y_offset: 0,
            rows: Arena::new(),
            intervals: Arena::new(),
            order: Arena::new(),
            clumps: Arena::new(),
            labeler: ClumpLabeler::default(),
            label_grid: Arena::new(),
            edm_grid: Arena::new(),
            edm_mode: None,
            edm_workspace: EdmWorkspace::default(),
            grower: None,
        }
    }

    /// Create a single-threshold manager linking `plane_link_depth` planes.
    pub(crate) fn with_plane_link_depth(plane_link_depth: usize) -> Self {
        let mut manager = Self::new();
        manager.config.plane_link_depth = plane_link_depth;
        manager
    }

    /// Create a manager from a validated configuration.
    pub fn with_config(config: ClumpingConfig) -> Result<Self> {
        config.validate()?;
        let mut manager = Self::with_plane_link_depth(config.plane_link_depth);
        if let Some(dual) = config.dual_threshold {
            manager.set_use_dual_thresholds(dual)?;
        }
        Ok(manager)
    }

    /// Enable dual-threshold growing for [`load_clump_vector`](Self::load_clump_vector).
    pub fn set_use_dual_thresholds(&mut self, dual: DualThresholdConfig) -> Result<()> {
        dual.validate()?;
        self.grower = Some(Box::new(DualThresholdGrower::new(
            dual.clone(),
            self.config.plane_link_depth,
        )));
        self.config.dual_threshold = Some(dual);
        Ok(())
    }

    /// Return to single-threshold output.
    pub fn clear_dual_thresholds(&mut self) {
        self.grower = None;
        self.config.dual_threshold = None;
    }

    /// Current configuration.
    pub fn config(&self) -> &ClumpingConfig {
        &self.config
    }

    /// Stage reached so far.
    pub fn state(&self) -> ClumpingState {
        self.state
    }

    /// Dimensions of the last grid processed.
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Statistics from the last dual-threshold run, if any.
    pub fn dual_threshold_stats(&self) -> Option<DualThresholdStats> {
        self.grower.as_ref().map(|g| g.stats())
    }

    /// Largest sizes the arenas have reached.
    pub fn arena_stats(&self) -> ArenaStats {
        ArenaStats {
            row_headers: self.rows.high_water(),
            intervals: self.intervals.high_water(),
            clumps: self.clumps.high_water(),
            grid_cells: self.label_grid.high_water().max(self.edm_grid.high_water()),
        }
    }

    // ========================================================================
    // Stages
    // ========================================================================

    /// Extract the intervals of `field` above `threshold`.
    ///
    /// Returns the number of intervals. Clumps, distance maps and offsets
    /// from earlier calls are discarded.
    pub fn find_intervals(
        &mut self,
        dims: GridDims,
        field: Field<'_>,
        threshold: Threshold,
    ) -> Result<usize> {
        let result = intervals::find_intervals(
            dims,
            field,
            threshold,
            &mut self.rows,
            &mut self.intervals,
        );

        let n_intervals = match result {
            Ok(n) => n,
            Err(err) => {
                if !err.is_config_error() {
                    self.reset_to_idle();
                }
                return Err(err);
            }
        };

        self.dims = dims;
        self.x_offset = 0;
        self.y_offset = 0;
        self.clumps.reset();
        self.order.reset();
        self.edm_mode = None;
        self.state = ClumpingState::IntervalsFound;

        tracing::debug!(
            nx = dims.nx,
            ny = dims.ny,
            nz = dims.nz,
            threshold = threshold.value(),
            n_intervals,
            "Found intervals"
        );

        Ok(n_intervals)
    }

    /// Find intervals and group them into clumps.
    ///
    /// Intervals in neighbouring rows are connected when they share at
    /// least `min_overlap` columns. Returns the number of clumps.
    pub fn perform_clumping(
        &mut self,
        dims: GridDims,
        field: Field<'_>,
        threshold: Threshold,
        min_overlap: usize,
    ) -> Result<usize> {
        if min_overlap < 1 {
            return Err(ClumpingError::InvalidMinOverlap(min_overlap));
        }

        self.find_intervals(dims, field, threshold)?;

        let opts = LinkOptions {
            min_overlap,
            plane_link_depth: self.config.plane_link_depth,
        };
        let labeled = self
            .labeler
            .label(dims, &self.rows, &mut self.intervals, opts)
            .and_then(|n_clumps| {
                self.labeler.build_clumps(
                    &self.intervals,
                    n_clumps,
                    &mut self.clumps,
                    &mut self.order,
                )?;
                Ok(n_clumps)
            });

        let n_clumps = match labeled {
            Ok(n) => n,
            Err(err) => {
                self.reset_to_idle();
                return Err(err);
            }
        };
        self.state = ClumpingState::Clumped;

        tracing::debug!(
            n_intervals = self.intervals.len(),
            n_clumps,
            min_overlap,
            "Clumping complete"
        );

        Ok(n_clumps)
    }

    /// Paint every clump cell with its clump id, 0 elsewhere.
    pub fn load_clump_grid(&self, out: &mut [u32]) -> Result<()> {
        self.require_clumps("load_clump_grid")?;
        self.check_output(out.len())?;
        self.paint_labels(out);
        Ok(())
    }

    /// Distance map computed plane by plane. Returns the largest distance.
    pub fn edm_2d(&mut self, out: &mut [f32]) -> Result<f32> {
        self.compute_edm("edm_2d", EdmMode::Planar, out)
    }

    /// Distance map computed through the whole volume. Returns the largest
    /// distance.
    pub fn edm_3d(&mut self, out: &mut [f32]) -> Result<f32> {
        self.compute_edm("edm_3d", EdmMode::Volume, out)
    }

    /// Distance of every background cell to the nearest clump cell,
    /// computed plane by plane; clump cells get 0. Returns the largest
    /// distance.
    ///
    /// Does not replace the distance map [`erode`](Self::erode) works from.
    pub fn inverse_edm_2d(&mut self, out: &mut [f32]) -> Result<f32> {
        self.require_clumps("inverse_edm_2d")?;
        self.check_output(out.len())?;

        self.refresh_labels()?;
        let max = self.edm_workspace.compute_inverse(
            self.dims,
            &self.label_grid,
            EdmMode::Planar,
            out,
        )?;
        self.state = ClumpingState::EdmComputed;

        tracing::debug!(max_distance = max, "Inverse distance map computed");
        Ok(max)
    }

    /// Keep the clump cells whose distance to the background is at least
    /// `threshold`, writing their clump ids to `out`.
    ///
    /// Uses the distance map of the last `edm_2d`/`edm_3d` call, or a
    /// volume distance map when none was computed for these clumps.
    pub fn erode(&mut self, out: &mut [u32], threshold: f32) -> Result<ErosionSummary> {
        self.require_clumps("erode")?;
        self.check_output(out.len())?;
        if threshold.is_nan() {
            return Err(ClumpingError::invalid_config("erosion threshold is NaN"));
        }

        if self.edm_mode.is_none() {
            self.refresh_edm(EdmMode::Volume)?;
        }

        let summary = self.edm_workspace.erode(
            &self.label_grid,
            &self.edm_grid,
            threshold,
            self.clumps.len(),
            out,
        )?;
        self.state = ClumpingState::Eroded;

        tracing::debug!(
            threshold,
            cells_before = summary.n_cells_before,
            cells_after = summary.n_cells_after,
            surviving = summary.surviving.len(),
            removed = summary.removed.len(),
            "Erosion complete"
        );

        Ok(summary)
    }

    /// Shift every interval by `(dx, dy)` cells.
    ///
    /// Used when intervals were found on a cropped grid and must be
    /// expressed in the coordinates of a full grid with `full_ny` rows per
    /// plane. `row_in_vol` is rebuilt as `plane * full_ny + row_in_plane`.
    /// Grid outputs of this manager keep addressing the grid the intervals
    /// were found on.
    pub fn add_xy_offset_to_intervals(
        &mut self,
        dx: isize,
        dy: isize,
        full_ny: usize,
    ) -> Result<()> {
        if !self.state.has_intervals() {
            return Err(ClumpingError::invalid_state(
                "add_xy_offset_to_intervals",
                self.state,
            ));
        }

        for interval in self.intervals.iter() {
            if (interval.begin as isize) + dx < 0 {
                return Err(ClumpingError::CoordinateUnderflow { axis: "x", offset: dx });
            }
            let row = interval.row_in_plane as isize + dy;
            if row < 0 {
                return Err(ClumpingError::CoordinateUnderflow { axis: "y", offset: dy });
            }
            if row as usize >= full_ny {
                return Err(ClumpingError::RowOutsideGrid {
                    row: row as usize,
                    ny: full_ny,
                });
            }
        }

        for interval in self.intervals.iter_mut() {
            interval.begin = (interval.begin as isize + dx) as usize;
            interval.end = (interval.end as isize + dx) as usize;
            interval.row_in_plane = (interval.row_in_plane as isize + dy) as usize;
            interval.row_in_vol = interval.plane * full_ny + interval.row_in_plane;
        }

        for clump in self.clumps.iter_mut() {
            let b = &mut clump.bbox;
            b.xmin = (b.xmin as isize + dx) as usize;
            b.xmax = (b.xmax as isize + dx) as usize;
            b.ymin = (b.ymin as isize + dy) as usize;
            b.ymax = (b.ymax as isize + dy) as usize;
        }

        self.x_offset += dx;
        self.y_offset += dy;
        Ok(())
    }

    /// Clump `field` and return one [`ClumpProps`] per accepted clump.
    ///
    /// Without dual thresholds every clump whose volume is at least
    /// `min_volume_km3` is returned. With dual thresholds each candidate
    /// is grown from its seeds and filtered; see
    /// [`DualThresholdConfig`].
    pub fn load_clump_vector(
        &mut self,
        geom: &GridGeom,
        field: Field<'_>,
        threshold: Threshold,
        min_overlap: usize,
        min_volume_km3: f64,
    ) -> Result<Vec<ClumpProps>> {
        geom.validate()?;
        if min_volume_km3.is_nan() {
            return Err(ClumpingError::invalid_config("min_volume_km3 is NaN"));
        }

        let props = match self.grower.take() {
            Some(mut grower) => {
                let result =
                    grower.grow(self, geom, field, threshold, min_overlap, min_volume_km3);
                self.grower = Some(grower);
                let props = result?;
                self.state = ClumpingState::DualThresholdGrown;
                props
            }
            None => {
                let dims = geom.dims();
                self.perform_clumping(dims, field, threshold, min_overlap)?;
                self.single_threshold_props(geom, min_volume_km3)
            }
        };

        self.state = ClumpingState::Finalized;
        tracing::debug!(n_props = props.len(), "Clump vector loaded");
        Ok(props)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of intervals from the last call.
    pub fn n_intervals(&self) -> usize {
        self.intervals.len()
    }

    /// All intervals in scan order.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// One header per row, indexed by `plane * ny + row_in_plane`.
    pub fn row_headers(&self) -> &[RowHeader] {
        &self.rows
    }

    /// Intervals of row `y` in plane `z`; empty outside the grid.
    pub fn row_intervals(&self, y: usize, z: usize) -> &[Interval] {
        if y >= self.dims.ny || z >= self.dims.nz {
            return &[];
        }
        self.rows
            .get(z * self.dims.ny + y)
            .map(|row| &self.intervals[row.range()])
            .unwrap_or(&[])
    }

    /// Number of clumps from the last clumping.
    pub fn n_clumps(&self) -> usize {
        self.clumps.len()
    }

    /// All clumps, ordered by id.
    pub fn clumps(&self) -> &[Clump] {
        &self.clumps
    }

    /// Look up a clump by its 1-based id.
    pub fn clump(&self, id: u32) -> Option<&Clump> {
        (id as usize).checked_sub(1).and_then(|k| self.clumps.get(k))
    }

    /// Member intervals of a clump, in scan order.
    pub fn clump_intervals<'a>(&'a self, clump: &Clump) -> impl Iterator<Item = &'a Interval> + 'a {
        let end = (clump.order_start + clump.n_intervals).min(self.order.len());
        let start = clump.order_start.min(end);
        self.order[start..end].iter().map(move |&i| &self.intervals[i])
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn reset_to_idle(&mut self) {
        self.rows.reset();
        self.intervals.reset();
        self.clumps.reset();
        self.order.reset();
        self.edm_mode = None;
        self.state = ClumpingState::Idle;
    }

    fn require_clumps(&self, operation: &'static str) -> Result<()> {
        if self.state.has_clumps() {
            Ok(())
        } else {
            Err(ClumpingError::invalid_state(operation, self.state))
        }
    }

    fn check_output(&self, len: usize) -> Result<()> {
        if len != self.dims.len() {
            return Err(ClumpingError::output_size(self.dims.len(), len));
        }
        Ok(())
    }

    /// Grid coordinates of an interval on the grid it was found on.
    fn local_run(&self, interval: &Interval) -> (usize, usize, usize) {
        let begin = (interval.begin as isize - self.x_offset) as usize;
        let end = (interval.end as isize - self.x_offset) as usize;
        let row = (interval.row_in_plane as isize - self.y_offset) as usize;
        (begin, end, row)
    }

    fn paint_labels(&self, out: &mut [u32]) {
        out.fill(0);
        for interval in self.intervals.iter() {
            let (begin, end, row) = self.local_run(interval);
            let offset = self.dims.row_offset(row, interval.plane);
            out[offset + begin..=offset + end].fill(interval.id);
        }
    }

    fn refresh_labels(&mut self) -> Result<()> {
        self.label_grid.fill(self.dims.len(), 0)?;
        let mut labels = std::mem::take(&mut self.label_grid);
        self.paint_labels(&mut labels);
        self.label_grid = labels;
        Ok(())
    }

    fn refresh_edm(&mut self, mode: EdmMode) -> Result<f32> {
        self.refresh_labels()?;
        self.edm_grid.fill(self.dims.len(), 0.0)?;

        let max = self.edm_workspace.compute(
            self.dims,
            &self.label_grid,
            mode,
            &mut self.edm_grid,
        )?;
        self.edm_mode = Some(mode);

        tracing::debug!(mode = ?mode, max_distance = max, "Distance map computed");
        Ok(max)
    }

    fn compute_edm(
        &mut self,
        operation: &'static str,
        mode: EdmMode,
        out: &mut [f32],
    ) -> Result<f32> {
        self.require_clumps(operation)?;
        self.check_output(out.len())?;
        let max = self.refresh_edm(mode)?;
        out.copy_from_slice(&self.edm_grid);
        self.state = ClumpingState::EdmComputed;
        Ok(max)
    }

    fn single_threshold_props(&self, geom: &GridGeom, min_volume_km3: f64) -> Vec<ClumpProps> {
        let mut props = Vec::new();
        for clump in self.clumps.iter() {
            let volume: f64 = self
                .clump_intervals(clump)
                .map(|iv| iv.len() as f64 * geom.cell_volume_km3(iv.plane))
                .sum();
            if volume < min_volume_km3 {
                tracing::debug!(clump = clump.id, volume_km3 = volume, "Clump below minimum volume");
                continue;
            }
            let intervals: Vec<Interval> = self.clump_intervals(clump).copied().collect();
            let id = props.len() as u32 + 1;
            props.push(ClumpProps::from_intervals(
                id,
                intervals,
                geom,
                ClumpOrigin::Single,
            ));
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures;

    #[test]
    fn test_state_display() {
        assert_eq!(ClumpingState::Idle.to_string(), "idle");
        assert_eq!(ClumpingState::EdmComputed.to_string(), "edm_computed");
        assert!(!ClumpingState::IntervalsFound.has_clumps());
        assert!(ClumpingState::Eroded.has_clumps());
    }

    #[test]
    fn test_edm_before_clumping_is_invalid_state() {
        let mut manager = ClumpingManager::new();
        let mut out = vec![0.0f32; 4];
        let err = manager.edm_2d(&mut out).unwrap_err();
        assert!(matches!(
            err,
            ClumpingError::InvalidState {
                state: ClumpingState::Idle,
                ..
            }
        ));
    }

    #[test]
    fn test_rerun_discards_later_stages() {
        let fx = fixtures::block_3x3();
        let dims = GridDims::plane(fx.nx, fx.ny);
        let mut manager = ClumpingManager::new();
        manager
            .perform_clumping(dims, Field::Float(&fx.data), Threshold::Float(5.0), 1)
            .unwrap();
        let mut edm = vec![0.0f32; dims.len()];
        manager.edm_2d(&mut edm).unwrap();
        assert_eq!(manager.state(), ClumpingState::EdmComputed);

        manager
            .find_intervals(dims, Field::Float(&fx.data), Threshold::Float(5.0))
            .unwrap();
        assert_eq!(manager.state(), ClumpingState::IntervalsFound);
        assert_eq!(manager.n_clumps(), 0);
        assert!(manager.load_clump_grid(&mut vec![0u32; dims.len()]).is_err());
    }

    #[test]
    fn test_config_error_keeps_previous_results() {
        let fx = fixtures::block_3x3();
        let dims = GridDims::plane(fx.nx, fx.ny);
        let mut manager = ClumpingManager::new();
        manager
            .perform_clumping(dims, Field::Float(&fx.data), Threshold::Float(5.0), 1)
            .unwrap();

        assert!(manager
            .perform_clumping(dims, Field::Float(&fx.data), Threshold::Float(5.0), 0)
            .is_err());
        assert!(manager
            .perform_clumping(dims, Field::Float(&fx.data), Threshold::Byte(5), 1)
            .is_err());
        assert_eq!(manager.state(), ClumpingState::Clumped);
        assert_eq!(manager.n_clumps(), 1);
    }

    #[test]
    fn test_offset_keeps_grid_outputs_local() {
        let fx = fixtures::block_3x3();
        let dims = GridDims::plane(fx.nx, fx.ny);
        let mut manager = ClumpingManager::new();
        manager
            .perform_clumping(dims, Field::Float(&fx.data), Threshold::Float(5.0), 1)
            .unwrap();
        manager.add_xy_offset_to_intervals(10, 20, 40).unwrap();
        assert_eq!(manager.intervals()[0].begin, 12);
        assert_eq!(manager.intervals()[0].row_in_plane, 22);
        assert_eq!(manager.intervals()[0].row_in_vol, 22);
        assert_eq!(manager.clumps()[0].bbox.xmin, 12);

        let mut grid = vec![0u32; dims.len()];
        manager.load_clump_grid(&mut grid).unwrap();
        assert_eq!(grid[2 * 10 + 2], 1);
        assert_eq!(grid.iter().filter(|&&id| id != 0).count(), 9);
    }

    #[test]
    fn test_offset_underflow_leaves_intervals_untouched() {
        let fx = fixtures::block_3x3();
        let dims = GridDims::plane(fx.nx, fx.ny);
        let mut manager = ClumpingManager::new();
        manager
            .find_intervals(dims, Field::Float(&fx.data), Threshold::Float(5.0))
            .unwrap();
        let err = manager.add_xy_offset_to_intervals(-3, 0, 10).unwrap_err();
        assert!(matches!(err, ClumpingError::CoordinateUnderflow { axis: "x", .. }));
        assert_eq!(manager.intervals()[0].begin, 2);

        // block rows 2..=4 shifted by 6 reach row 10 of a 10-row grid
        let err = manager.add_xy_offset_to_intervals(0, 6, 10).unwrap_err();
        assert!(matches!(err, ClumpingError::RowOutsideGrid { row: 10, ny: 10 }));
        assert_eq!(manager.intervals()[0].row_in_plane, 2);
    }

    #[test]
    fn test_offset_rebuilds_volume_rows_for_full_grid() {
        // 4x5x2 crop placed at row 3 of a grid with 10 rows per plane
        let dims = GridDims::new(4, 5, 2);
        let mut data = vec![0.0f32; dims.len()];
        data[dims.offset(1, 2, 0)] = 10.0;
        data[dims.offset(1, 2, 1)] = 10.0;
        let mut manager = ClumpingManager::new();
        manager
            .find_intervals(dims, Field::Float(&data), Threshold::Float(5.0))
            .unwrap();
        assert_eq!(manager.intervals()[1].row_in_vol, 7);

        manager.add_xy_offset_to_intervals(0, 3, 10).unwrap();
        let lower = manager.intervals()[0];
        let upper = manager.intervals()[1];
        assert_eq!((lower.row_in_plane, lower.row_in_vol), (5, 5));
        assert_eq!((upper.plane, upper.row_in_plane, upper.row_in_vol), (1, 5, 15));
    }
}
