//! Euclidean distance map and erosion over clump cells.
//!
//! The distance of a clump cell is the exact Euclidean distance, in cell
//! units, to the nearest background cell. Cells outside the grid count as
//! background, so a clump touching the grid edge is at distance 1 there.
//! The inverse map measures the other way: from each background cell to the
//! nearest clump cell.
//!
//! The map is computed with the separable lower-envelope transform of
//! Felzenszwalb and Huttenlocher: squared distances are propagated along
//! x, then y, then (for volume maps) z, in linear time per line.

use serde::{Deserialize, Serialize};
use storm_common::GridDims;

use crate::arena::Arena;
use crate::error::Result;

/// Which neighbourhood the distance map measures over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdmMode {
    /// Each plane on its own; background in other planes is ignored.
    Planar,
    /// Distances through the whole volume.
    Volume,
}

/// Outcome of an erosion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErosionSummary {
    /// Clump cells before erosion
    pub n_cells_before: usize,
    /// Clump cells left after erosion
    pub n_cells_after: usize,
    /// Ids of clumps with at least one surviving cell, ascending
    pub surviving: Vec<u32>,
    /// Ids of clumps eroded away entirely, ascending
    pub removed: Vec<u32>,
}

/// Scratch buffers for the distance transform.
#[derive(Debug, Default)]
pub(crate) struct EdmWorkspace {
    squared: Arena<f64>,
    line_in: Arena<f64>,
    line_out: Arena<f64>,
    hull: Arena<usize>,
    bounds: Arena<f64>,
    cells_before: Arena<usize>,
    cells_after: Arena<usize>,
}

impl EdmWorkspace {
    /// Write the distance map of the labeled cells in `labels` to `out`.
    ///
    /// Background cells (label 0) get 0. Returns the largest distance.
    pub(crate) fn compute(
        &mut self,
        dims: GridDims,
        labels: &[u32],
        mode: EdmMode,
        out: &mut [f32],
    ) -> Result<f32> {
        self.squared.fill(dims.len(), 0.0)?;
        for (sq, &label) in self.squared.iter_mut().zip(labels) {
            if label != 0 {
                *sq = f64::INFINITY;
            }
        }

        self.propagate(dims, mode, 0.0)?;

        let mut max = 0.0f32;
        for ((o, &sq), &label) in out.iter_mut().zip(self.squared.iter()).zip(labels) {
            *o = if label != 0 { sq.sqrt() as f32 } else { 0.0 };
            max = max.max(*o);
        }
        Ok(max)
    }

    /// Write, for every background cell, the distance to the nearest clump
    /// cell. Clump cells get 0.
    ///
    /// Cells outside the grid are not clump cells. A background cell with
    /// no clump cell in reach (an empty plane in planar mode, or an empty
    /// grid) gets 0. Returns the largest distance.
    pub(crate) fn compute_inverse(
        &mut self,
        dims: GridDims,
        labels: &[u32],
        mode: EdmMode,
        out: &mut [f32],
    ) -> Result<f32> {
        self.squared.fill(dims.len(), 0.0)?;
        for (sq, &label) in self.squared.iter_mut().zip(labels) {
            if label == 0 {
                *sq = f64::INFINITY;
            }
        }

        self.propagate(dims, mode, f64::INFINITY)?;

        let mut max = 0.0f32;
        for ((o, &sq), &label) in out.iter_mut().zip(self.squared.iter()).zip(labels) {
            *o = if label == 0 && sq.is_finite() {
                sq.sqrt() as f32
            } else {
                0.0
            };
            max = max.max(*o);
        }
        Ok(max)
    }

    /// Propagate the squared distances in `squared` along every axis.
    /// `pad` is the value of the cells just outside the grid.
    fn propagate(&mut self, dims: GridDims, mode: EdmMode, pad: f64) -> Result<()> {
        let longest = dims.nx.max(dims.ny).max(dims.nz) + 2;
        self.line_in.fill(longest, 0.0)?;
        self.line_out.fill(longest, 0.0)?;
        self.hull.fill(longest, 0)?;
        self.bounds.fill(longest + 1, 0.0)?;

        // x lines are contiguous; y and z lines are strided
        self.transform_axis(dims.ny * dims.nz, dims.nx, 1, pad, |line| {
            line * dims.nx
        });
        self.transform_axis(dims.nx * dims.nz, dims.ny, dims.nx, pad, |line| {
            let (x, z) = (line % dims.nx, line / dims.nx);
            z * dims.plane_len() + x
        });
        if mode == EdmMode::Volume && dims.nz > 1 {
            self.transform_axis(dims.plane_len(), dims.nz, dims.plane_len(), pad, |line| line);
        }
        Ok(())
    }

    /// Keep clump cells whose distance is at least `threshold`.
    ///
    /// `out` receives the clump id of every kept cell and 0 elsewhere.
    pub(crate) fn erode(
        &mut self,
        labels: &[u32],
        edm: &[f32],
        threshold: f32,
        n_clumps: usize,
        out: &mut [u32],
    ) -> Result<ErosionSummary> {
        self.cells_before.fill(n_clumps + 1, 0)?;
        self.cells_after.fill(n_clumps + 1, 0)?;

        for ((o, &label), &dist) in out.iter_mut().zip(labels).zip(edm) {
            self.cells_before[label as usize] += 1;
            if label != 0 && dist >= threshold {
                *o = label;
                self.cells_after[label as usize] += 1;
            } else {
                *o = 0;
            }
        }

        let mut summary = ErosionSummary {
            n_cells_before: self.cells_before[1..].iter().sum(),
            n_cells_after: self.cells_after[1..].iter().sum(),
            ..Default::default()
        };
        for id in 1..=n_clumps {
            if self.cells_after[id] > 0 {
                summary.surviving.push(id as u32);
            } else if self.cells_before[id] > 0 {
                summary.removed.push(id as u32);
            }
        }
        Ok(summary)
    }

    /// Run the 1D transform over `n_lines` lines of `len` cells, where
    /// line `i` starts at `start(i)` and advances by `stride`.
    fn transform_axis(
        &mut self,
        n_lines: usize,
        len: usize,
        stride: usize,
        pad: f64,
        start: impl Fn(usize) -> usize,
    ) {
        for line in 0..n_lines {
            let base = start(line);

            self.line_in[0] = pad;
            self.line_in[len + 1] = pad;
            let mut any_unknown = false;
            let mut any_site = pad.is_finite();
            for i in 0..len {
                let sq = self.squared[base + i * stride];
                any_unknown |= sq != 0.0;
                any_site |= sq.is_finite();
                self.line_in[i + 1] = sq;
            }
            if !any_unknown || !any_site {
                continue;
            }

            lower_envelope(
                &self.line_in[..len + 2],
                &mut self.line_out[..len + 2],
                &mut self.hull,
                &mut self.bounds,
            );

            for i in 0..len {
                self.squared[base + i * stride] = self.line_out[i + 1];
            }
        }
    }
}

/// Squared distance transform of one sampled function.
///
/// `f[q]` is the squared distance already known at `q`, infinite where
/// unknown. At least one sample must be finite.
fn lower_envelope(f: &[f64], d: &mut [f64], hull: &mut [usize], bounds: &mut [f64]) {
    let n = f.len();
    let Some(first) = f.iter().position(|v| v.is_finite()) else {
        d.fill(f64::INFINITY);
        return;
    };
    let mut k = 0;
    hull[0] = first;
    bounds[0] = f64::NEG_INFINITY;
    bounds[1] = f64::INFINITY;

    for q in first + 1..n {
        if f[q].is_infinite() {
            continue;
        }
        let fq = f[q] + (q * q) as f64;
        let mut s;
        loop {
            let p = hull[k];
            s = (fq - (f[p] + (p * p) as f64)) / (2 * (q - p)) as f64;
            if s <= bounds[k] && k > 0 {
                k -= 1;
            } else {
                break;
            }
        }
        k += 1;
        hull[k] = q;
        bounds[k] = s;
        bounds[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (q, dq) in d.iter_mut().enumerate() {
        while bounds[k + 1] < q as f64 {
            k += 1;
        }
        let p = hull[k];
        let dist = q.abs_diff(p) as f64;
        *dq = dist * dist + f[p];
    }
}
