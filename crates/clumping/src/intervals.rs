//! Interval extraction: run-length encoding of qualifying cells.
//!
//! Every row of the grid (fixed `y`, fixed `z`) is scanned once. A run
//! opens when a cell starts to qualify and closes at the first cell that
//! does not, or at the end of the row. Rows are visited with `y` varying
//! fastest, so row headers are indexed by `row_in_vol = z * ny + y`.

use storm_common::GridDims;

use crate::arena::Arena;
use crate::error::{ClumpingError, Result};
use crate::types::{Field, Interval, RowHeader, Threshold};

/// Call `emit(begin, end)` for each maximal run in `row` where `qualifies`
/// holds. `begin` and `end` are inclusive.
#[inline]
pub(crate) fn for_each_run<T: Copy>(
    row: &[T],
    qualifies: impl Fn(T) -> bool,
    mut emit: impl FnMut(usize, usize),
) {
    let mut run_start: Option<usize> = None;
    for (x, &value) in row.iter().enumerate() {
        match (qualifies(value), run_start) {
            (true, None) => run_start = Some(x),
            (false, Some(begin)) => {
                emit(begin, x - 1);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = run_start {
        emit(begin, row.len() - 1);
    }
}

/// Most intervals a row of `nx` cells can hold.
#[inline]
pub(crate) fn max_intervals_per_row(nx: usize) -> usize {
    nx.div_ceil(2)
}

/// Extract the intervals of every row into the arenas.
///
/// Both arenas are reset once the inputs are known to be consistent.
/// Returns the number of intervals found.
pub(crate) fn find_intervals(
    dims: GridDims,
    field: Field<'_>,
    threshold: Threshold,
    rows: &mut Arena<RowHeader>,
    intervals: &mut Arena<Interval>,
) -> Result<usize> {
    field.check_dims(dims)?;

    match (field, threshold) {
        (Field::Byte(data), Threshold::Byte(t)) => {
            prepare(dims, rows, intervals)?;
            scan_rows(dims, data, |v: u8| v > t, rows, intervals);
        }
        (Field::Float(data), Threshold::Float(t)) => {
            prepare(dims, rows, intervals)?;
            scan_rows(dims, data, |v: f32| v > t, rows, intervals);
        }
        (field, threshold) => {
            return Err(ClumpingError::ThresholdMismatch {
                field: field.encoding(),
                threshold: threshold.encoding(),
            });
        }
    }

    Ok(intervals.len())
}

/// Reset the arenas and reserve the worst case for `dims`.
fn prepare(
    dims: GridDims,
    rows: &mut Arena<RowHeader>,
    intervals: &mut Arena<Interval>,
) -> Result<()> {
    rows.reset();
    intervals.reset();
    rows.reserve(dims.n_rows())?;
    intervals.reserve(dims.n_rows() * max_intervals_per_row(dims.nx))?;
    Ok(())
}

fn scan_rows<T: Copy>(
    dims: GridDims,
    data: &[T],
    qualifies: impl Fn(T) -> bool + Copy,
    rows: &mut Arena<RowHeader>,
    intervals: &mut Arena<Interval>,
) {
    for plane in 0..dims.nz {
        for row_in_plane in 0..dims.ny {
            let offset = dims.row_offset(row_in_plane, plane);
            let row = &data[offset..offset + dims.nx];
            let start = intervals.len();
            let row_in_vol = plane * dims.ny + row_in_plane;

            for_each_run(row, qualifies, |begin, end| {
                intervals.push(Interval {
                    id: 0,
                    plane,
                    row_in_plane,
                    row_in_vol,
                    begin,
                    end,
                });
            });

            rows.push(RowHeader {
                start,
                len: intervals.len() - start,
            });
        }
    }
}
