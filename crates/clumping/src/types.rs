//! Core types for clumping.

use serde::{Deserialize, Serialize};
use storm_common::{Box3d, GridDims};

use crate::error::{ClumpingError, Result};

/// Input values, in one of the two supported encodings.
///
/// The encoding is resolved once when intervals are extracted; every later
/// stage works on intervals only.
#[derive(Debug, Clone, Copy)]
pub enum Field<'a> {
    /// 8-bit scaled values
    Byte(&'a [u8]),
    /// Floating-point values; NaN never qualifies
    Float(&'a [f32]),
}

impl<'a> Field<'a> {
    /// Number of cells.
    pub fn len(&self) -> usize {
        match self {
            Field::Byte(data) => data.len(),
            Field::Float(data) => data.len(),
        }
    }

    /// Check if the field holds no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name of the encoding.
    pub fn encoding(&self) -> &'static str {
        match self {
            Field::Byte(_) => "byte",
            Field::Float(_) => "float",
        }
    }

    /// Check the field matches the grid dimensions.
    pub fn check_dims(&self, dims: GridDims) -> Result<()> {
        check_dims(dims)?;
        if self.len() != dims.len() {
            return Err(ClumpingError::DataLengthMismatch {
                expected: dims.len(),
                actual: self.len(),
            });
        }
        Ok(())
    }
}

/// A threshold in the encoding of the field it applies to.
///
/// A cell qualifies when its value is strictly greater than the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Threshold {
    Byte(u8),
    Float(f32),
}

impl Threshold {
    /// Name of the encoding.
    pub fn encoding(&self) -> &'static str {
        match self {
            Threshold::Byte(_) => "byte",
            Threshold::Float(_) => "float",
        }
    }

    /// Threshold value as f64, for comparisons between thresholds.
    pub fn value(&self) -> f64 {
        match *self {
            Threshold::Byte(t) => t as f64,
            Threshold::Float(t) => t as f64,
        }
    }

    /// Express `value` in the encoding of `field`.
    ///
    /// For byte fields the value is floored, which keeps the strict
    /// comparison equivalent; values above 255 saturate.
    pub fn for_field(field: &Field<'_>, value: f64) -> Result<Self> {
        if value.is_nan() {
            return Err(ClumpingError::invalid_config("threshold is NaN"));
        }
        match field {
            Field::Float(_) => Ok(Threshold::Float(value as f32)),
            Field::Byte(_) => {
                if value < 0.0 {
                    return Err(ClumpingError::invalid_config(format!(
                        "threshold {} cannot be expressed for a byte field",
                        value
                    )));
                }
                Ok(Threshold::Byte(value.floor().min(u8::MAX as f64) as u8))
            }
        }
    }
}

/// A maximal run of qualifying cells within one grid row.
///
/// `begin` and `end` are inclusive column indices. `id` is the owning
/// clump, 0 until labeling assigns one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: u32,
    pub plane: usize,
    pub row_in_plane: usize,
    /// Row index counted through the whole volume: `plane * ny + row_in_plane`
    pub row_in_vol: usize,
    pub begin: usize,
    pub end: usize,
}

impl Interval {
    /// Number of cells in the run.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin + 1
    }

    /// Intervals always hold at least one cell.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of columns shared with `other`; zero or negative when the
    /// runs are disjoint.
    #[inline]
    pub fn overlap(&self, other: &Interval) -> isize {
        self.end.min(other.end) as isize - self.begin.max(other.begin) as isize + 1
    }
}

/// Location of one row's intervals in the interval arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowHeader {
    pub start: usize,
    pub len: usize,
}

impl RowHeader {
    /// Index range of the row's intervals.
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// A labeled clump: a set of intervals connected by overlap.
///
/// Member intervals are found through the manager's interval order,
/// `order_start .. order_start + n_intervals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clump {
    /// 1-based id, contiguous over all clumps
    pub id: u32,
    pub order_start: usize,
    pub n_intervals: usize,
    pub n_points: usize,
    pub bbox: Box3d,
}

/// Reject degenerate dimensions.
pub(crate) fn check_dims(dims: GridDims) -> Result<()> {
    dims.validate()
        .map_err(|_| ClumpingError::InvalidDimensions {
            nx: dims.nx,
            ny: dims.ny,
            nz: dims.nz,
        })
}
