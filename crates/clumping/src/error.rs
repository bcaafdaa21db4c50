//! Error types for clumping.

use std::collections::TryReserveError;

use storm_common::GeomError;
use thiserror::Error;

use crate::manager::ClumpingState;

/// Errors that can occur while clumping a grid.
///
/// Empty results (no clumps, a clump eroded away, a rejected
/// dual-threshold candidate) are not errors.
#[derive(Error, Debug)]
pub enum ClumpingError {
    /// Grid dimensions are degenerate or too large to address.
    #[error("invalid grid dimensions nx={nx} ny={ny} nz={nz}: all must be > 0 and the cell count must fit in usize")]
    InvalidDimensions { nx: usize, ny: usize, nz: usize },

    /// The data array does not match the grid dimensions.
    #[error("grid data has {actual} cells, dimensions require {expected}")]
    DataLengthMismatch { expected: usize, actual: usize },

    /// Intervals must share at least one cell to be connected.
    #[error("min_overlap must be >= 1, got {0}")]
    InvalidMinOverlap(usize),

    /// Threshold encoding differs from the field encoding.
    #[error("{threshold} threshold cannot be applied to a {field} field")]
    ThresholdMismatch {
        field: &'static str,
        threshold: &'static str,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// The operation needs results from an earlier stage.
    #[error("{operation} is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: ClumpingState,
    },

    /// A caller-provided output grid has the wrong size.
    #[error("output grid has {actual} cells, expected {expected}")]
    OutputSizeMismatch { expected: usize, actual: usize },

    /// Arena growth could not obtain memory.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// An interval shift would move coordinates below zero.
    #[error("offset {offset} would move {axis} coordinates below zero")]
    CoordinateUnderflow { axis: &'static str, offset: isize },

    /// An interval shift would move rows past the end of the target grid.
    #[error("shifted row {row} lies outside a grid of {ny} rows")]
    RowOutsideGrid { row: usize, ny: usize },

    /// Grid geometry error.
    #[error(transparent)]
    Geometry(#[from] GeomError),
}

impl ClumpingError {
    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an InvalidState error.
    pub fn invalid_state(operation: &'static str, state: ClumpingState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create an OutputSizeMismatch error.
    pub fn output_size(expected: usize, actual: usize) -> Self {
        Self::OutputSizeMismatch { expected, actual }
    }

    /// True for errors caused by the caller's configuration or inputs.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::Allocation(_))
    }
}

impl From<TryReserveError> for ClumpingError {
    fn from(err: TryReserveError) -> Self {
        Self::Allocation(err.to_string())
    }
}

/// Result type for clumping operations.
pub type Result<T> = std::result::Result<T, ClumpingError>;
