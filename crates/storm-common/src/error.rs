//! Error types for grid geometry.

use thiserror::Error;

/// Result type alias using GeomError.
pub type GeomResult<T> = Result<T, GeomError>;

/// Errors raised while describing a grid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeomError {
    #[error("invalid grid dimensions nx={nx} ny={ny} nz={nz}: all must be > 0 and the cell count must fit in usize")]
    InvalidDimensions { nx: usize, ny: usize, nz: usize },

    #[error("invalid grid spacing dx={dx} dy={dy}: must be finite and > 0")]
    InvalidSpacing { dx: f64, dy: f64 },

    #[error("invalid vertical levels: {0}")]
    InvalidLevels(String),
}
