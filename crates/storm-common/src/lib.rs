//! Common grid types shared across the storm clumping crates.
//!
//! The clumping engine works in grid-index space. The only physical
//! information it needs is how large a cell is, which is what
//! [`GridGeom`] and the [`CellVolume`] trait provide.

pub mod bbox;
pub mod error;
pub mod grid;

pub use bbox::Box3d;
pub use error::{GeomError, GeomResult};
pub use grid::{CellVolume, GridDims, GridGeom, ProjType, KM_PER_DEG_AT_EQ};
