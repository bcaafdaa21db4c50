//! Storm identification by connected-component clumping.
//!
//! This crate finds the connected regions of a 2D or 3D gridded field that
//! exceed a threshold ("clumps"), and optionally:
//!
//! - **Distance maps**: exact Euclidean distance of each clump cell to the
//!   background, plane by plane or through the volume
//! - **Erosion**: stripping clump cells close to the background
//! - **Dual-threshold growing**: splitting weakly connected storms around
//!   their strong cores, with fraction, size and volume acceptance tests
//!
//! # Architecture
//!
//! ```text
//! Field + Threshold
//!      │
//!      ▼
//! Interval Finder (one pass per row, byte or float compare)
//!      │
//!      ▼
//! Clump Labeler (overlap links to row y-1 and earlier planes)
//!      │
//!      ├─► load_clump_grid / edm_2d / edm_3d / erode
//!      │
//!      └─► load_clump_vector
//!               │
//!               ├─► single threshold: one ClumpProps per clump
//!               │
//!               └─► dual threshold: seeds at the secondary threshold
//!                        │
//!                        ▼
//!                   grow seeds through each candidate, filter
//!                        │
//!                        ▼
//!                   Vec<ClumpProps>
//! ```
//!
//! # Example
//!
//! ```
//! use clumping::{ClumpingManager, Field, Threshold};
//! use storm_common::GridDims;
//!
//! let dims = GridDims::plane(10, 10);
//! let mut data = vec![0.0f32; dims.len()];
//! for y in 2..5 {
//!     for x in 2..5 {
//!         data[y * 10 + x] = 10.0;
//!     }
//! }
//!
//! let mut manager = ClumpingManager::new();
//! let n = manager
//!     .perform_clumping(dims, Field::Float(&data), Threshold::Float(5.0), 1)
//!     .unwrap();
//! assert_eq!(n, 1);
//! assert_eq!(manager.clumps()[0].n_points, 9);
//! ```

pub mod arena;
pub mod config;
pub mod dual_threshold;
pub mod edm;
pub mod error;
mod intervals;
mod labeler;
pub mod manager;
pub mod props;
pub mod types;

// Re-export commonly used types at crate root
pub use arena::Arena;
pub use config::{ClumpingConfig, DualThresholdConfig};
pub use dual_threshold::DualThresholdStats;
pub use edm::{EdmMode, ErosionSummary};
pub use error::{ClumpingError, Result};
pub use manager::{ArenaStats, ClumpingManager, ClumpingState};
pub use props::{Centroid, ClumpOrigin, ClumpProps};
pub use types::{Clump, Field, Interval, RowHeader, Threshold};
