//! Bounding boxes in grid-index space.

use serde::{Deserialize, Serialize};

/// Inclusive index-space extent of a set of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Box3d {
    pub xmin: usize,
    pub ymin: usize,
    pub zmin: usize,
    pub xmax: usize,
    pub ymax: usize,
    pub zmax: usize,
}

impl Box3d {
    /// A box covering a single row run `[xbegin, xend]`.
    pub fn from_run(xbegin: usize, xend: usize, y: usize, z: usize) -> Self {
        Self {
            xmin: xbegin,
            ymin: y,
            zmin: z,
            xmax: xend,
            ymax: y,
            zmax: z,
        }
    }

    /// Grow the box to include a row run.
    pub fn include_run(&mut self, xbegin: usize, xend: usize, y: usize, z: usize) {
        self.xmin = self.xmin.min(xbegin);
        self.xmax = self.xmax.max(xend);
        self.ymin = self.ymin.min(y);
        self.ymax = self.ymax.max(y);
        self.zmin = self.zmin.min(z);
        self.zmax = self.zmax.max(z);
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Box3d) -> Box3d {
        Box3d {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            zmin: self.zmin.min(other.zmin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
            zmax: self.zmax.max(other.zmax),
        }
    }

    /// Number of columns spanned.
    pub fn nx(&self) -> usize {
        self.xmax - self.xmin + 1
    }

    /// Number of rows spanned.
    pub fn ny(&self) -> usize {
        self.ymax - self.ymin + 1
    }

    /// Number of planes spanned.
    pub fn nz(&self) -> usize {
        self.zmax - self.zmin + 1
    }

    /// Check whether a cell lies inside the box.
    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        (self.xmin..=self.xmax).contains(&x)
            && (self.ymin..=self.ymax).contains(&y)
            && (self.zmin..=self.zmax).contains(&z)
    }
}
