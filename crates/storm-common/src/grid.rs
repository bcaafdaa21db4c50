//! Grid dimensions and geometry for radar analysis grids.

use crate::error::{GeomError, GeomResult};
use serde::{Deserialize, Serialize};

/// Kilometres per degree of latitude (and of longitude at the equator).
pub const KM_PER_DEG_AT_EQ: f64 = 111.198487;

/// Dimensions of a 2D or 3D grid stored as a flat, row-major array.
///
/// Cell `(x, y, z)` lives at offset `z * nx * ny + y * nx + x`. A 2D grid
/// is a 3D grid with a single plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    /// Number of columns
    pub nx: usize,
    /// Number of rows in each plane
    pub ny: usize,
    /// Number of planes
    pub nz: usize,
}

impl GridDims {
    /// Create dimensions for a volume.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Create dimensions for a single plane.
    pub fn plane(nx: usize, ny: usize) -> Self {
        Self { nx, ny, nz: 1 }
    }

    /// Reject degenerate grids.
    pub fn validate(&self) -> GeomResult<()> {
        if self.nx == 0 || self.ny == 0 || self.nz == 0 || self.checked_len().is_none() {
            return Err(GeomError::InvalidDimensions {
                nx: self.nx,
                ny: self.ny,
                nz: self.nz,
            });
        }
        Ok(())
    }

    /// Total number of cells, or `None` if it does not fit in `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.nx.checked_mul(self.ny)?.checked_mul(self.nz)
    }

    /// Total number of cells.
    ///
    /// Only meaningful for dimensions that passed [`validate`](Self::validate).
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Check if the grid holds no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cells in one plane.
    pub fn plane_len(&self) -> usize {
        self.nx * self.ny
    }

    /// Number of rows in the whole volume (`ny * nz`).
    pub fn n_rows(&self) -> usize {
        self.ny * self.nz
    }

    /// True if there is more than one plane.
    pub fn is_3d(&self) -> bool {
        self.nz > 1
    }

    /// Flat offset of a cell.
    #[inline]
    pub fn offset(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.ny + y) * self.nx + x
    }

    /// Flat offset of the first cell in a row.
    #[inline]
    pub fn row_offset(&self, y: usize, z: usize) -> usize {
        (z * self.ny + y) * self.nx
    }
}

/// Horizontal projection of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjType {
    /// Cartesian grid, spacing already in km
    #[default]
    Flat,
    /// Regular lat/lon grid, spacing in degrees
    LatLon,
}

/// Converts grid-index counts into physical size.
///
/// This is the only service the clumping engine asks of a projection.
pub trait CellVolume {
    /// Horizontal area of one cell in km2.
    fn cell_area_km2(&self) -> f64;

    /// Thickness of the given plane in km.
    fn layer_thickness_km(&self, plane: usize) -> f64;

    /// Volume of one cell in the given plane, in km3.
    fn cell_volume_km3(&self, plane: usize) -> f64 {
        self.cell_area_km2() * self.layer_thickness_km(plane)
    }
}

/// Geometry of a regular analysis grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeom {
    pub nx: usize,
    pub ny: usize,
    /// Column spacing (km for flat grids, degrees for lat/lon)
    pub dx: f64,
    /// Row spacing (km for flat grids, degrees for lat/lon)
    pub dy: f64,
    /// Location of the first column
    pub minx: f64,
    /// Location of the first row
    pub miny: f64,
    /// Height of each plane in km, strictly increasing
    pub z_km: Vec<f64>,
    pub proj: ProjType,
}

impl GridGeom {
    /// A single-plane flat grid with its origin at (0, 0).
    pub fn flat(nx: usize, ny: usize, dx: f64, dy: f64) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            minx: 0.0,
            miny: 0.0,
            z_km: vec![0.0],
            proj: ProjType::Flat,
        }
    }

    /// Set the grid origin.
    pub fn with_origin(mut self, minx: f64, miny: f64) -> Self {
        self.minx = minx;
        self.miny = miny;
        self
    }

    /// Set the plane heights.
    pub fn with_z_levels(mut self, z_km: Vec<f64>) -> Self {
        self.z_km = z_km;
        self
    }

    /// Evenly spaced planes starting at `min_z_km`.
    pub fn with_uniform_z(mut self, nz: usize, min_z_km: f64, dz_km: f64) -> Self {
        self.z_km = (0..nz).map(|iz| min_z_km + iz as f64 * dz_km).collect();
        self
    }

    /// Set the projection type.
    pub fn with_proj(mut self, proj: ProjType) -> Self {
        self.proj = proj;
        self
    }

    /// Number of planes.
    pub fn nz(&self) -> usize {
        self.z_km.len()
    }

    /// Grid dimensions described by this geometry.
    pub fn dims(&self) -> GridDims {
        GridDims::new(self.nx, self.ny, self.nz())
    }

    /// Check the geometry is usable for volume computations.
    pub fn validate(&self) -> GeomResult<()> {
        self.dims().validate()?;

        if !(self.dx.is_finite() && self.dx > 0.0 && self.dy.is_finite() && self.dy > 0.0) {
            return Err(GeomError::InvalidSpacing {
                dx: self.dx,
                dy: self.dy,
            });
        }

        if self.z_km.iter().any(|z| !z.is_finite()) {
            return Err(GeomError::InvalidLevels(
                "plane heights must be finite".to_string(),
            ));
        }

        if self.z_km.windows(2).any(|w| w[1] <= w[0]) {
            return Err(GeomError::InvalidLevels(format!(
                "plane heights must be strictly increasing: {:?}",
                self.z_km
            )));
        }

        Ok(())
    }

    /// Latitude of the grid centre, used to scale longitude spacing.
    pub fn mid_lat_deg(&self) -> f64 {
        self.miny + self.ny as f64 * self.dy / 2.0
    }

    /// Column spacing in km.
    pub fn dx_km(&self) -> f64 {
        match self.proj {
            ProjType::Flat => self.dx,
            ProjType::LatLon => {
                self.dx * KM_PER_DEG_AT_EQ * self.mid_lat_deg().to_radians().cos()
            }
        }
    }

    /// Row spacing in km.
    pub fn dy_km(&self) -> f64 {
        match self.proj {
            ProjType::Flat => self.dy,
            ProjType::LatLon => self.dy * KM_PER_DEG_AT_EQ,
        }
    }

    /// Projected x coordinate of a (possibly fractional) column index.
    pub fn x_coord(&self, ix: f64) -> f64 {
        self.minx + ix * self.dx
    }

    /// Projected y coordinate of a (possibly fractional) row index.
    pub fn y_coord(&self, iy: f64) -> f64 {
        self.miny + iy * self.dy
    }

    /// Height of a plane in km, 0 for planes outside the level list.
    pub fn z_coord(&self, iz: usize) -> f64 {
        self.z_km.get(iz).copied().unwrap_or(0.0)
    }
}

impl CellVolume for GridGeom {
    fn cell_area_km2(&self) -> f64 {
        self.dx_km() * self.dy_km()
    }

    /// Interior planes take half the distance between their neighbours;
    /// the end planes use the one-sided spacing. A single plane is treated
    /// as a layer of unit thickness.
    fn layer_thickness_km(&self, plane: usize) -> f64 {
        let nz = self.z_km.len();
        if nz < 2 {
            return 1.0;
        }
        let iz = plane.min(nz - 1);
        let z = &self.z_km;
        if iz == 0 {
            z[1] - z[0]
        } else if iz == nz - 1 {
            z[iz] - z[iz - 1]
        } else {
            (z[iz + 1] - z[iz - 1]) / 2.0
        }
    }
}
