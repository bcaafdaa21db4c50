//! Test data generators for creating synthetic radar-like fields.
//!
//! Fields are flat `Vec`s in row-major order with planes stacked last:
//! cell `(x, y, z)` is at `(z * ny + y) * nx + x`.

/// Creates an all-background float field.
pub fn empty_field(nx: usize, ny: usize, nz: usize) -> Vec<f32> {
    vec![0.0; nx * ny * nz]
}

/// Fills a `w` x `h` rectangle in plane `z` with `value`.
///
/// The rectangle's top-left cell is `(x0, y0)`. Cells falling outside the
/// grid are ignored.
///
/// # Example
///
/// ```
/// use test_utils::{empty_field, paint_rect};
///
/// let mut grid = empty_field(10, 10, 1);
/// paint_rect(&mut grid, 10, 10, 0, 2, 2, 3, 3, 10.0);
/// assert_eq!(grid.iter().filter(|&&v| v > 5.0).count(), 9);
/// assert_eq!(grid[2 * 10 + 2], 10.0);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn paint_rect<T: Copy>(
    data: &mut [T],
    nx: usize,
    ny: usize,
    z: usize,
    x0: usize,
    y0: usize,
    w: usize,
    h: usize,
    value: T,
) {
    for y in y0..(y0 + h).min(ny) {
        for x in x0..(x0 + w).min(nx) {
            let idx = (z * ny + y) * nx + x;
            if let Some(cell) = data.get_mut(idx) {
                *cell = value;
            }
        }
    }
}

/// Fills an axis-aligned box spanning planes `z0..z0 + d`.
#[allow(clippy::too_many_arguments)]
pub fn paint_box<T: Copy>(
    data: &mut [T],
    nx: usize,
    ny: usize,
    x0: usize,
    y0: usize,
    z0: usize,
    w: usize,
    h: usize,
    d: usize,
    value: T,
) {
    let nz = data.len() / (nx * ny).max(1);
    for z in z0..(z0 + d).min(nz) {
        paint_rect(data, nx, ny, z, x0, y0, w, h, value);
    }
}

/// Creates a single-plane float field from a list of rectangles.
///
/// Each rectangle is `(x0, y0, w, h, value)`; later rectangles overwrite
/// earlier ones.
pub fn rect_field(nx: usize, ny: usize, rects: &[(usize, usize, usize, usize, f32)]) -> Vec<f32> {
    let mut data = empty_field(nx, ny, 1);
    for &(x0, y0, w, h, value) in rects {
        paint_rect(&mut data, nx, ny, 0, x0, y0, w, h, value);
    }
    data
}

/// Creates a single-plane byte field from a list of rectangles.
pub fn byte_rect_field(nx: usize, ny: usize, rects: &[(usize, usize, usize, usize, u8)]) -> Vec<u8> {
    let mut data = vec![0u8; nx * ny];
    for &(x0, y0, w, h, value) in rects {
        paint_rect(&mut data, nx, ny, 0, x0, y0, w, h, value);
    }
    data
}

/// Creates a reflectivity-like field made of Gaussian storm cells.
///
/// Each cell is `(cx, cy, radius, peak_dbz)`. The field is the maximum over
/// all cells, so overlapping cells form a single echo with several cores.
/// Every plane gets the same horizontal pattern, decaying by 5 dBZ per plane.
pub fn storm_cell_field(
    nx: usize,
    ny: usize,
    nz: usize,
    cells: &[(f32, f32, f32, f32)],
) -> Vec<f32> {
    let mut data = empty_field(nx, ny, nz);
    for z in 0..nz {
        let decay = 5.0 * z as f32;
        for y in 0..ny {
            for x in 0..nx {
                let mut value = 0.0f32;
                for &(cx, cy, radius, peak) in cells {
                    let dx = x as f32 - cx;
                    let dy = y as f32 - cy;
                    let r2 = (dx * dx + dy * dy) / (radius * radius).max(f32::EPSILON);
                    value = value.max(peak * (-0.5 * r2).exp() - decay);
                }
                data[(z * ny + y) * nx + x] = value.max(0.0);
            }
        }
    }
    data
}

/// Counts cells strictly above `threshold`.
pub fn count_above(data: &[f32], threshold: f32) -> usize {
    data.iter().filter(|&&v| v > threshold).count()
}
