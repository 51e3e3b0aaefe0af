//! Geographic meshes for fixed-grid satellite imagery.
//!
//! A satellite frame is indexed by 1-D scan-angle axes. Rendering needs the
//! geographic position of every pixel corner, so the pipeline is:
//!
//! 1. [`geolocate_centers`]: scan angles -> ECEF -> lon/lat at pixel centers,
//!    with off-disk cells left non-finite and flagged no-data.
//! 2. [`CenterMesh::clamp_invalid`]: replace non-finite longitudes with the
//!    frame's minimum longitude and non-finite latitudes with its maximum
//!    latitude. This keeps the mesh usable for a fast quad render; it is not a
//!    physical fill.
//! 3. [`CenterMesh::into_corners`]: center mesh -> corner mesh, one larger in
//!    each dimension.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use sat_common::GeoBounds;
use tracing::debug;

use crate::error::{GeolocationError, GeolocationResult};
use crate::geostationary::Geostationary;

/// Geographic coordinates at pixel centers, row-major (rows follow the y axis).
#[derive(Debug, Clone)]
pub struct CenterMesh {
    pub rows: usize,
    pub cols: usize,
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    /// True where the scan ray misses the Earth.
    pub no_data: Vec<bool>,
}

/// Geographic coordinates at pixel corners.
///
/// `lon` and `lat` hold `(rows + 1) * (cols + 1)` values; `no_data` holds one
/// flag per pixel (`rows * cols`).
#[derive(Debug, Clone)]
pub struct GeolocationMesh {
    pub rows: usize,
    pub cols: usize,
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub no_data: Vec<bool>,
}

/// Compute the corner mesh for a GOES fixed grid.
///
/// `axis_scale` converts axis units to radians (1e-6 for microradian axes).
pub fn compute_mesh(
    x_axis: &[f64],
    y_axis: &[f64],
    sub_satellite_lon: f64,
    axis_scale: f64,
) -> GeolocationResult<GeolocationMesh> {
    let proj = Geostationary::goes(sub_satellite_lon);
    let mut centers = geolocate_centers(&proj, x_axis, y_axis, axis_scale)?;
    centers.clamp_invalid()?;
    Ok(centers.into_corners())
}

/// Geolocate every pixel center of the grid spanned by `x_axis` x `y_axis`.
pub fn geolocate_centers(
    proj: &Geostationary,
    x_axis: &[f64],
    y_axis: &[f64],
    axis_scale: f64,
) -> GeolocationResult<CenterMesh> {
    if x_axis.is_empty() || y_axis.is_empty() {
        return Err(GeolocationError::EmptyAxis);
    }

    let rows = y_axis.len();
    let cols = x_axis.len();
    let mut lon = Vec::with_capacity(rows * cols);
    let mut lat = Vec::with_capacity(rows * cols);

    for &y in y_axis {
        let y_rad = y * axis_scale;
        for &x in x_axis {
            match proj.scan_to_ecef(x * axis_scale, y_rad) {
                Some(ecef) => {
                    let (lo, la, _alt) = proj.ecef_to_geodetic(ecef);
                    lon.push(lo);
                    lat.push(la);
                }
                None => {
                    lon.push(f64::INFINITY);
                    lat.push(f64::INFINITY);
                }
            }
        }
    }

    let no_data = lon
        .iter()
        .zip(&lat)
        .map(|(lo, la)| !lo.is_finite() || !la.is_finite())
        .collect();

    Ok(CenterMesh {
        rows,
        cols,
        lon,
        lat,
        no_data,
    })
}

impl CenterMesh {
    /// Number of pixels whose scan ray misses the Earth.
    pub fn invalid_count(&self) -> usize {
        self.no_data.iter().filter(|&&b| b).count()
    }

    /// Replace non-finite coordinates: longitude with the minimum finite
    /// longitude, latitude with the maximum finite latitude.
    pub fn clamp_invalid(&mut self) -> GeolocationResult<()> {
        let min_lon = finite_extreme(&self.lon, f64::min).ok_or(GeolocationError::NoVisibleCells)?;
        let max_lat = finite_extreme(&self.lat, f64::max).ok_or(GeolocationError::NoVisibleCells)?;

        let mut replaced = 0usize;
        for v in self.lon.iter_mut().filter(|v| !v.is_finite()) {
            *v = min_lon;
            replaced += 1;
        }
        for v in self.lat.iter_mut().filter(|v| !v.is_finite()) {
            *v = max_lat;
        }

        debug!(replaced, min_lon, max_lat, "Clamped off-disk mesh cells");
        Ok(())
    }

    /// Convert to a corner mesh.
    ///
    /// Interior corners are the average of their neighbouring centers; border
    /// corners are extrapolated linearly. Applied separably along columns and
    /// then rows. Near the limb the extrapolation can fold a border back on
    /// itself, so each border step is held to the direction of the step one
    /// corner inward.
    pub fn into_corners(self) -> GeolocationMesh {
        let lon = centers_to_edges_2d(&self.lon, self.rows, self.cols);
        let lat = centers_to_edges_2d(&self.lat, self.rows, self.cols);
        GeolocationMesh {
            rows: self.rows,
            cols: self.cols,
            lon,
            lat,
            no_data: self.no_data,
        }
    }
}

impl GeolocationMesh {
    /// Width of the corner mesh (`cols + 1`).
    pub fn corner_cols(&self) -> usize {
        self.cols + 1
    }

    /// (lon, lat) of corner (row, col).
    #[inline]
    pub fn corner(&self, row: usize, col: usize) -> (f64, f64) {
        let idx = row * self.corner_cols() + col;
        (self.lon[idx], self.lat[idx])
    }

    /// Whether pixel (row, col) has no ground intersection.
    #[inline]
    pub fn is_no_data(&self, row: usize, col: usize) -> bool {
        self.no_data[row * self.cols + col]
    }

    /// Number of no-data pixels.
    pub fn invalid_count(&self) -> usize {
        self.no_data.iter().filter(|&&b| b).count()
    }

    /// Geographic extent covered by the corner mesh.
    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::enclosing(self.lon.iter().zip(self.lat.iter()))
    }
}

fn finite_extreme(values: &[f64], pick: fn(f64, f64) -> f64) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .reduce(pick)
}

/// Edges of a 1-D sequence of centers (`n + 1` values).
fn centers_to_edges(centers: &[f64]) -> Vec<f64> {
    let n = centers.len();
    match n {
        0 => Vec::new(),
        1 => vec![centers[0], centers[0]],
        _ => {
            let mut edges = Vec::with_capacity(n + 1);
            edges.push(centers[0] - (centers[1] - centers[0]) / 2.0);
            edges.extend(centers.windows(2).map(|w| (w[0] + w[1]) / 2.0));
            edges.push(centers[n - 1] + (centers[n - 1] - centers[n - 2]) / 2.0);
            edges
        }
    }
}

fn centers_to_edges_2d(values: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    // Along columns: rows x (cols + 1)
    let mut wide = Vec::with_capacity(rows * (cols + 1));
    for row in values.chunks_exact(cols) {
        wide.extend(centers_to_edges(row));
    }

    // Along rows: (rows + 1) x (cols + 1)
    let out_cols = cols + 1;
    let mut out = vec![0.0; (rows + 1) * out_cols];
    let mut column = Vec::with_capacity(rows);
    for c in 0..out_cols {
        column.clear();
        column.extend((0..rows).map(|r| wide[r * out_cols + c]));
        for (r, v) in centers_to_edges(&column).into_iter().enumerate() {
            out[r * out_cols + c] = v;
        }
    }
    align_border_steps(&mut out, rows + 1, out_cols);
    out
}

/// Clamp border corners so every step along the border rises or falls like
/// the parallel step one row (or column) inward.
fn align_border_steps(grid: &mut [f64], rows: usize, cols: usize) {
    let at = |r: usize, c: usize| r * cols + c;

    if rows >= 2 {
        for (border, inner) in [(0, 1), (rows - 1, rows - 2)] {
            for c in 1..cols {
                let rising = grid[at(inner, c)] >= grid[at(inner, c - 1)];
                let prev = grid[at(border, c - 1)];
                let v = &mut grid[at(border, c)];
                *v = if rising { v.max(prev) } else { v.min(prev) };
            }
        }
    }

    if cols >= 2 {
        for (border, inner) in [(0, 1), (cols - 1, cols - 2)] {
            for r in 1..rows {
                let rising = grid[at(r, inner)] >= grid[at(r - 1, inner)];
                let prev = grid[at(r - 1, border)];
                let v = &mut grid[at(r, border)];
                *v = if rising { v.max(prev) } else { v.min(prev) };
            }
        }
    }
}

/// Cache key for a mesh: satellite position plus the exact axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MeshKey {
    sub_satellite_lon: u64,
    axis_scale: u64,
    axes: u64,
}

impl MeshKey {
    fn new(x_axis: &[f64], y_axis: &[f64], sub_satellite_lon: f64, axis_scale: f64) -> Self {
        let mut hasher = DefaultHasher::new();
        x_axis.len().hash(&mut hasher);
        for v in x_axis.iter().chain(y_axis) {
            v.to_bits().hash(&mut hasher);
        }
        Self {
            sub_satellite_lon: sub_satellite_lon.to_bits(),
            axis_scale: axis_scale.to_bits(),
            axes: hasher.finish(),
        }
    }
}

/// Memoizes meshes for frames sharing the same satellite and sector.
///
/// The `geocolor` binary composites one frame per process, so the cache only
/// hits for callers that keep one worker across several runs, such as an
/// embedding service or the integration tests.
#[derive(Debug, Default)]
pub struct MeshCache {
    meshes: HashMap<MeshKey, Arc<GeolocationMesh>>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached mesh for these axes, computing it on first use.
    pub fn get_or_compute(
        &mut self,
        x_axis: &[f64],
        y_axis: &[f64],
        sub_satellite_lon: f64,
        axis_scale: f64,
    ) -> GeolocationResult<Arc<GeolocationMesh>> {
        let key = MeshKey::new(x_axis, y_axis, sub_satellite_lon, axis_scale);
        if let Some(mesh) = self.meshes.get(&key) {
            debug!("Mesh cache hit");
            return Ok(Arc::clone(mesh));
        }

        let mesh = Arc::new(compute_mesh(x_axis, y_axis, sub_satellite_lon, axis_scale)?);
        self.meshes.insert(key, Arc::clone(&mesh));
        Ok(mesh)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
