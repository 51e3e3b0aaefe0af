//! Forward rasterization of a geolocated pixel grid onto a map canvas.
//!
//! Each source pixel is a quadrilateral bounded by four corners of the
//! geolocation mesh. Every canvas pixel whose center lies inside that quad
//! takes the source color unchanged (nearest neighbour, no blending).

use projection::{mercator, GeolocationMesh};
use sat_common::GeoBounds;
use tracing::debug;

use crate::composite::RgbImage;
use crate::error::{RenderError, RenderResult};
use crate::png::create_png;

/// Opaque white.
pub const WHITE: [u8; 4] = [255, 255, 255, 255];
/// Fully transparent.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Map projection of the output canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapProjection {
    /// Equirectangular lon/lat.
    PlateCarree,
    /// EPSG:3857.
    WebMercator,
}

impl MapProjection {
    /// Project lon/lat degrees into this projection's planar units.
    #[inline]
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            MapProjection::PlateCarree => (lon, lat),
            MapProjection::WebMercator => mercator::forward(lon, lat),
        }
    }
}

/// An RGBA drawing surface covering a geographic extent.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    bounds: GeoBounds,
    projection: MapProjection,
    /// Projected extent: (min_x, min_y, max_x, max_y)
    extent: (f64, f64, f64, f64),
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(
        width: usize,
        height: usize,
        bounds: GeoBounds,
        projection: MapProjection,
        background: [u8; 4],
    ) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidCanvas { width, height });
        }
        let bounds = match projection {
            MapProjection::PlateCarree => bounds,
            MapProjection::WebMercator => bounds.clamp_lat(mercator::MAX_LAT),
        };
        if !bounds.is_valid() {
            return Err(RenderError::InvalidBounds(format!("{:?}", bounds)));
        }

        let (min_x, min_y) = projection.project(bounds.min_lon, bounds.min_lat);
        let (max_x, max_y) = projection.project(bounds.max_lon, bounds.max_lat);

        let mut pixels = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            pixels.extend_from_slice(&background);
        }

        Ok(Self {
            width,
            height,
            bounds,
            projection,
            extent: (min_x, min_y, max_x, max_y),
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bounds(&self) -> GeoBounds {
        self.bounds
    }

    /// Continuous pixel coordinates of a lon/lat point (y grows downward).
    #[inline]
    pub fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = self.projection.project(lon, lat);
        let (min_x, min_y, max_x, max_y) = self.extent;
        let px = (x - min_x) / (max_x - min_x) * self.width as f64;
        let py = (max_y - y) / (max_y - min_y) * self.height as f64;
        (px, py)
    }

    /// Color of the canvas pixel at (x, y).
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Fill every canvas pixel whose center lies inside `quad`.
    ///
    /// Corners are in canvas pixel coordinates and may be in either winding.
    /// Returns the number of pixels written.
    pub fn fill_quad(&mut self, quad: &[(f64, f64); 4], color: [u8; 4]) -> usize {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in quad {
            if !x.is_finite() || !y.is_finite() {
                return 0;
            }
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        // Pixel i covers [i, i + 1); its center is i + 0.5
        let x0 = (min_x - 0.5).ceil().max(0.0);
        let y0 = (min_y - 0.5).ceil().max(0.0);
        let x1 = (max_x - 0.5).floor().min(self.width as f64 - 1.0);
        let y1 = (max_y - 0.5).floor().min(self.height as f64 - 1.0);
        if x0 > x1 || y0 > y1 {
            return 0;
        }

        let mut written = 0;
        for py in y0 as usize..=y1 as usize {
            let cy = py as f64 + 0.5;
            for px in x0 as usize..=x1 as usize {
                if point_in_quad(px as f64 + 0.5, cy, quad) {
                    let i = (py * self.width + px) * 4;
                    self.pixels[i..i + 4].copy_from_slice(&color);
                    written += 1;
                }
            }
        }
        written
    }

    pub fn into_image(self) -> RenderedImage {
        RenderedImage {
            rgba: self.pixels,
            width: self.width,
            height: self.height,
            bounds: self.bounds,
        }
    }
}

/// Even-odd crossing test against a four-vertex polygon.
#[inline]
fn point_in_quad(x: f64, y: f64, quad: &[(f64, f64); 4]) -> bool {
    let mut inside = false;
    let mut j = 3;
    for i in 0..4 {
        let (xi, yi) = quad[i];
        let (xj, yj) = quad[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// A finished raster with the geographic extent it covers.
#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub rgba: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub bounds: GeoBounds,
}

impl RenderedImage {
    pub fn to_png(&self) -> RenderResult<Vec<u8>> {
        create_png(&self.rgba, self.width, self.height)
    }

    /// Count of pixels that are not fully transparent.
    pub fn opaque_pixels(&self) -> usize {
        self.rgba.chunks_exact(4).filter(|px| px[3] != 0).count()
    }
}

/// Draw every valid pixel of `rgb` onto `canvas` using the corner mesh.
pub fn render_mesh(
    mesh: &GeolocationMesh,
    rgb: &RgbImage,
    mut canvas: Canvas,
) -> RenderResult<RenderedImage> {
    if mesh.rows != rgb.rows || mesh.cols != rgb.cols {
        return Err(RenderError::MeshMismatch {
            mesh_rows: mesh.rows,
            mesh_cols: mesh.cols,
            rows: rgb.rows,
            cols: rgb.cols,
        });
    }

    // Project each corner once; neighbouring quads share them
    let corner_cols = mesh.corner_cols();
    let corners: Vec<(f64, f64)> = mesh
        .lon
        .iter()
        .zip(&mesh.lat)
        .map(|(&lon, &lat)| canvas.to_pixel(lon, lat))
        .collect();

    let mut drawn = 0usize;
    let mut skipped = 0usize;
    for row in 0..mesh.rows {
        for col in 0..mesh.cols {
            let Some(color) = rgb.rgba8(row, col) else {
                skipped += 1;
                continue;
            };
            if mesh.is_no_data(row, col) {
                skipped += 1;
                continue;
            }
            let top = row * corner_cols + col;
            let bottom = top + corner_cols;
            let quad = [
                corners[top],
                corners[top + 1],
                corners[bottom + 1],
                corners[bottom],
            ];
            drawn += canvas.fill_quad(&quad, color);
        }
    }

    debug!(
        width = canvas.width(),
        height = canvas.height(),
        drawn,
        skipped,
        "Rasterized pixel grid"
    );

    Ok(canvas.into_image())
}
