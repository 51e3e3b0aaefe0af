//! Spherical Web Mercator (EPSG:3857).
//!
//! Used for the GIS output so images can be overlaid on slippy-map clients.

use std::f64::consts::PI;

/// WGS84 semi-major axis, the sphere radius used by EPSG:3857 (meters).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude at which Web Mercator is square (degrees).
pub const MAX_LAT: f64 = 85.05112878;

/// Project lon/lat degrees to Web Mercator meters.
///
/// Latitude is clamped to [`MAX_LAT`] so the result is always finite.
pub fn forward(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let x = EARTH_RADIUS * lon_deg.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln();
    (x, y)
}

/// Web Mercator meters back to lon/lat degrees.
pub fn inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}
