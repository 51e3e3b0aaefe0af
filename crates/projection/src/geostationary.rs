//! Geostationary fixed-grid projection.
//!
//! This projection is used for GOES-R series satellite imagery.
//! The satellite views Earth from a fixed position above the equator,
//! and coordinates are expressed as scan angles in radians from nadir.
//!
//! Reference: GOES-R Product Definition and Users' Guide (PUG) Volume 4

/// GRS80 semi-major axis (meters).
pub const GRS80_SEMI_MAJOR: f64 = 6378137.0;
/// GRS80 semi-minor axis (meters).
pub const GRS80_SEMI_MINOR: f64 = 6356752.31414;
/// GOES-R perspective point height above the surface (meters).
pub const GOES_PERSPECTIVE_HEIGHT: f64 = 35786023.0;

/// Geostationary projection parameters.
///
/// Converts satellite scan angles (x, y) to Earth-centered Cartesian
/// coordinates and geodetic longitude/latitude. The sweep angle axis is x,
/// as for GOES-R.
#[derive(Debug, Clone)]
pub struct Geostationary {
    /// Satellite height above Earth center (meters)
    /// This is perspective_point_height + semi_major_axis
    pub h: f64,
    /// Semi-major axis of Earth ellipsoid (meters)
    pub req: f64,
    /// Semi-minor axis of Earth ellipsoid (meters)
    pub rpol: f64,
    /// Longitude of satellite nadir point (radians)
    pub lambda_0: f64,
}

impl Geostationary {
    /// Create a projection from the satellite's imager parameters.
    ///
    /// # Arguments
    /// * `perspective_point_height` - Satellite altitude above Earth surface (meters)
    /// * `semi_major_axis` - Earth equatorial radius (meters)
    /// * `semi_minor_axis` - Earth polar radius (meters)
    /// * `sub_satellite_lon_deg` - Satellite longitude (degrees, negative for west)
    pub fn new(
        perspective_point_height: f64,
        semi_major_axis: f64,
        semi_minor_axis: f64,
        sub_satellite_lon_deg: f64,
    ) -> Self {
        Self {
            h: perspective_point_height + semi_major_axis,
            req: semi_major_axis,
            rpol: semi_minor_axis,
            lambda_0: sub_satellite_lon_deg.to_radians(),
        }
    }

    /// GOES-R imager geometry over the given sub-satellite longitude.
    pub fn goes(sub_satellite_lon_deg: f64) -> Self {
        Self::new(
            GOES_PERSPECTIVE_HEIGHT,
            GRS80_SEMI_MAJOR,
            GRS80_SEMI_MINOR,
            sub_satellite_lon_deg,
        )
    }

    /// Sub-satellite longitude in degrees.
    pub fn sub_satellite_lon(&self) -> f64 {
        self.lambda_0.to_degrees()
    }

    /// Intersect a scan ray with the ellipsoid and return the Earth-centered,
    /// Earth-fixed position of the ground point (meters, zero height).
    ///
    /// Based on GOES-R PUG Volume 4, Section 4.2.8.
    /// Returns None if the scan angle points past the limb.
    pub fn scan_to_ecef(&self, x_rad: f64, y_rad: f64) -> Option<[f64; 3]> {
        let sin_x = x_rad.sin();
        let cos_x = x_rad.cos();
        let sin_y = y_rad.sin();
        let cos_y = y_rad.cos();

        // Quadratic coefficients for finding distance to Earth surface
        let a = sin_x.powi(2)
            + cos_x.powi(2) * (cos_y.powi(2) + (self.req / self.rpol).powi(2) * sin_y.powi(2));
        let b = -2.0 * self.h * cos_x * cos_y;
        let c = self.h.powi(2) - self.req.powi(2);

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let rs = (-b - discriminant.sqrt()) / (2.0 * a);

        // Satellite-to-point vector in the satellite frame
        let sx = rs * cos_x * cos_y;
        let sy = -rs * sin_x;
        let sz = rs * cos_x * sin_y;

        // Earth-centered, in the frame whose x axis passes through nadir
        let px = self.h - sx;
        let py = -sy;

        // Rotate about the polar axis by the sub-satellite longitude
        let (sin_l, cos_l) = self.lambda_0.sin_cos();
        Some([px * cos_l - py * sin_l, px * sin_l + py * cos_l, sz])
    }

    /// Convert Earth-centered Cartesian coordinates to geodetic
    /// (longitude degrees, latitude degrees, height meters).
    ///
    /// Closed-form Bowring solution; exact enough for surface points that no
    /// iteration is needed.
    pub fn ecef_to_geodetic(&self, ecef: [f64; 3]) -> (f64, f64, f64) {
        let [x, y, z] = ecef;
        let a = self.req;
        let b = self.rpol;
        let e2 = 1.0 - (b / a).powi(2);
        let ep2 = (a / b).powi(2) - 1.0;

        let p = x.hypot(y);
        let theta = (z * a).atan2(p * b);
        let (sin_t, cos_t) = theta.sin_cos();

        let lat = (z + ep2 * b * sin_t.powi(3)).atan2(p - e2 * a * cos_t.powi(3));
        let lon = y.atan2(x);

        let sin_lat = lat.sin();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let alt = if lat.cos().abs() > 1e-10 {
            p / lat.cos() - n
        } else {
            z.abs() - b
        };

        (lon.to_degrees(), lat.to_degrees(), alt)
    }

    /// Convert scan angles (radians) to geographic coordinates (lon/lat degrees).
    ///
    /// Returns None if the scan angle points to space (off Earth).
    pub fn scan_to_geo(&self, x_rad: f64, y_rad: f64) -> Option<(f64, f64)> {
        let ecef = self.scan_to_ecef(x_rad, y_rad)?;
        let (lon, lat, _alt) = self.ecef_to_geodetic(ecef);
        Some((lon, lat))
    }

    /// Convert geographic coordinates (lon/lat degrees) to scan angles (radians).
    ///
    /// Based on GOES-R PUG Volume 4, Section 4.2.8.
    /// Returns None if the point is not visible from the satellite.
    pub fn geo_to_scan(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let lat_rad = lat_deg.to_radians();
        let lon_rad = lon_deg.to_radians();

        // Geocentric latitude (accounting for Earth's oblateness)
        let phi_c = ((self.rpol / self.req).powi(2) * lat_rad.tan()).atan();

        // Eccentricity squared
        let e2 = 1.0 - (self.rpol / self.req).powi(2);

        // Radius from Earth center to surface point
        let rc = self.rpol / (1.0 - e2 * phi_c.cos().powi(2)).sqrt();

        let sx = self.h - rc * phi_c.cos() * (lon_rad - self.lambda_0).cos();
        let sy = -rc * phi_c.cos() * (lon_rad - self.lambda_0).sin();
        let sz = rc * phi_c.sin();

        // Point must face the satellite
        if self.h * (self.h - sx) < sy.powi(2) + (self.req / self.rpol).powi(2) * sz.powi(2) {
            return None;
        }

        let y_rad = sz.atan2(sx.hypot(sy));
        let x_rad = (-sy).atan2(sx);

        Some((x_rad, y_rad))
    }

    /// Half-angle subtended by the equatorial limb as seen from the satellite.
    pub fn limb_angle(&self) -> f64 {
        (self.req / self.h).asin()
    }
}
