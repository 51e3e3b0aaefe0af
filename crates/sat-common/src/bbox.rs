//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in degrees.
///
/// Longitudes are on the x axis, latitudes on the y axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Default CONUS sector used by the display product.
    pub fn conus() -> Self {
        Self::new(-125.0, 24.0, -65.0, 50.0)
    }

    /// Parse an extent string: "min_lon,min_lat,max_lon,max_lat"
    pub fn from_extent_str(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        let bounds = Self::new(values[0], values[1], values[2], values[3]);
        if !bounds.is_valid() {
            return Err(BboxParseError::Degenerate(s.to_string()));
        }
        Ok(bounds)
    }

    /// Smallest box containing every finite (lon, lat) pair.
    ///
    /// Returns `None` when no pair is finite.
    pub fn enclosing<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (&'a f64, &'a f64)>,
    {
        let mut bounds: Option<Self> = None;
        for (&lon, &lat) in points {
            if !lon.is_finite() || !lat.is_finite() {
                continue;
            }
            bounds = Some(match bounds {
                None => Self::new(lon, lat, lon, lat),
                Some(b) => Self::new(
                    b.min_lon.min(lon),
                    b.min_lat.min(lat),
                    b.max_lon.max(lon),
                    b.max_lat.max(lat),
                ),
            });
        }
        bounds
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// True when the box has positive area and finite corners.
    pub fn is_valid(&self) -> bool {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    /// Check if a point is contained within this box.
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// Clamp the latitude range, e.g. to the valid band of a projection.
    pub fn clamp_lat(&self, limit: f64) -> Self {
        Self::new(
            self.min_lon,
            self.min_lat.max(-limit),
            self.max_lon,
            self.max_lat.min(limit),
        )
    }

    /// Lower-left and upper-right corners as "lat,lon" strings.
    ///
    /// This is the `gisInfo` form written into run metadata.
    pub fn corner_strings(&self) -> [String; 2] {
        [
            format!("{},{}", self.min_lat, self.min_lon),
            format!("{},{}", self.max_lat, self.max_lon),
        ]
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid extent format: {0}. Expected 'min_lon,min_lat,max_lon,max_lat'")]
    InvalidFormat(String),

    #[error("Invalid number in extent: {0}")]
    InvalidNumber(String),

    #[error("Extent has no area: {0}")]
    Degenerate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extent() {
        let bounds = GeoBounds::from_extent_str("-125.0, 24.0, -65.0, 50.0").unwrap();
        assert_eq!(bounds, GeoBounds::conus());
    }

    #[test]
    fn test_parse_extent_rejects_inverted() {
        assert!(matches!(
            GeoBounds::from_extent_str("-65,24,-125,50"),
            Err(BboxParseError::Degenerate(_))
        ));
    }

    #[test]
    fn test_enclosing_skips_non_finite() {
        let lons = [-100.0, f64::INFINITY, -90.0];
        let lats = [30.0, 45.0, f64::NAN];
        let bounds = GeoBounds::enclosing(lons.iter().zip(lats.iter())).unwrap();
        assert_eq!(bounds, GeoBounds::new(-100.0, 30.0, -100.0, 30.0));
    }

    #[test]
    fn test_corner_strings() {
        let corners = GeoBounds::new(-125.0, 24.0, -65.0, 50.5).corner_strings();
        assert_eq!(corners[0], "24,-125");
        assert_eq!(corners[1], "50.5,-65");
    }
}
