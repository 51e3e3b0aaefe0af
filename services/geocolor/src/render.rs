//! Display and GIS render targets.

use std::fmt;

use projection::GeolocationMesh;
use renderer::{
    render_mesh, Canvas, MapProjection, RenderError, RenderResult, RenderedImage, RgbImage,
    TRANSPARENT, WHITE,
};
use sat_common::GeoBounds;

use crate::config::{GisMode, RenderSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Opaque, decorated, fixed sector
    Display,
    /// Transparent, undecorated, georeferenced
    Gis,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Display => write!(f, "display"),
            TargetKind::Gis => write!(f, "gis"),
        }
    }
}

/// Canvas parameters for one output image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    pub kind: TargetKind,
    pub width: usize,
    pub height: usize,
    pub projection: MapProjection,
    /// Fixed extent, or `None` to use the data's own bounds
    pub extent: Option<GeoBounds>,
    pub background: [u8; 4],
}

impl RenderTarget {
    pub fn display(settings: &RenderSettings, sector: GeoBounds) -> Self {
        Self {
            kind: TargetKind::Display,
            width: settings.width,
            height: settings.height,
            projection: MapProjection::PlateCarree,
            extent: Some(sector),
            background: WHITE,
        }
    }

    pub fn gis(settings: &RenderSettings, sector: GeoBounds) -> Self {
        let (projection, extent) = match settings.gis_mode {
            GisMode::Rectangular => (MapProjection::PlateCarree, Some(sector)),
            GisMode::WebMercator => (MapProjection::WebMercator, None),
        };
        Self {
            kind: TargetKind::Gis,
            width: settings.width,
            height: settings.height,
            projection,
            extent,
            background: TRANSPARENT,
        }
    }
}

/// Rasterize the composite onto `target`.
pub fn render(
    mesh: &GeolocationMesh,
    rgb: &RgbImage,
    target: &RenderTarget,
) -> RenderResult<RenderedImage> {
    let bounds = match target.extent {
        Some(bounds) => bounds,
        None => mesh
            .bounds()
            .ok_or_else(|| RenderError::InvalidBounds("mesh has no finite corners".to_string()))?,
    };
    let canvas = Canvas::new(
        target.width,
        target.height,
        bounds,
        target.projection,
        target.background,
    )?;
    render_mesh(mesh, rgb, canvas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gis_modes() {
        let sector = GeoBounds::conus();
        let mut settings = RenderSettings::default();

        let rect = RenderTarget::gis(&settings, sector);
        assert_eq!(rect.projection, MapProjection::PlateCarree);
        assert_eq!(rect.extent, Some(sector));
        assert_eq!(rect.background, TRANSPARENT);

        settings.gis_mode = GisMode::WebMercator;
        let merc = RenderTarget::gis(&settings, sector);
        assert_eq!(merc.projection, MapProjection::WebMercator);
        assert!(merc.extent.is_none());

        let display = RenderTarget::display(&settings, sector);
        assert_eq!(display.projection, MapProjection::PlateCarree);
        assert_eq!(display.background, WHITE);
        assert_eq!((display.width, display.height), (3840, 2160));
    }
}
