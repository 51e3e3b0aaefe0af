//! End-to-end rendering of a synthetic CONUS frame.

use projection::compute_mesh;
use renderer::{compose, render_mesh, Canvas, MapProjection, RenderError, TRANSPARENT, WHITE};
use sat_common::GeoBounds;
use test_utils::{conus_axes, create_constant_band, create_reflectance_band, GOES_EAST_LON};

const COLS: usize = 120;
const ROWS: usize = 72;

#[test]
fn test_display_render_fills_sector() {
    let (x, y) = conus_axes(COLS, ROWS);
    let mesh = compute_mesh(&x, &y, GOES_EAST_LON, 1e-6).unwrap();
    let band = create_reflectance_band(COLS, ROWS, 1.0);
    let rgb = compose((ROWS, COLS), &band, &band, &band, &mesh.no_data).unwrap();

    let canvas =
        Canvas::new(384, 216, GeoBounds::conus(), MapProjection::PlateCarree, WHITE).unwrap();
    let image = render_mesh(&mesh, &rgb, canvas).unwrap();

    assert_eq!(image.rgba.len(), 384 * 216 * 4);
    assert_eq!(image.bounds, GeoBounds::conus());
    // Opaque background everywhere
    assert_eq!(image.opaque_pixels(), 384 * 216);

    // The sector center is covered by data, not left white
    let center = (108 * 384 + 192) * 4;
    assert_ne!(&image.rgba[center..center + 4], &WHITE);
}

#[test]
fn test_gis_render_is_transparent_outside_data() {
    let (x, y) = conus_axes(COLS, ROWS);
    let mesh = compute_mesh(&x, &y, GOES_EAST_LON, 1e-6).unwrap();
    let band = create_constant_band(COLS, ROWS, 0.5);
    let rgb = compose((ROWS, COLS), &band, &band, &band, &mesh.no_data).unwrap();

    // Wider than the data so the margins stay empty
    let bounds = GeoBounds::new(-160.0, 0.0, -30.0, 70.0);
    let canvas = Canvas::new(260, 140, bounds, MapProjection::PlateCarree, TRANSPARENT).unwrap();
    let image = render_mesh(&mesh, &rgb, canvas).unwrap();

    let drawn = image.opaque_pixels();
    assert!(drawn > 0);
    assert!(drawn < 260 * 140);
    // Top-left corner is far outside the sector
    assert_eq!(&image.rgba[0..4], &TRANSPARENT);
    // Uniform band normalizes to 1.0
    let px = image
        .rgba
        .chunks_exact(4)
        .find(|p| p[3] == 255)
        .unwrap();
    assert_eq!(px, &[255, 255, 255, 255]);
}

#[test]
fn test_web_mercator_uses_data_bounds() {
    let (x, y) = conus_axes(COLS, ROWS);
    let mesh = compute_mesh(&x, &y, GOES_EAST_LON, 1e-6).unwrap();
    let band = create_reflectance_band(COLS, ROWS, 0.8);
    let rgb = compose((ROWS, COLS), &band, &band, &band, &mesh.no_data).unwrap();

    let bounds = mesh.bounds().unwrap();
    let canvas = Canvas::new(200, 120, bounds, MapProjection::WebMercator, TRANSPARENT).unwrap();
    let image = render_mesh(&mesh, &rgb, canvas).unwrap();

    assert_eq!(image.bounds, bounds);
    // The data's own bounding box is mostly covered
    assert!(image.opaque_pixels() > 200 * 120 / 2);
    assert!(!image.to_png().unwrap().is_empty());
}

#[test]
fn test_mesh_image_mismatch() {
    let (x, y) = conus_axes(10, 8);
    let mesh = compute_mesh(&x, &y, GOES_EAST_LON, 1e-6).unwrap();
    let band = create_constant_band(8, 10, 1.0);
    let rgb = compose((10, 8), &band, &band, &band, &[false; 80]).unwrap();

    let canvas =
        Canvas::new(10, 10, GeoBounds::conus(), MapProjection::PlateCarree, WHITE).unwrap();
    assert!(matches!(
        render_mesh(&mesh, &rgb, canvas),
        Err(RenderError::MeshMismatch { .. })
    ));
}
