//! Synthetic data generators for satellite compositing tests.
//!
//! These generators create predictable, verifiable patterns: fixed-grid scan
//! axes, reflectance-like channel bands and catalog entry names.

/// GOES-East CONUS sector scan-angle range along x, in microradians.
pub const CONUS_X_MICRORAD: (f64, f64) = (-101_360.0, 38_640.0);

/// GOES-East CONUS sector scan-angle range along y (north first), in microradians.
pub const CONUS_Y_MICRORAD: (f64, f64) = (128_240.0, 44_240.0);

/// Sub-satellite longitude of GOES-East.
pub const GOES_EAST_LON: f64 = -75.0;

/// `n` evenly spaced values from `start` to `end` inclusive.
///
/// # Example
///
/// ```
/// use test_utils::linspace;
///
/// assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
/// ```
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Microradian axes spanning the CONUS sector at reduced resolution.
///
/// Returns `(x_axis, y_axis)` with `cols` and `rows` entries.
pub fn conus_axes(cols: usize, rows: usize) -> (Vec<f64>, Vec<f64>) {
    (
        linspace(CONUS_X_MICRORAD.0, CONUS_X_MICRORAD.1, cols),
        linspace(CONUS_Y_MICRORAD.0, CONUS_Y_MICRORAD.1, rows),
    )
}

/// Microradian axes straddling the western limb of the disk.
///
/// The westernmost columns of the northern rows look past the Earth.
pub fn limb_axes(cols: usize, rows: usize) -> (Vec<f64>, Vec<f64>) {
    (
        linspace(-160_000.0, -120_000.0, cols),
        linspace(90_000.0, 50_000.0, rows),
    )
}

/// Reflectance-like band: a diagonal gradient from 0 to `peak`.
///
/// Row-major, `cols * rows` values.
pub fn create_reflectance_band(cols: usize, rows: usize, peak: f32) -> Vec<f32> {
    let denom = (cols + rows).saturating_sub(2).max(1) as f32;
    let mut data = Vec::with_capacity(cols * rows);
    for row in 0..rows {
        for col in 0..cols {
            data.push((row + col) as f32 / denom * peak);
        }
    }
    data
}

/// Constant band, e.g. for a uniform color.
pub fn create_constant_band(cols: usize, rows: usize, value: f32) -> Vec<f32> {
    vec![value; cols * rows]
}

/// Catalog entry name of a CONUS cloud and moisture imagery file.
///
/// The scan-start token is the fourth `_`-separated field.
///
/// # Example
///
/// ```
/// use test_utils::entry_name;
///
/// let name = entry_name(1, "s20230861801170");
/// assert_eq!(name.split('_').nth(3), Some("s20230861801170"));
/// ```
pub fn entry_name(channel: u8, token: &str) -> String {
    format!(
        "OR_ABI-L2-CMIPC-M6C{:02}_G16_{}_e20230861803543_c20230861804003.nc",
        channel, token
    )
}

/// Entry names for the blue, red and green channels sharing one token.
pub fn entry_triple(token: &str) -> [String; 3] {
    [entry_name(1, token), entry_name(2, token), entry_name(3, token)]
}
