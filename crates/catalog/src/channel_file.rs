//! Reading channel rasters from downloaded NetCDF files.
//!
//! libnetcdf wraps HDF5 and needs a file path, so downloaded bytes are
//! written to a temporary file first. On Linux `/dev/shm` is used when it is
//! writable.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

use netcdf::AttributeValue;
use sat_common::time::{parse_start_date_time, parse_token};
use sat_common::TokenFormat;
use tracing::debug;

use crate::error::{CatalogError, CatalogResult};
use crate::model::{ChannelDataset, DatasetHandle};

/// Grid-mapping variables that may carry the projection origin longitude.
const PROJECTION_VARIABLES: [&str; 3] = [
    "fixedgrid_projection",
    "goes_imager_projection",
    "projection",
];

/// Silence HDF5's automatic error printing to stderr.
///
/// HDF5 reports lookups of absent optional attributes on stderr even though
/// they are handled here. Call once early in `main`; later calls are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 with a null handler only disables printing.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Read one channel from the bytes of a downloaded dataset.
pub fn read_channel_bytes(
    bytes: &[u8],
    variable: &str,
    handle: &DatasetHandle,
    token_format: TokenFormat,
) -> CatalogResult<ChannelDataset> {
    silence_hdf5_errors();

    // Removed when dropped, on error paths too
    let mut temp = tempfile::Builder::new()
        .prefix("geocolor_")
        .suffix(".nc")
        .tempfile_in(scratch_dir())?;
    temp.write_all(bytes)?;
    temp.flush()?;

    read_channel_file(temp.path(), variable, handle, token_format)
}

/// Read and unpack `variable`, its `x`/`y` axes, the sub-satellite longitude
/// and the scan start time from a NetCDF file.
///
/// The valid time falls back to the entry name's token when the file has no
/// `start_date_time` attribute.
pub fn read_channel_file(
    path: &Path,
    variable: &str,
    handle: &DatasetHandle,
    token_format: TokenFormat,
) -> CatalogResult<ChannelDataset> {
    let file = netcdf::open(path).map_err(|e| {
        CatalogError::NetCdf(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let var = file
        .variable(variable)
        .ok_or_else(|| CatalogError::MissingData(format!("variable {}", variable)))?;
    let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let (rows, cols) = grid_shape(variable, &dims)?;

    let raw: Vec<f64> = var
        .get_values(..)
        .map_err(|e| CatalogError::NetCdf(format!("Failed to read {}: {}", variable, e)))?;
    let packing = Packing::of(&var);
    let values: Vec<f32> = raw.iter().map(|&v| packing.unpack(v) as f32).collect();

    let x = read_axis(&file, "x", cols)?;
    let y = read_axis(&file, "y", rows)?;

    let sub_satellite_lon = global_attr(&file, "satellite_longitude")
        .and_then(|v| f64::try_from(v).ok())
        .or_else(|| {
            PROJECTION_VARIABLES.iter().find_map(|name| {
                let proj = file.variable(name)?;
                f64::try_from(attr(&proj, "longitude_of_projection_origin")?).ok()
            })
        })
        .ok_or_else(|| CatalogError::MissingData("satellite_longitude".to_string()))?;

    let valid_time = match global_attr(&file, "start_date_time").and_then(text) {
        Some(s) => parse_start_date_time(&s)?,
        None => parse_token(&handle.token, token_format)?,
    };

    debug!(
        variable,
        rows,
        cols,
        fill = ?packing.fill_value,
        scale = packing.scale_factor,
        "Read channel file"
    );

    Ok(ChannelDataset {
        channel: handle.channel.clone(),
        rows,
        cols,
        values,
        x,
        y,
        sub_satellite_lon,
        token: handle.token.clone(),
        valid_time,
    })
}

/// (rows, cols) of a 2-D variable, allowing leading singleton dimensions.
fn grid_shape(variable: &str, dims: &[usize]) -> CatalogResult<(usize, usize)> {
    match dims {
        [rows, cols] => Ok((*rows, *cols)),
        [lead @ .., rows, cols] if lead.iter().all(|&d| d == 1) => Ok((*rows, *cols)),
        _ => Err(CatalogError::InvalidFormat(format!(
            "{} must be 2-D, got dims {:?}",
            variable, dims
        ))),
    }
}

fn read_axis(file: &netcdf::File, name: &str, expected: usize) -> CatalogResult<Vec<f64>> {
    let var = file
        .variable(name)
        .ok_or_else(|| CatalogError::MissingData(format!("axis {}", name)))?;
    let raw: Vec<f64> = var
        .get_values(..)
        .map_err(|e| CatalogError::NetCdf(format!("Failed to read axis {}: {}", name, e)))?;
    if raw.len() != expected {
        return Err(CatalogError::InvalidFormat(format!(
            "axis {} has {} values, grid needs {}",
            name,
            raw.len(),
            expected
        )));
    }
    let packing = Packing::of(&var);
    Ok(raw.into_iter().map(|v| packing.unpack(v)).collect())
}

/// CF packed-integer attributes of a variable; absent ones are identity.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    scale_factor: f64,
    add_offset: f64,
    fill_value: Option<f64>,
    /// Wrap span for signed storage flagged `_Unsigned`
    unsigned_span: Option<f64>,
}

impl Packing {
    fn of(var: &netcdf::Variable) -> Self {
        let fill = attr(var, "_FillValue");
        let unsigned = attr(var, "_Unsigned")
            .and_then(text)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let unsigned_span = unsigned.then(|| match &fill {
            Some(AttributeValue::Schar(_)) | Some(AttributeValue::Uchar(_)) => 256.0,
            Some(AttributeValue::Int(_)) | Some(AttributeValue::Uint(_)) => 4_294_967_296.0,
            _ => 65_536.0,
        });

        Self {
            scale_factor: number(var, "scale_factor").unwrap_or(1.0),
            add_offset: number(var, "add_offset").unwrap_or(0.0),
            fill_value: fill.and_then(|v| f64::try_from(v).ok()),
            unsigned_span,
        }
    }

    /// Unpack one stored value. Fill and NaN become NaN.
    #[inline]
    fn unpack(&self, raw: f64) -> f64 {
        if raw.is_nan() || self.fill_value == Some(raw) {
            return f64::NAN;
        }
        let raw = match self.unsigned_span {
            Some(span) if raw < 0.0 => raw + span,
            _ => raw,
        };
        raw * self.scale_factor + self.add_offset
    }
}

/// Attribute value, checking presence first so HDF5 stays quiet.
fn attr(var: &netcdf::Variable, name: &str) -> Option<AttributeValue> {
    if !var.attributes().any(|a| a.name() == name) {
        return None;
    }
    var.attribute_value(name)?.ok()
}

fn number(var: &netcdf::Variable, name: &str) -> Option<f64> {
    f64::try_from(attr(var, name)?).ok()
}

fn global_attr(file: &netcdf::File, name: &str) -> Option<AttributeValue> {
    if !file.attributes().any(|a| a.name() == name) {
        return None;
    }
    file.attribute(name)?.value().ok()
}

fn text(value: AttributeValue) -> Option<String> {
    match value {
        AttributeValue::Str(s) => Some(s),
        AttributeValue::Strs(v) => v.into_iter().next(),
        _ => None,
    }
}

/// Memory-backed tmpfs on Linux when writable, else the system temp dir.
fn scratch_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm = Path::new("/dev/shm");
        if shm.is_dir() {
            let marker = shm.join(format!(".geocolor_{}", std::process::id()));
            if std::fs::write(&marker, b"").is_ok() {
                let _ = std::fs::remove_file(&marker);
                return shm.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}
