//! Common test fixtures: catalog documents, channel files and temporary
//! output trees.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

/// Common valid-time tokens.
pub mod tokens {
    /// Scan start 2023-03-27T18:01:17.0Z (day 086)
    pub const SCAN_1801: &str = "s20230861801170";
    /// Five minutes later
    pub const SCAN_1806: &str = "s20230861806170";
    /// Same minute as [`SCAN_1801`] at lower precision
    pub const SCAN_1801_SHORT: &str = "s202308618011";
    /// `start_date_time` attribute matching [`SCAN_1801`]
    pub const START_1801: &str = "2023086180117";
}

/// A THREDDS `catalog.xml` listing `names` (oldest first) under `dir`.
pub fn catalog_xml(names: &[&str], dir: &str) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0" version="1.0.1">
  <service name="DefaultServices" serviceType="Compound" base="">
    <service name="HTTPServer" serviceType="HTTPServer" base="/thredds/fileServer/" />
  </service>
  <dataset name="current">
"#,
    );
    for name in names {
        let _ = writeln!(
            xml,
            concat!(
                r#"    <dataset name="{name}" urlPath="{dir}/{name}">"#,
                r#"<dataSize units="Mbytes">1.1</dataSize></dataset>"#,
            ),
            name = name,
            dir = dir,
        );
    }
    xml.push_str("  </dataset>\n</catalog>\n");
    xml
}

/// Scale factor of the synthetic channel files: counts are 1/4096 reflectance.
pub const COUNT_SCALE: f32 = 1.0 / 4096.0;

/// Contents of a synthetic Sectorized CMI NetCDF file.
///
/// Samples are stored as `short` flagged `_Unsigned`, fill value -1, scaled by
/// [`COUNT_SCALE`]. Axes are stored as doubles in microradians.
#[derive(Debug, Clone)]
pub struct ChannelFileFixture {
    pub variable: String,
    /// Stored counts, row-major, `y.len() * x.len()` values
    pub raw: Vec<i16>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Global `satellite_longitude`
    pub satellite_longitude: Option<f64>,
    /// `longitude_of_projection_origin` on `goes_imager_projection`
    pub projection_origin: Option<f64>,
    /// Global `start_date_time`
    pub start_date_time: Option<String>,
}

impl ChannelFileFixture {
    pub fn new(variable: &str, raw: Vec<i16>, x: Vec<f64>, y: Vec<f64>) -> Self {
        assert_eq!(raw.len(), x.len() * y.len(), "raw counts must fill the grid");
        Self {
            variable: variable.to_string(),
            raw,
            x,
            y,
            satellite_longitude: Some(crate::GOES_EAST_LON),
            projection_origin: None,
            start_date_time: None,
        }
    }

    /// Write the file to `path`.
    pub fn write(&self, path: &Path) {
        let mut file = netcdf::create(path).expect("Failed to create NetCDF fixture");
        file.add_dimension("y", self.y.len()).expect("y dimension");
        file.add_dimension("x", self.x.len()).expect("x dimension");

        {
            let mut var = file
                .add_variable::<i16>(&self.variable, &["y", "x"])
                .expect("data variable");
            var.set_fill_value(-1i16).expect("fill value");
            var.put_attribute("scale_factor", COUNT_SCALE).expect("scale_factor");
            var.put_attribute("add_offset", 0.0f32).expect("add_offset");
            var.put_attribute("_Unsigned", "true").expect("_Unsigned");
            var.put_values(&self.raw, ..).expect("data values");
        }
        for (name, axis) in [("x", &self.x), ("y", &self.y)] {
            let mut var = file.add_variable::<f64>(name, &[name]).expect("axis variable");
            var.put_attribute("units", "microradian").expect("units");
            var.put_values(axis, ..).expect("axis values");
        }
        if let Some(lon) = self.projection_origin {
            let mut var = file
                .add_variable::<i32>("goes_imager_projection", &[])
                .expect("projection variable");
            var.put_attribute("longitude_of_projection_origin", lon)
                .expect("projection origin");
        }
        if let Some(lon) = self.satellite_longitude {
            file.add_attribute("satellite_longitude", lon)
                .expect("satellite_longitude");
        }
        if let Some(start) = &self.start_date_time {
            file.add_attribute("start_date_time", start.as_str())
                .expect("start_date_time");
        }
    }

    /// The file's bytes, as served by a THREDDS file server.
    pub fn to_bytes(&self) -> Vec<u8> {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("channel.nc");
        self.write(&path);
        fs::read(&path).expect("Failed to read NetCDF fixture")
    }
}

/// Raw counts for a band: a diagonal ramp up to `peak`, with the listed
/// pixel indexes set to the fill value.
pub fn raw_counts(rows: usize, cols: usize, peak: i16, fill_at: &[usize]) -> Vec<i16> {
    let denom = (rows + cols).saturating_sub(2).max(1) as i32;
    let peak = peak as i32;
    let mut counts: Vec<i16> = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r + c) as i32))
        .map(|v| (1 + v * (peak - 1) / denom) as i16)
        .collect();
    for &i in fill_at {
        counts[i] = -1;
    }
    counts
}

/// A temporary base directory laid out like a deployed worker.
pub struct OutputTree {
    dir: TempDir,
}

impl OutputTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn base(&self) -> &Path {
        self.dir.path()
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base().join("geocolor-lock.txt")
    }

    pub fn rollup_path(&self, product_id: u32) -> PathBuf {
        self.base()
            .join("output")
            .join("metadata")
            .join(format!("{}.json", product_id))
    }

    pub fn run_metadata_path(&self, product_id: u32, run_stamp: &str) -> PathBuf {
        self.base()
            .join("output")
            .join("metadata")
            .join("products")
            .join(product_id.to_string())
            .join(format!("{}.json", run_stamp))
    }

    /// Write a per-run document whose frames have the given `valid` stamps.
    pub fn write_run_metadata(&self, product_id: u32, run_stamp: &str, valid: &[&str]) -> PathBuf {
        let frames: Vec<_> = valid
            .iter()
            .map(|v| {
                json!({
                    "fhour": 0,
                    "filename": format!("{}.png", &v[10..12]),
                    "gisInfo": ["0,0", "0,0"],
                    "valid": v,
                })
            })
            .collect();
        let doc = json!({
            "productId": product_id,
            "runName": run_stamp,
            "lastReloadTime": run_stamp,
            "availableFrameCount": frames.len(),
            "productFrames": frames,
        });
        let path = self.run_metadata_path(product_id, run_stamp);
        write_json(&path, &doc);
        path
    }

    /// Write a product rollup with the given `lastReloadTime` stamp.
    pub fn write_rollup(&self, product_id: u32, last_reload_time: &str) -> PathBuf {
        let doc = json!({
            "productId": product_id,
            "lastReloadTime": last_reload_time,
            "reloadInterval": 270,
            "latestRun": format!("{}00", &last_reload_time[..10]),
        });
        let path = self.rollup_path(product_id);
        write_json(&path, &doc);
        path
    }

    pub fn write_lock(&self, contents: &str) -> PathBuf {
        let path = self.lock_path();
        fs::write(&path, contents).expect("Failed to write lock file");
        path
    }

    /// Every file under the base directory, relative to it, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        collect_files(self.base(), self.base(), &mut out);
        out.sort();
        out
    }
}

impl Default for OutputTree {
    fn default() -> Self {
        Self::new()
    }
}

fn write_json(path: &Path, doc: &serde_json::Value) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create metadata dir");
    }
    let text = serde_json::to_string_pretty(doc).expect("Failed to serialize fixture");
    fs::write(path, text).expect("Failed to write fixture");
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
}
