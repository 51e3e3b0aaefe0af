//! Product metadata documents under `output/metadata/`.
//!
//! Two documents exist per product:
//! - `products/<id>/<YYYYMMDDHH00>.json`: the frames of one run hour
//! - `<id>.json`: a rollup with the wall-clock time of the last publish

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sat_common::time::{minute_stamp, parse_minute_stamp, run_stamp};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PublishError;

/// One published frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFrame {
    pub fhour: i64,
    pub filename: String,
    #[serde(rename = "gisInfo")]
    pub gis_info: [String; 2],
    /// `YYYYMMDDHHMM`
    pub valid: String,
}

impl ProductFrame {
    pub fn valid_time(&self) -> Option<DateTime<Utc>> {
        parse_minute_stamp(&self.valid).ok()
    }
}

/// Frames published for one product within one run hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetadata {
    pub product_id: u32,
    pub run_name: String,
    pub last_reload_time: String,
    pub available_frame_count: usize,
    pub product_frames: Vec<ProductFrame>,
}

impl RunMetadata {
    pub fn new(product_id: u32, run_hour: DateTime<Utc>) -> Self {
        let stamp = run_stamp(run_hour);
        Self {
            product_id,
            run_name: stamp.clone(),
            last_reload_time: stamp,
            available_frame_count: 0,
            product_frames: Vec::new(),
        }
    }

    /// Valid time of the last frame, if it parses.
    pub fn latest_valid(&self) -> Option<DateTime<Utc>> {
        self.product_frames.last().and_then(ProductFrame::valid_time)
    }

    /// Insert a frame keeping the list ordered by `valid`.
    ///
    /// A frame with the same `valid` stamp is replaced.
    pub fn upsert_frame(&mut self, frame: ProductFrame) {
        match self
            .product_frames
            .binary_search_by(|f| f.valid.as_str().cmp(frame.valid.as_str()))
        {
            Ok(i) => self.product_frames[i] = frame,
            Err(i) => self.product_frames.insert(i, frame),
        }
        self.available_frame_count = self.product_frames.len();
    }
}

/// Per-product summary read by the watchdog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRollup {
    pub product_id: u32,
    /// Wall-clock minute of the last publish, `YYYYMMDDHHMM`
    pub last_reload_time: String,
    pub reload_interval: u32,
    pub latest_run: String,
}

impl ProductRollup {
    pub fn new(
        product_id: u32,
        published_at: DateTime<Utc>,
        reload_interval: u32,
        run_hour: DateTime<Utc>,
    ) -> Self {
        Self {
            product_id,
            last_reload_time: minute_stamp(published_at),
            reload_interval,
            latest_run: run_stamp(run_hour),
        }
    }

    pub fn last_reload(&self) -> Option<DateTime<Utc>> {
        parse_minute_stamp(&self.last_reload_time).ok()
    }
}

/// Filesystem access to the metadata tree.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    /// `output_dir` is the `output/` directory; documents live in its `metadata/`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            root: output_dir.as_ref().join("metadata"),
        }
    }

    pub fn run_path(&self, product_id: u32, run_hour: DateTime<Utc>) -> PathBuf {
        self.root
            .join("products")
            .join(product_id.to_string())
            .join(format!("{}.json", run_stamp(run_hour)))
    }

    pub fn rollup_path(&self, product_id: u32) -> PathBuf {
        self.root.join(format!("{}.json", product_id))
    }

    /// Read a run document. Missing or unreadable documents yield `None`.
    pub fn load_run(&self, product_id: u32, run_hour: DateTime<Utc>) -> Option<RunMetadata> {
        read_document(&self.run_path(product_id, run_hour))
    }

    pub fn load_rollup(&self, product_id: u32) -> Option<ProductRollup> {
        read_document(&self.rollup_path(product_id))
    }

    pub async fn save_run(
        &self,
        doc: &RunMetadata,
        run_hour: DateTime<Utc>,
    ) -> Result<(), PublishError> {
        write_document(&self.run_path(doc.product_id, run_hour), doc).await
    }

    pub async fn save_rollup(&self, doc: &ProductRollup) -> Result<(), PublishError> {
        write_document(&self.rollup_path(doc.product_id), doc).await
    }
}

fn read_document<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable metadata document");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed metadata document ignored");
            None
        }
    }
}

/// Write through a temporary sibling and rename so readers never see a
/// partial document.
async fn write_document<T: Serialize>(path: &Path, doc: &T) -> Result<(), PublishError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PublishError::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, text)
        .await
        .map_err(|e| PublishError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PublishError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frame(valid: &str) -> ProductFrame {
        ProductFrame {
            fhour: 0,
            filename: format!("{}.png", &valid[10..12]),
            gis_info: ["0,0".to_string(), "0,0".to_string()],
            valid: valid.to_string(),
        }
    }

    #[test]
    fn test_upsert_orders_and_replaces() {
        let hour = Utc.with_ymd_and_hms(2023, 3, 27, 18, 0, 0).unwrap();
        let mut doc = RunMetadata::new(5, hour);
        doc.upsert_frame(frame("202303271811"));
        doc.upsert_frame(frame("202303271801"));
        doc.upsert_frame(frame("202303271806"));

        let mut replacement = frame("202303271806");
        replacement.gis_info = ["24,-125".to_string(), "50,-65".to_string()];
        doc.upsert_frame(replacement.clone());

        let valids: Vec<_> = doc.product_frames.iter().map(|f| f.valid.as_str()).collect();
        assert_eq!(valids, ["202303271801", "202303271806", "202303271811"]);
        assert_eq!(doc.available_frame_count, 3);
        assert_eq!(doc.product_frames[1], replacement);
        assert_eq!(
            doc.latest_valid(),
            Some(Utc.with_ymd_and_hms(2023, 3, 27, 18, 11, 0).unwrap())
        );
    }

    #[test]
    fn test_json_field_names() {
        let hour = Utc.with_ymd_and_hms(2023, 3, 27, 18, 0, 0).unwrap();
        let mut doc = RunMetadata::new(4, hour);
        doc.upsert_frame(frame("202303271801"));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["productId"], 4);
        assert_eq!(value["runName"], "202303271800");
        assert_eq!(value["lastReloadTime"], "202303271800");
        assert_eq!(value["availableFrameCount"], 1);
        assert_eq!(value["productFrames"][0]["gisInfo"][0], "0,0");
        assert_eq!(value["productFrames"][0]["filename"], "01.png");

        let published = Utc.with_ymd_and_hms(2023, 3, 27, 18, 4, 31).unwrap();
        let rollup = serde_json::to_value(ProductRollup::new(4, published, 270, hour)).unwrap();
        assert_eq!(rollup["lastReloadTime"], "202303271804");
        assert_eq!(rollup["latestRun"], "202303271800");
        assert_eq!(rollup["reloadInterval"], 270);
    }

    #[tokio::test]
    async fn test_store_roundtrip_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(dir.path());
        let hour = Utc.with_ymd_and_hms(2023, 3, 27, 18, 0, 0).unwrap();

        assert!(store.load_run(5, hour).is_none());

        let mut doc = RunMetadata::new(5, hour);
        doc.upsert_frame(frame("202303271801"));
        store.save_run(&doc, hour).await.unwrap();
        assert_eq!(store.load_run(5, hour), Some(doc));
        assert!(store
            .run_path(5, hour)
            .ends_with("metadata/products/5/202303271800.json"));

        std::fs::write(store.rollup_path(5), "{not json").unwrap();
        assert!(store.load_rollup(5).is_none());
    }
}
