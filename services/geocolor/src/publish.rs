//! Persisting rendered frames and their run records.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use renderer::RenderedImage;
use sat_common::time::{frame_file_name, minute_stamp, storage_path};
use tracing::{debug, info};

use crate::config::{AppConfig, ProductSettings, PublisherKind};
use crate::error::PublishError;
use crate::metadata::{MetadataStore, ProductFrame, ProductRollup, RunMetadata};
use crate::render::TargetKind;

/// A frame to append to a product's run metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub product_id: u32,
    pub run_hour: DateTime<Utc>,
    pub file_name: String,
    pub valid_time: DateTime<Utc>,
    /// Lower-left and upper-right corners as "lat,lon"
    pub gis_info: [String; 2],
    pub reload_interval: u32,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Encode and write `image` at `path`, relative to the output directory.
    async fn save(&self, image: &RenderedImage, path: &Path) -> Result<PathBuf, PublishError>;

    async fn write_run_record(&self, record: &RunRecord) -> Result<(), PublishError>;
}

/// Output locations for one product family.
#[derive(Debug, Clone)]
pub struct ProductPaths {
    category: String,
    satellite: String,
    product: String,
}

impl ProductPaths {
    pub fn new(settings: &ProductSettings) -> Self {
        Self {
            category: settings.category.clone(),
            satellite: settings.satellite.clone(),
            product: settings.product.clone(),
        }
    }

    /// `products|gisproducts/<category>/<satellite>/<product>/YYYY/MM/DD/HH00/MM.png`
    pub fn image_path(&self, kind: TargetKind, valid: DateTime<Utc>) -> PathBuf {
        let root = match kind {
            TargetKind::Display => "products",
            TargetKind::Gis => "gisproducts",
        };
        PathBuf::from(root)
            .join(&self.category)
            .join(&self.satellite)
            .join(&self.product)
            .join(storage_path(valid))
            .join(frame_file_name(valid))
    }
}

async fn write_png(
    output_dir: &Path,
    image: &RenderedImage,
    path: &Path,
) -> Result<PathBuf, PublishError> {
    let full = output_dir.join(path);
    if let Some(parent) = full.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PublishError::io(parent, e))?;
    }
    let png = image.to_png()?;
    tokio::fs::write(&full, &png)
        .await
        .map_err(|e| PublishError::io(&full, e))?;
    debug!(path = %full.display(), bytes = png.len(), "Wrote image");
    Ok(full)
}

/// Images plus per-run metadata and product rollups.
#[derive(Debug, Clone)]
pub struct HdwxPublisher {
    output_dir: PathBuf,
    store: MetadataStore,
}

impl HdwxPublisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let store = MetadataStore::new(&output_dir);
        Self { output_dir, store }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }
}

#[async_trait]
impl Publisher for HdwxPublisher {
    async fn save(&self, image: &RenderedImage, path: &Path) -> Result<PathBuf, PublishError> {
        write_png(&self.output_dir, image, path).await
    }

    async fn write_run_record(&self, record: &RunRecord) -> Result<(), PublishError> {
        let mut doc = self
            .store
            .load_run(record.product_id, record.run_hour)
            .unwrap_or_else(|| RunMetadata::new(record.product_id, record.run_hour));

        let fhour = (record.valid_time - record.run_hour).num_hours();
        doc.upsert_frame(ProductFrame {
            fhour,
            filename: record.file_name.clone(),
            gis_info: record.gis_info.clone(),
            valid: minute_stamp(record.valid_time),
        });
        self.store.save_run(&doc, record.run_hour).await?;

        let rollup = ProductRollup::new(
            record.product_id,
            Utc::now(),
            record.reload_interval,
            record.run_hour,
        );
        self.store.save_rollup(&rollup).await?;

        info!(
            product_id = record.product_id,
            valid = %doc.product_frames.last().map(|f| f.valid.as_str()).unwrap_or(""),
            frames = doc.available_frame_count,
            "Recorded frame"
        );
        Ok(())
    }
}

/// Images only; run records are dropped.
#[derive(Debug, Clone)]
pub struct ImagesOnlyPublisher {
    output_dir: PathBuf,
}

impl ImagesOnlyPublisher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl Publisher for ImagesOnlyPublisher {
    async fn save(&self, image: &RenderedImage, path: &Path) -> Result<PathBuf, PublishError> {
        write_png(&self.output_dir, image, path).await
    }

    async fn write_run_record(&self, record: &RunRecord) -> Result<(), PublishError> {
        debug!(product_id = record.product_id, "Metadata disabled, skipping run record");
        Ok(())
    }
}

/// The publisher selected by configuration.
pub fn from_config(config: &AppConfig) -> Box<dyn Publisher> {
    match config.publisher {
        PublisherKind::Hdwx => Box::new(HdwxPublisher::new(config.output_dir())),
        PublisherKind::ImagesOnly => Box::new(ImagesOnlyPublisher::new(config.output_dir())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use renderer::{Canvas, MapProjection, WHITE};
    use sat_common::GeoBounds;

    fn small_image() -> RenderedImage {
        Canvas::new(4, 2, GeoBounds::conus(), MapProjection::PlateCarree, WHITE)
            .unwrap()
            .into_image()
    }

    fn record(product_id: u32, minute: u32) -> RunRecord {
        let valid = Utc.with_ymd_and_hms(2023, 3, 27, 18, minute, 0).unwrap();
        RunRecord {
            product_id,
            run_hour: Utc.with_ymd_and_hms(2023, 3, 27, 18, 0, 0).unwrap(),
            file_name: frame_file_name(valid),
            valid_time: valid,
            gis_info: ["0,0".to_string(), "0,0".to_string()],
            reload_interval: 270,
        }
    }

    #[test]
    fn test_image_paths() {
        let paths = ProductPaths::new(&ProductSettings::default());
        let valid = Utc.with_ymd_and_hms(2023, 3, 27, 18, 1, 17).unwrap();
        assert_eq!(
            paths.image_path(TargetKind::Display, valid),
            PathBuf::from("products/satellite/goes16/geocolor/2023/03/27/1800/01.png")
        );
        assert_eq!(
            paths.image_path(TargetKind::Gis, valid),
            PathBuf::from("gisproducts/satellite/goes16/geocolor/2023/03/27/1800/01.png")
        );
    }

    #[tokio::test]
    async fn test_hdwx_records_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = HdwxPublisher::new(dir.path());

        publisher.write_run_record(&record(5, 6)).await.unwrap();
        publisher.write_run_record(&record(5, 1)).await.unwrap();
        publisher.write_run_record(&record(5, 6)).await.unwrap();

        let hour = Utc.with_ymd_and_hms(2023, 3, 27, 18, 0, 0).unwrap();
        let doc = publisher.store().load_run(5, hour).unwrap();
        let valids: Vec<_> = doc.product_frames.iter().map(|f| f.valid.as_str()).collect();
        assert_eq!(valids, ["202303271801", "202303271806"]);
        assert_eq!(doc.product_frames[0].fhour, 0);

        let rollup = publisher.store().load_rollup(5).unwrap();
        assert_eq!(rollup.latest_run, "202303271800");
        assert_eq!(rollup.reload_interval, 270);
        assert!(rollup.last_reload().is_some());
    }

    #[tokio::test]
    async fn test_save_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = ImagesOnlyPublisher::new(dir.path());
        let rel = PathBuf::from("products/a/b/c/2023/03/27/1800/01.png");

        let full = publisher.save(&small_image(), &rel).await.unwrap();
        let bytes = std::fs::read(&full).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        publisher.write_run_record(&record(5, 1)).await.unwrap();
        assert!(!dir.path().join("metadata").exists());
    }
}
