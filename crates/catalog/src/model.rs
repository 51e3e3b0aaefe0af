//! Catalog entries and fetched channel rasters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One spectral channel's catalog feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFeed {
    /// Channel id, e.g. "C01"
    pub channel: String,
    /// Absolute URL of the feed's THREDDS `catalog.xml`
    pub catalog_url: String,
}

impl ChannelFeed {
    pub fn new(channel: impl Into<String>, catalog_url: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            catalog_url: catalog_url.into(),
        }
    }
}

/// The newest entry of a channel feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle {
    pub channel: String,
    /// Entry name as listed, e.g. `OR_ABI-L2-CMIPC-M6C01_G16_s2023..._e..._c....nc`
    pub name: String,
    /// Server-relative data path
    pub url_path: String,
    /// Raw valid-time token extracted from the name
    pub token: String,
    /// Absolute HTTP download URL of the dataset file
    pub data_url: String,
}

/// The `field`-th `_`-separated component of an entry name.
pub fn name_token(name: &str, field: usize) -> Option<&str> {
    name.split('_').nth(field).filter(|t| !t.is_empty())
}

/// A fetched channel raster with its fixed-grid axes.
#[derive(Debug, Clone)]
pub struct ChannelDataset {
    pub channel: String,
    pub rows: usize,
    pub cols: usize,
    /// Unpacked samples, row-major (rows follow `y`); fill values are NaN
    pub values: Vec<f32>,
    /// Scan-angle axis along columns, in the file's units
    pub x: Vec<f64>,
    /// Scan-angle axis along rows, in the file's units
    pub y: Vec<f64>,
    pub sub_satellite_lon: f64,
    /// Raw token from the entry name
    pub token: String,
    /// Scan start from the file attributes, or the token time when absent
    pub valid_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_token() {
        let name = "OR_ABI-L2-CMIPC-M6C01_G16_s20230861801170_e20230861803543_c20230861804003.nc";
        assert_eq!(name_token(name, 3), Some("s20230861801170"));
        assert_eq!(name_token(name, 9), None);
        assert_eq!(name_token("a__b", 1), None);
    }
}
