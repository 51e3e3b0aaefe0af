#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog::{
    CatalogClient, CatalogError, CatalogResult, ChannelDataset, ChannelFeed, DatasetHandle,
};
use geocolor::decorate::NoopDecorator;
use geocolor::lock::PidFileLock;
use geocolor::publish::{self, Publisher};
use geocolor::{AppConfig, Worker};
use sat_common::time::parse_token;
use sat_common::TokenFormat;
use test_utils::{conus_axes, create_reflectance_band, entry_name, GOES_EAST_LON};

pub const ROWS: usize = 12;
pub const COLS: usize = 24;

/// In-memory catalog serving synthetic CONUS channels.
pub struct MockCatalog {
    tokens: Mutex<HashMap<String, String>>,
    fetch_delay: Option<Duration>,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new(token: &str) -> Self {
        let tokens = ["C01", "C02", "C03"]
            .iter()
            .map(|c| (c.to_string(), token.to_string()))
            .collect();
        Self {
            tokens: Mutex::new(tokens),
            fetch_delay: None,
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn set_token(&self, channel: &str, token: &str) {
        self.tokens
            .lock()
            .unwrap()
            .insert(channel.to_string(), token.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.list_calls() + self.fetch_calls()
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn list_newest(&self, feed: &ChannelFeed) -> CatalogResult<DatasetHandle> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let token = self
            .tokens
            .lock()
            .unwrap()
            .get(&feed.channel)
            .cloned()
            .unwrap_or_default();
        let number: u8 = feed.channel[1..].parse().unwrap_or(0);
        let name = entry_name(number, &token);
        Ok(DatasetHandle {
            channel: feed.channel.clone(),
            url_path: format!("satellite/goes/east/{}", name),
            data_url: format!("http://mock/thredds/fileServer/satellite/goes/east/{}", name),
            name,
            token,
        })
    }

    async fn fetch(&self, handle: &DatasetHandle) -> CatalogResult<ChannelDataset> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }

        let peak = match handle.channel.as_str() {
            "C01" => 0.8,
            "C02" => 1.1,
            _ => 0.6,
        };
        let (x, y) = conus_axes(COLS, ROWS);
        let scan_start =
            parse_token(&handle.token, TokenFormat::Ordinal).map_err(CatalogError::from)?;
        Ok(ChannelDataset {
            channel: handle.channel.clone(),
            rows: ROWS,
            cols: COLS,
            values: create_reflectance_band(COLS, ROWS, peak),
            x,
            y,
            sub_satellite_lon: GOES_EAST_LON,
            token: handle.token.clone(),
            valid_time: scan_start + chrono::Duration::seconds(17),
        })
    }
}

/// Default configuration rooted at `base`, rendering small images.
pub fn test_config(base: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.base_dir = base.to_path_buf();
    config.render.width = 192;
    config.render.height = 108;
    config
}

pub fn worker(config: AppConfig, catalog: Arc<MockCatalog>) -> Worker {
    let publisher = publish::from_config(&config);
    worker_with_publisher(config, catalog, publisher)
}

pub fn worker_with_publisher(
    config: AppConfig,
    catalog: Arc<MockCatalog>,
    publisher: Box<dyn Publisher>,
) -> Worker {
    let lock = Arc::new(PidFileLock::new(config.lock_path()));
    Worker::new(config, catalog, publisher, Box::new(NoopDecorator), lock)
        .expect("Failed to build worker")
}
