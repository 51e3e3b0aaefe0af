//! THREDDS Data Server client: catalog listing plus HTTP file download.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sat_common::TokenFormat;
use tracing::{debug, info, instrument, warn};

use crate::channel_file::read_channel_bytes;
use crate::client::CatalogClient;
use crate::error::{CatalogError, CatalogResult};
use crate::model::{name_token, ChannelDataset, ChannelFeed, DatasetHandle};
use crate::thredds_xml::{parse_catalog, resolve_data_url};

/// Configuration for the THREDDS client.
#[derive(Debug, Clone)]
pub struct ThreddsConfig {
    /// Data variable holding the channel samples
    pub variable: String,
    /// `_`-separated field of the entry name holding the valid-time token
    pub token_field: usize,
    pub token_format: TokenFormat,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Additional attempts after a failed request
    pub max_retries: u32,
    /// Initial retry delay (doubles each retry)
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for ThreddsConfig {
    fn default() -> Self {
        Self {
            variable: "Sectorized_CMI".to_string(),
            token_field: 3,
            token_format: TokenFormat::Ordinal,
            request_timeout: Duration::from_secs(25),
            connect_timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_delay: Duration::from_secs(1),
            user_agent: concat!("geocolor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);

/// [`CatalogClient`] backed by a THREDDS Data Server.
pub struct ThreddsCatalog {
    client: Client,
    config: ThreddsConfig,
}

impl ThreddsCatalog {
    pub fn new(config: ThreddsConfig) -> CatalogResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .tcp_nodelay(true)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ThreddsConfig {
        &self.config
    }

    /// GET a body, retrying transport errors and 5xx with backoff.
    async fn get_bytes(&self, url: &str) -> CatalogResult<Vec<u8>> {
        let mut attempt = 0;
        let mut delay = self.config.retry_delay;

        loop {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.config.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    warn!(
                        url = %url,
                        error = %e,
                        retry = attempt,
                        max_retries = self.config.max_retries,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, MAX_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_text(&self, url: &str) -> CatalogResult<String> {
        let body = self.get_bytes(url).await?;
        String::from_utf8(body)
            .map_err(|e| CatalogError::InvalidFormat(format!("{} is not UTF-8: {}", url, e)))
    }

    async fn try_get(&self, url: &str) -> CatalogResult<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn handle_for(
        &self,
        feed: &ChannelFeed,
        name: String,
        url_path: String,
        file_server_base: Option<&str>,
    ) -> CatalogResult<DatasetHandle> {
        let data_url = resolve_data_url(&feed.catalog_url, file_server_base, &url_path)?;
        let token = name_token(&name, self.config.token_field)
            .unwrap_or_default()
            .to_string();
        Ok(DatasetHandle {
            channel: feed.channel.clone(),
            name,
            url_path,
            token,
            data_url,
        })
    }
}

fn is_retryable(err: &CatalogError) -> bool {
    match err {
        CatalogError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
        CatalogError::Status { status, .. } => *status >= 500,
        _ => false,
    }
}

#[async_trait]
impl CatalogClient for ThreddsCatalog {
    #[instrument(skip(self, feed), fields(channel = %feed.channel))]
    async fn list_newest(&self, feed: &ChannelFeed) -> CatalogResult<DatasetHandle> {
        let xml = self.get_text(&feed.catalog_url).await?;
        let listing = parse_catalog(&xml)?;
        let newest = listing
            .newest()
            .ok_or_else(|| CatalogError::EmptyCatalog(feed.catalog_url.clone()))?
            .clone();

        debug!(entries = listing.entries.len(), newest = %newest.name, "Listed catalog");
        self.handle_for(
            feed,
            newest.name,
            newest.url_path,
            listing.file_server_base.as_deref(),
        )
    }

    #[instrument(skip(self, handle), fields(channel = %handle.channel, name = %handle.name))]
    async fn fetch(&self, handle: &DatasetHandle) -> CatalogResult<ChannelDataset> {
        let bytes = self.get_bytes(&handle.data_url).await?;
        debug!(bytes = bytes.len(), "Downloaded dataset");

        // libnetcdf is blocking
        let variable = self.config.variable.clone();
        let token_format = self.config.token_format;
        let owned = handle.clone();
        let dataset = tokio::task::spawn_blocking(move || {
            read_channel_bytes(&bytes, &variable, &owned, token_format)
        })
        .await
        .map_err(|e| CatalogError::NetCdf(format!("Reader task failed: {}", e)))??;

        info!(
            rows = dataset.rows,
            cols = dataset.cols,
            sub_satellite_lon = dataset.sub_satellite_lon,
            valid_time = %dataset.valid_time,
            "Fetched channel"
        );
        Ok(dataset)
    }
}
