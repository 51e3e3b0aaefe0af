//! Catalog capability used by the compositing worker.

use async_trait::async_trait;

use crate::error::CatalogResult;
use crate::model::{ChannelDataset, ChannelFeed, DatasetHandle};

/// Lists channel feeds and retrieves channel rasters.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// The newest dataset currently listed for a feed.
    async fn list_newest(&self, feed: &ChannelFeed) -> CatalogResult<DatasetHandle>;

    /// Download and unpack one dataset.
    async fn fetch(&self, handle: &DatasetHandle) -> CatalogResult<ChannelDataset>;
}
