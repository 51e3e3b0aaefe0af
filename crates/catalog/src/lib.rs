//! Access to channel datasets published on a THREDDS Data Server.
//!
//! The [`CatalogClient`] trait is the seam the worker depends on;
//! [`ThreddsCatalog`] is the HTTP implementation. Datasets are downloaded
//! whole and read with libnetcdf.

pub mod channel_file;
pub mod client;
pub mod error;
pub mod model;
pub mod thredds;
pub mod thredds_xml;

pub use channel_file::{read_channel_bytes, silence_hdf5_errors};
pub use client::CatalogClient;
pub use error::{CatalogError, CatalogResult};
pub use model::{name_token, ChannelDataset, ChannelFeed, DatasetHandle};
pub use thredds::{ThreddsCatalog, ThreddsConfig};
