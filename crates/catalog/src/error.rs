//! Error types for catalog and data access.

use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Malformed catalog XML
    #[error("Catalog XML error: {0}")]
    Xml(String),

    /// Catalog lists no dataset with a data path
    #[error("No datasets in catalog {0}")]
    EmptyCatalog(String),

    /// Missing required variable or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Unexpected variable shape or attribute
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// libnetcdf could not open or read the dataset
    #[error("NetCDF error: {0}")]
    NetCdf(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid time: {0}")]
    Time(#[from] sat_common::TimeParseError),
}
