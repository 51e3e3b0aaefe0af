//! Error types for a worker run.

use std::time::Duration;

use catalog::CatalogError;
use chrono::{DateTime, Utc};
use projection::GeolocationError;
use renderer::RenderError;
use sat_common::TimeParseError;

/// Why a worker run ended without publishing.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Another worker holds the lock (pid {holder:?})")]
    LockHeld { holder: Option<u32> },

    #[error("Channel tokens disagree: {tokens:?}")]
    Desync { tokens: Vec<String> },

    #[error("Malformed valid-time token: {0}")]
    MalformedToken(#[from] TimeParseError),

    #[error("Frame for {valid} already published")]
    NotNewer { valid: DateTime<Utc> },

    #[error("Channel download exceeded {0:?}")]
    AcquisitionTimeout(Duration),

    #[error("Channel grids differ: {0}")]
    GridMismatch(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Geolocation error: {0}")]
    Geolocation(#[from] GeolocationError),

    #[error("Compositing error: {0}")]
    Composite(#[from] RenderError),

    #[error("No render target could be published")]
    NothingPublished,

    #[error("Lock file error: {0}")]
    Lock(#[source] std::io::Error),
}

impl RunError {
    /// Expected skips that need no operator attention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RunError::LockHeld { .. }
                | RunError::Desync { .. }
                | RunError::MalformedToken(_)
                | RunError::NotNewer { .. }
        )
    }
}

/// Failure to persist an image or its metadata.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image encoding error: {0}")]
    Encode(#[from] RenderError),
}

impl PublishError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        PublishError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
