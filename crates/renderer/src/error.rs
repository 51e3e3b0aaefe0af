//! Error types for compositing and rendering.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    /// Band length does not match the grid shape
    #[error("{band} band has {actual} samples, expected {expected}")]
    ShapeMismatch {
        band: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Every sample of a band is NaN or masked
    #[error("{0} band has no finite value")]
    EmptyBand(&'static str),

    /// Geolocation mesh and image disagree on the grid size
    #[error("Mesh is {mesh_rows}x{mesh_cols} but image is {rows}x{cols}")]
    MeshMismatch {
        mesh_rows: usize,
        mesh_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid canvas size {width}x{height}")]
    InvalidCanvas { width: usize, height: usize },

    #[error("Invalid canvas bounds: {0}")]
    InvalidBounds(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] std::io::Error),
}
