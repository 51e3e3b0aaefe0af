//! Image production for true-color satellite composites.
//!
//! - Compositing three reflectance channels into normalized RGB
//! - Forward quad rasterization onto plate carrée or web mercator canvases
//! - PNG encoding

pub mod composite;
pub mod error;
pub mod png;
pub mod raster;

pub use composite::{compose, RgbImage};
pub use error::{RenderError, RenderResult};
pub use raster::{render_mesh, Canvas, MapProjection, RenderedImage, TRANSPARENT, WHITE};
