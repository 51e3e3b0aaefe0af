//! Geolocation for geostationary satellite imagery.
//!
//! Implements the projections from scratch without external dependencies.

pub mod error;
pub mod geostationary;
pub mod mercator;
pub mod mesh;

pub use error::{GeolocationError, GeolocationResult};
pub use geostationary::Geostationary;
pub use mesh::{compute_mesh, geolocate_centers, CenterMesh, GeolocationMesh, MeshCache};
