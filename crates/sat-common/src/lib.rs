//! Common types shared across the geocolor crates.

pub mod bbox;
pub mod time;

pub use bbox::{BboxParseError, GeoBounds};
pub use time::{TimeParseError, TokenFormat};
