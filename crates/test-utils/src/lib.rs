//! Shared test utilities for the geocolor workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic fixed-grid axes and channel bands
//! - Catalog entry names, THREDDS catalog documents and NetCDF channel files
//! - Temporary output trees with pre-published metadata
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that every row of a row-major grid is monotonic from west to east.
pub fn assert_monotonic_along_rows(values: &[f64], rows: usize, cols: usize, increasing: bool) {
    let sign = if increasing { 1.0 } else { -1.0 };
    for r in 0..rows {
        for c in 1..cols {
            let (prev, next) = (values[r * cols + c - 1], values[r * cols + c]);
            assert!(
                sign * (next - prev) >= -1e-9,
                "row {} not monotonic at col {}: {} -> {}",
                r,
                c,
                prev,
                next
            );
        }
    }
}

/// Assert that every column of a row-major grid is monotonic from top to bottom.
pub fn assert_monotonic_along_cols(values: &[f64], rows: usize, cols: usize, increasing: bool) {
    let sign = if increasing { 1.0 } else { -1.0 };
    for c in 0..cols {
        for r in 1..rows {
            let (prev, next) = (values[(r - 1) * cols + c], values[r * cols + c]);
            assert!(
                sign * (next - prev) >= -1e-9,
                "col {} not monotonic at row {}: {} -> {}",
                c,
                r,
                prev,
                next
            );
        }
    }
}
