//! GOES true-color compositing worker.
//!
//! A worker run takes the newest blue, red and green channel scans from the
//! catalog, skips work that is stale or already published, geolocates the
//! fixed grid, composites the channels and publishes a display image and a
//! GIS image with run metadata. The supervisor relaunches one worker process
//! per poll tick; the watchdog kills a worker that stops making progress.

pub mod config;
pub mod decorate;
pub mod error;
pub mod gate;
pub mod lock;
pub mod metadata;
pub mod publish;
pub mod render;
pub mod supervisor;
pub mod watchdog;
pub mod worker;

pub use config::AppConfig;
pub use error::{PublishError, RunError};
pub use gate::GateDecision;
pub use worker::{exit_code, RunReport, Worker, WorkerState};
