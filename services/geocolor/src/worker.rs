//! One compositing run: lock, gate, fetch, geolocate, composite, render,
//! publish, unlock.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use catalog::{CatalogClient, ChannelDataset, DatasetHandle, ThreddsCatalog};
use chrono::{DateTime, Utc};
use futures::future::try_join3;
use projection::{GeolocationMesh, MeshCache};
use renderer::{compose, RgbImage};
use sat_common::time::{frame_file_name, truncate_to_hour};
use sat_common::GeoBounds;
use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::decorate::{self, DecorationRequest, Decorator};
use crate::error::RunError;
use crate::gate::{self, GateDecision};
use crate::lock::{LockGuard, LockState, PidFileLock, RunLock};
use crate::metadata::MetadataStore;
use crate::publish::{self, ProductPaths, Publisher, RunRecord};
use crate::render::{self, RenderTarget, TargetKind};

/// Lifecycle of a worker invocation. Every invocation ends in `Relaunching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    AcquiringLock,
    Running,
    Success,
    Failure,
    ReleasingLock,
    Relaunching,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "IDLE",
            WorkerState::AcquiringLock => "ACQUIRING_LOCK",
            WorkerState::Running => "RUNNING",
            WorkerState::Success => "SUCCESS",
            WorkerState::Failure => "FAILURE",
            WorkerState::ReleasingLock => "RELEASING_LOCK",
            WorkerState::Relaunching => "RELAUNCHING",
        };
        f.write_str(name)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub valid_time: DateTime<Utc>,
    pub published: Vec<(TargetKind, PathBuf)>,
    /// Targets that failed while others succeeded
    pub failed: Vec<(TargetKind, String)>,
}

impl RunReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Process exit status for a run result.
pub fn exit_code(result: &Result<RunReport, RunError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

pub struct Worker {
    config: AppConfig,
    catalog: Arc<dyn CatalogClient>,
    publisher: Box<dyn Publisher>,
    decorator: Box<dyn Decorator>,
    lock: Arc<dyn RunLock>,
    store: MetadataStore,
    paths: ProductPaths,
    sector: GeoBounds,
    /// Reused only when one worker serves several runs
    meshes: MeshCache,
    state: WorkerState,
    pid: u32,
}

impl Worker {
    pub fn new(
        config: AppConfig,
        catalog: Arc<dyn CatalogClient>,
        publisher: Box<dyn Publisher>,
        decorator: Box<dyn Decorator>,
        lock: Arc<dyn RunLock>,
    ) -> anyhow::Result<Self> {
        let sector = config.render.sector()?;
        Ok(Self {
            store: MetadataStore::new(config.output_dir()),
            paths: ProductPaths::new(&config.products),
            sector,
            catalog,
            publisher,
            decorator,
            lock,
            meshes: MeshCache::new(),
            state: WorkerState::Idle,
            pid: std::process::id(),
            config,
        })
    }

    /// Worker with the THREDDS catalog, the configured publisher and
    /// decorator, and the pid-file lock under the base directory.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let catalog = ThreddsCatalog::new(config.catalog.thredds_config())
            .context("Failed to build catalog client")?;
        let publisher = publish::from_config(&config);
        let decorator = decorate::from_config(config.decorator);
        let lock = PidFileLock::new(config.lock_path());
        Self::new(config, Arc::new(catalog), publisher, decorator, Arc::new(lock))
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn mesh_cache(&self) -> &MeshCache {
        &self.meshes
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(from = %self.state, to = %next, "Worker state");
        self.state = next;
    }

    /// Run one poll cycle under the lock.
    #[instrument(skip(self), fields(pid = self.pid))]
    pub async fn run_once(&mut self) -> Result<RunReport, RunError> {
        self.transition(WorkerState::AcquiringLock);
        let lock = Arc::clone(&self.lock);
        let guard = match LockGuard::try_acquire(lock.as_ref(), self.pid) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                let holder = match lock.holder() {
                    Ok(LockState::Held(pid)) => Some(pid),
                    _ => None,
                };
                info!(?holder, "Lock held by another worker, aborting");
                self.transition(WorkerState::Relaunching);
                return Err(RunError::LockHeld { holder });
            }
            Err(e) => {
                error!(error = %e, "Failed to acquire lock");
                self.transition(WorkerState::Relaunching);
                return Err(RunError::Lock(e));
            }
        };

        self.transition(WorkerState::Running);
        let result = self.run_locked().await;

        match &result {
            Ok(report) if report.is_partial() => {
                warn!(
                    valid = %report.valid_time,
                    published = report.published.len(),
                    failed = ?report.failed,
                    "Run partially succeeded"
                );
                self.transition(WorkerState::Success);
            }
            Ok(report) => {
                info!(
                    valid = %report.valid_time,
                    published = report.published.len(),
                    "Run complete"
                );
                self.transition(WorkerState::Success);
            }
            Err(e) if e.is_transient() => {
                info!(reason = %e, "Nothing to do");
                self.transition(WorkerState::Failure);
            }
            Err(e) => {
                error!(error = %e, "Run failed");
                self.transition(WorkerState::Failure);
            }
        }

        self.transition(WorkerState::ReleasingLock);
        drop(guard);
        self.transition(WorkerState::Relaunching);
        result
    }

    async fn run_locked(&mut self) -> Result<RunReport, RunError> {
        let [blue_feed, red_feed, green_feed] = self.config.feeds.ordered();
        let (blue, red, green) = try_join3(
            self.catalog.list_newest(blue_feed),
            self.catalog.list_newest(red_feed),
            self.catalog.list_newest(green_feed),
        )
        .await?;
        let entries = [blue, red, green];

        let candidate = match gate::evaluate(
            &entries,
            &self.store,
            self.config.products.display_id,
            self.config.catalog.token_format,
        )? {
            GateDecision::Proceed(valid) => valid,
            GateDecision::SkipDesync => {
                return Err(RunError::Desync {
                    tokens: entries.iter().map(|e| e.token.clone()).collect(),
                })
            }
            GateDecision::SkipNotNewer(valid) => return Err(RunError::NotNewer { valid }),
        };
        info!(valid = %candidate, token = %entries[0].token, "New scan available");

        let [blue, red, green] = self.fetch_channels(&entries).await?;
        check_grids(&blue, &[&red, &green])?;

        let mesh = self.meshes.get_or_compute(
            &blue.x,
            &blue.y,
            blue.sub_satellite_lon,
            self.config.geolocation.axis_scale,
        )?;
        if mesh.invalid_count() > 0 {
            debug!(invalid = mesh.invalid_count(), "Off-disk cells masked");
        }

        let rgb = compose(
            (blue.rows, blue.cols),
            &blue.values,
            &red.values,
            &green.values,
            &mesh.no_data,
        )?;

        let valid_time = blue.valid_time;
        let mut targets = vec![RenderTarget::display(&self.config.render, self.sector)];
        if self.config.render.gis_enabled {
            targets.push(RenderTarget::gis(&self.config.render, self.sector));
        }

        let mut report = RunReport {
            valid_time,
            published: Vec::new(),
            failed: Vec::new(),
        };
        for target in &targets {
            match self.publish_target(target, &mesh, &rgb, valid_time).await {
                Ok(path) => report.published.push((target.kind, path)),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(kind = %target.kind, error = %reason, "Render target failed");
                    report.failed.push((target.kind, reason));
                }
            }
        }

        if report.published.is_empty() {
            return Err(RunError::NothingPublished);
        }
        Ok(report)
    }

    /// Download the three channels, bounded by the fetch timeout.
    async fn fetch_channels(
        &self,
        entries: &[DatasetHandle; 3],
    ) -> Result<[ChannelDataset; 3], RunError> {
        let timeout = self.config.schedule.fetch_timeout();
        let fetch = try_join3(
            self.catalog.fetch(&entries[0]),
            self.catalog.fetch(&entries[1]),
            self.catalog.fetch(&entries[2]),
        );
        let (blue, red, green) = tokio::time::timeout(timeout, fetch)
            .await
            .map_err(|_| RunError::AcquisitionTimeout(timeout))??;
        Ok([blue, red, green])
    }

    /// Render, save and record one target.
    async fn publish_target(
        &self,
        target: &RenderTarget,
        mesh: &GeolocationMesh,
        rgb: &RgbImage,
        valid_time: DateTime<Utc>,
    ) -> anyhow::Result<PathBuf> {
        let mut image = render::render(mesh, rgb, target)
            .with_context(|| format!("Failed to render {} image", target.kind))?;

        let (product_id, gis_info) = match target.kind {
            TargetKind::Display => {
                let request = DecorationRequest {
                    title: self.config.products.title.clone(),
                    valid_time,
                    notice: self.config.products.notice.clone(),
                    width: target.width,
                    height: target.height,
                };
                self.decorator
                    .decorate(&mut image, &request)
                    .context("Failed to decorate display image")?;
                (
                    self.config.products.display_id,
                    ["0,0".to_string(), "0,0".to_string()],
                )
            }
            TargetKind::Gis => (self.config.products.gis_id, image.bounds.corner_strings()),
        };

        let path = self.paths.image_path(target.kind, valid_time);
        let saved = self
            .publisher
            .save(&image, &path)
            .await
            .with_context(|| format!("Failed to save {}", path.display()))?;

        let record = RunRecord {
            product_id,
            run_hour: truncate_to_hour(valid_time),
            file_name: frame_file_name(valid_time),
            valid_time,
            gis_info,
            reload_interval: self.config.products.reload_interval,
        };
        self.publisher
            .write_run_record(&record)
            .await
            .with_context(|| format!("Failed to record product {}", product_id))?;

        Ok(saved)
    }
}

fn check_grids(reference: &ChannelDataset, others: &[&ChannelDataset]) -> Result<(), RunError> {
    for other in others {
        if (other.rows, other.cols) != (reference.rows, reference.cols) {
            return Err(RunError::GridMismatch(format!(
                "{} is {}x{}, {} is {}x{}",
                reference.channel,
                reference.rows,
                reference.cols,
                other.channel,
                other.rows,
                other.cols
            )));
        }
    }
    Ok(())
}
