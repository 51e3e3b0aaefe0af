//! GOES GeoColor compositing worker.
//!
//! - No subcommand: one poll cycle (exit 0 when a frame was published)
//! - `supervise`: relaunch a worker process every poll tick
//! - `watchdog`: kill and unlock a worker whose product has gone stale

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geocolor::lock::PidFileLock;
use geocolor::metadata::MetadataStore;
use geocolor::supervisor::Supervisor;
use geocolor::watchdog::{SigkillTerminator, Watchdog};
use geocolor::{exit_code, AppConfig, Worker};

#[derive(Parser, Debug)]
#[command(name = "geocolor")]
#[command(about = "GOES true-color compositing worker")]
struct Args {
    /// Configuration file
    #[arg(long, env = "GEOCOLOR_CONFIG", default_value = "config/geocolor.yaml")]
    config: PathBuf,

    /// Directory holding the lock file and output tree (overrides config)
    #[arg(long, env = "GEOCOLOR_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Skip the GIS image
    #[arg(long)]
    no_gis: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Relaunch the worker after each run
    Supervise,
    /// Check once for a wedged worker
    Watchdog,
}

impl Args {
    /// Flags forwarded to supervised workers.
    fn worker_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--config".into(),
            self.config.clone().into(),
            "--log-level".into(),
            self.log_level.clone().into(),
        ];
        if let Some(base_dir) = &self.base_dir {
            args.push("--base-dir".into());
            args.push(base_dir.clone().into());
        }
        if self.no_gis {
            args.push("--no-gis".into());
        }
        args
    }
}

fn main() -> Result<ExitCode> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    catalog::silence_hdf5_errors();

    let mut config = AppConfig::load(&args.config)?;
    if let Some(base_dir) = &args.base_dir {
        config.base_dir = base_dir.clone();
    }
    if args.no_gis {
        config.render.gis_enabled = false;
    }

    match args.command {
        None => run_worker(config),
        Some(Command::Supervise) => supervise(config, args.worker_args()),
        Some(Command::Watchdog) => watchdog(config),
    }
}

fn run_worker(config: AppConfig) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;

    let mut worker = Worker::from_config(config)?;
    let result = runtime.block_on(worker.run_once());
    Ok(ExitCode::from(exit_code(&result) as u8))
}

fn supervise(config: AppConfig, worker_args: Vec<OsString>) -> Result<ExitCode> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to build runtime")?;

    runtime.block_on(async move {
        let lock = Arc::new(PidFileLock::new(config.lock_path()));
        let supervisor =
            Supervisor::for_current_exe(worker_args, lock, config.schedule.relaunch_delay())?;

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let shutdown_tx_clone = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
            shutdown_tx_clone.send(()).ok();
        });

        info!(
            relaunch_delay_secs = config.schedule.relaunch_delay_secs,
            "Starting supervisor"
        );
        supervisor.run_forever(shutdown_tx.subscribe()).await;
        Ok::<_, anyhow::Error>(ExitCode::SUCCESS)
    })
}

fn watchdog(config: AppConfig) -> Result<ExitCode> {
    let watchdog = Watchdog::new(
        MetadataStore::new(config.output_dir()),
        config.products.display_id,
        config.schedule.staleness_threshold(),
        Arc::new(PidFileLock::new(config.lock_path())),
        Box::new(SigkillTerminator),
    );
    let action = watchdog.check(Utc::now())?;
    info!(?action, "Watchdog check complete");
    Ok(ExitCode::SUCCESS)
}
