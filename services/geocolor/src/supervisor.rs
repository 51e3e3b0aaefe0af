//! Relaunch loop: one worker process per poll tick.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::lock::{LockState, RunLock};

pub struct Supervisor {
    program: PathBuf,
    args: Vec<OsString>,
    lock: Arc<dyn RunLock>,
    relaunch_delay: Duration,
}

impl Supervisor {
    pub fn new(
        program: impl Into<PathBuf>,
        args: Vec<OsString>,
        lock: Arc<dyn RunLock>,
        relaunch_delay: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            lock,
            relaunch_delay,
        }
    }

    /// Supervise this executable, re-invoked with `args`.
    pub fn for_current_exe(
        args: Vec<OsString>,
        lock: Arc<dyn RunLock>,
        relaunch_delay: Duration,
    ) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, args, lock, relaunch_delay))
    }

    /// Run one worker to completion and clean up after it.
    pub async fn run_worker(&self) -> std::io::Result<ExitStatus> {
        let mut child = Command::new(&self.program).args(&self.args).spawn()?;
        let pid = child.id();
        info!(?pid, program = %self.program.display(), "Worker started");

        let status = child.wait().await?;
        if status.success() {
            info!(?pid, "Worker published");
        } else {
            info!(?pid, code = ?status.code(), "Worker exited without publishing");
        }

        if let Some(pid) = pid {
            if self.lock.holder()? == LockState::Held(pid) {
                warn!(pid, "Worker left its lock behind, releasing");
                self.lock.force_release()?;
            }
        }
        Ok(status)
    }

    /// Relaunch workers until shutdown is signalled.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        loop {
            if let Err(e) = self.run_worker().await {
                error!(error = %e, "Failed to run worker");
            }

            if shutdown.try_recv().is_ok() {
                info!("Shutting down supervisor");
                break;
            }
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down supervisor");
                    break;
                }
                _ = tokio::time::sleep(self.relaunch_delay) => {}
            }
        }
    }
}
