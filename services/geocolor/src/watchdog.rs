//! External liveness check for a worker stuck mid-run.
//!
//! One check per invocation: when the product rollup has not been refreshed
//! within the staleness threshold and a lock file exists, the recorded
//! process is killed and the lock removed so the next worker can start.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::lock::{LockState, RunLock};
use crate::metadata::MetadataStore;

/// Ends a process unconditionally.
pub trait ProcessTerminator: Send + Sync {
    fn kill(&self, pid: u32) -> std::io::Result<()>;
}

/// Sends SIGKILL.
#[derive(Debug, Default, Clone, Copy)]
pub struct SigkillTerminator;

impl ProcessTerminator for SigkillTerminator {
    #[cfg(unix)]
    fn kill(&self, pid: u32) -> std::io::Result<()> {
        let pid = libc::pid_t::try_from(pid).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range")
        })?;
        // SAFETY: kill(2) has no memory-safety preconditions.
        let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }

    #[cfg(not(unix))]
    fn kill(&self, _pid: u32) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "process termination requires a unix platform",
        ))
    }
}

/// Result of one watchdog check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogAction {
    /// No rollup to judge by
    NoRollup,
    /// Rollup refreshed recently enough
    Fresh { age_secs: i64 },
    /// Stale, but no worker holds the lock
    StaleUnlocked { age_secs: i64 },
    /// Killed the lock holder and removed the lock
    Killed { pid: u32 },
    /// Lock did not hold a pid; removed it
    Unlocked,
}

pub struct Watchdog {
    store: MetadataStore,
    product_id: u32,
    threshold: Duration,
    lock: Arc<dyn RunLock>,
    terminator: Box<dyn ProcessTerminator>,
}

impl Watchdog {
    pub fn new(
        store: MetadataStore,
        product_id: u32,
        threshold: Duration,
        lock: Arc<dyn RunLock>,
        terminator: Box<dyn ProcessTerminator>,
    ) -> Self {
        Self {
            store,
            product_id,
            threshold,
            lock,
            terminator,
        }
    }

    /// Check once against `now`.
    pub fn check(&self, now: DateTime<Utc>) -> std::io::Result<WatchdogAction> {
        let Some(last_reload) = self
            .store
            .load_rollup(self.product_id)
            .and_then(|rollup| rollup.last_reload())
        else {
            info!(product_id = self.product_id, "No product rollup, nothing to check");
            return Ok(WatchdogAction::NoRollup);
        };

        let age_secs = (now - last_reload).num_seconds();
        if age_secs <= self.threshold.as_secs() as i64 {
            return Ok(WatchdogAction::Fresh { age_secs });
        }

        match self.lock.holder()? {
            LockState::Free => {
                info!(age_secs, "Product stale but no worker running");
                Ok(WatchdogAction::StaleUnlocked { age_secs })
            }
            LockState::Held(pid) => {
                warn!(pid, age_secs, "Worker wedged, killing");
                if let Err(e) = self.terminator.kill(pid) {
                    warn!(pid, error = %e, "Kill failed, removing lock anyway");
                }
                self.lock.force_release()?;
                Ok(WatchdogAction::Killed { pid })
            }
            LockState::Corrupt(contents) => {
                warn!(contents = %contents.trim(), age_secs, "Lock holds no pid, removing");
                self.lock.force_release()?;
                Ok(WatchdogAction::Unlocked)
            }
        }
    }
}
