//! Per-resource serialization via advisory file locks.
//!
//! Provisioning touches shared per-account state (`~/.bashrc`, package
//! caches, toolchain directories), so two concurrent requests for the
//! same account must never interleave. Each resource key maps to a lock
//! file under a private working directory; acquisition retries with
//! backoff and gives up with [`ProvisionError::LockTimeout`]. Distinct
//! keys proceed fully in parallel.

use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use fs2::FileExt;
use log::{debug, warn};

use crate::config::BridgeConfig;
use crate::error::{ProvisionError, ProvisionResult};

/// Scoped file locks keyed by resource identifier.
#[derive(Debug, Clone)]
pub struct LockManager {
    dir: PathBuf,
    retries: u32,
    backoff: Duration,
}

/// RAII guard: releases the flock when dropped, so release happens on
/// every exit path. The lock file itself stays on disk; unlinking it
/// would let a contender lock an orphaned inode while a third party
/// locks a fresh file at the same path, and two holders for one key is
/// exactly what this module exists to prevent.
#[derive(Debug)]
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl LockManager {
    pub fn new(dir: impl Into<PathBuf>, retries: u32, backoff: Duration) -> Self {
        Self {
            dir: dir.into(),
            retries,
            backoff,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.work_dir.join("locks"),
            config.lock_retries,
            config.lock_backoff(),
        )
    }

    fn lock_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.lock"))
    }

    async fn acquire(&self, key: &str) -> ProvisionResult<LockGuard> {
        fs::create_dir_all(&self.dir)?;
        let path = self.lock_path(key);

        for attempt in 0..=self.retries {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&path)?;
            if file.try_lock_exclusive().is_ok() {
                debug!("acquired lock '{}' (attempt {})", key, attempt + 1);
                return Ok(LockGuard { file });
            }
            drop(file);
            if attempt < self.retries {
                // Linear backoff; first to re-acquire wins, no queue.
                tokio::time::sleep(self.backoff * (attempt + 1)).await;
            }
        }

        warn!("lock '{key}' not released within retry budget");
        Err(ProvisionError::LockTimeout {
            key: key.to_string(),
        })
    }

    /// Run `f` while holding the exclusive lock for `key`.
    ///
    /// The lock is released before the result is returned, whether `f`
    /// succeeds or fails. Calls with the same key are strictly
    /// serialized; calls with different keys overlap freely.
    pub async fn with_lock<T, F, Fut>(&self, key: &str, f: F) -> ProvisionResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProvisionResult<T>>,
    {
        let guard = self.acquire(key).await?;
        let result = f().await;
        drop(guard);
        result
    }
}
