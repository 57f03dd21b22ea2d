//! Runtime configuration for the provisioning bridge.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::exec::EscalationStrategy;

/// Configuration for the bridge's execution machinery.
///
/// The per-feature action catalogs are separate content files; this only
/// covers the mechanisms around them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Private working directory holding per-account lock files.
    pub work_dir: PathBuf,
    /// Path to the privileged helper binary.
    pub sudo_util: PathBuf,
    /// Run the helper through `sudo -n`. Disable for local development,
    /// where the helper is invoked directly as the current user.
    pub escalate: bool,
    /// How many times lock acquisition is retried before giving up.
    pub lock_retries: u32,
    /// Base backoff between lock retries, in milliseconds. Grows linearly
    /// with the attempt number.
    pub lock_backoff_ms: u64,
    /// Interval between release catalog refreshes, in seconds.
    pub refresh_interval_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(".rigger"),
            sudo_util: PathBuf::from("/usr/local/bin/rigger-sudoutil"),
            escalate: true,
            lock_retries: 10,
            lock_backoff_ms: 100,
            refresh_interval_secs: 3600,
        }
    }
}

impl BridgeConfig {
    /// Build a config from defaults plus the `RIGGER_DEV` environment
    /// flag. When set to `1` or `true`, the executor invokes the helper
    /// directly instead of through sudo. Running as root also skips
    /// sudo, it would add nothing.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        let dev = std::env::var("RIGGER_DEV")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if dev || is_root() {
            config.escalate = false;
        }
        config
    }

    /// Escalation strategy for the privileged executor. Decided once at
    /// construction, never branched at call sites.
    pub fn escalation(&self) -> EscalationStrategy {
        if self.escalate {
            EscalationStrategy::Sudo
        } else {
            EscalationStrategy::Direct
        }
    }

    pub fn lock_backoff(&self) -> Duration {
        Duration::from_millis(self.lock_backoff_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    let euid = unsafe { libc::geteuid() };
    euid == 0
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
