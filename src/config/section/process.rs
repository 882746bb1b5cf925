//! `[process]` section configuration.
//!
//! ```toml
//! [process]
//! stop_timeout_ms = 5000      # wait after SIGINT
//! kill_timeout_ms = 1000      # wait after SIGKILL
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::process::{DEFAULT_KILL_TIMEOUT_MS, DEFAULT_STOP_TIMEOUT_MS, StopTimeouts};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub stop_timeout_ms: u64,
    pub kill_timeout_ms: u64,
}

impl ProcessConfig {
    pub fn timeouts(&self) -> StopTimeouts {
        StopTimeouts {
            graceful: Duration::from_millis(self.stop_timeout_ms),
            forced: Duration::from_millis(self.kill_timeout_ms),
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            kill_timeout_ms: DEFAULT_KILL_TIMEOUT_MS,
        }
    }
}
