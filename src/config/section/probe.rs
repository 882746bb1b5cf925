//! `[probe]` section configuration.
//!
//! ```toml
//! [probe]
//! attempts = 20
//! interval_ms = 100
//! path = "/?_checking_alive=1"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::FieldPath;
use crate::probe::{DEFAULT_ATTEMPTS, DEFAULT_INTERVAL_MS, DEFAULT_PROBE_PATH};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub attempts: u32,
    pub interval_ms: u64,
    /// Requested on the app origin; any HTTP answer counts as alive.
    pub path: String,
}

impl ProbeConfig {
    pub const ATTEMPTS: FieldPath = FieldPath::new("probe.attempts");

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn url(&self, origin: &str) -> String {
        if self.path.starts_with('/') {
            format!("{origin}{}", self.path)
        } else {
            format!("{origin}/{}", self.path)
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            interval_ms: DEFAULT_INTERVAL_MS,
            path: DEFAULT_PROBE_PATH.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_probe_url() {
        let config = test_parse_config("");
        assert_eq!(
            config.probe.url("http://localhost:8000"),
            "http://localhost:8000/?_checking_alive=1"
        );

        let config = test_parse_config("[probe]\npath = \"health\"\nattempts = 3");
        assert_eq!(config.probe.url("http://127.0.0.1:5000"), "http://127.0.0.1:5000/health");
        assert_eq!(config.probe.attempts, 3);
    }
}
