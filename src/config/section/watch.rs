//! `[watch]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [watch]
//! path = "."                  # relative to the project root
//! debounce_ms = 300
//! ignore = ["node_modules", ".git", "__pycache__", "target"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::FieldPath;
use crate::watch::{DEFAULT_DEBOUNCE_MS, DEFAULT_IGNORE};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Watch root. Absolute after loading.
    pub path: PathBuf,

    pub debounce_ms: u64,

    /// Directory names skipped anywhere below the watch root.
    pub ignore: Vec<String>,
}

impl WatchConfig {
    pub const PATH: FieldPath = FieldPath::new("watch.path");

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            ignore: DEFAULT_IGNORE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::config::test_parse_config;

    #[test]
    fn test_watch_config() {
        let config = test_parse_config("[watch]\npath = \"src\"\ndebounce_ms = 50\nignore = [\"dist\"]");

        assert_eq!(config.watch.path, Path::new("src"));
        assert_eq!(config.watch.debounce().as_millis(), 50);
        assert_eq!(config.watch.ignore, ["dist"]);
    }

    #[test]
    fn test_watch_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.watch.path, Path::new("."));
        assert_eq!(config.watch.debounce_ms, 300);
        assert!(config.watch.ignore.iter().any(|name| name == "node_modules"));
    }
}
