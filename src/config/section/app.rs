//! `[app]` section configuration.
//!
//! The supervised application process.
//!
//! # Example
//!
//! ```toml
//! [app]
//! command = ["python", "-m", "app"]   # argv, run from the project root
//! host = "localhost"                  # used for the liveness probe and printed URL
//! port = 8000                         # exported to the child as $PORT
//! source_extensions = ["py"]          # changes to these restart the app
//! env = { APP_ENV = "dev" }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::FieldPath;
use crate::watch::DEFAULT_SOURCE_EXTENSIONS;

/// Supervised application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Program and arguments. Required for `runserver`.
    pub command: Vec<String>,

    pub host: String,

    pub port: u16,

    /// Stored without the leading dot.
    pub source_extensions: Vec<String>,

    /// Extra environment for the child.
    pub env: BTreeMap<String, String>,
}

impl AppConfig {
    pub const COMMAND: FieldPath = FieldPath::new("app.command");
    pub const PORT: FieldPath = FieldPath::new("app.port");
    pub const SOURCE_EXTENSIONS: FieldPath = FieldPath::new("app.source_extensions");

    /// `http://host:port`
    pub fn origin(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub(in crate::config) fn normalize(&mut self) {
        for ext in &mut self.source_extensions {
            *ext = ext.trim().trim_start_matches('.').to_string();
        }
        self.source_extensions.retain(|ext| !ext.is_empty());
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            host: "localhost".into(),
            port: 8000,
            source_extensions: DEFAULT_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }
}
