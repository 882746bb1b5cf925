//! `[static]` section configuration.
//!
//! ```toml
//! [static]
//! path = "static"     # optional; changes below it reload in place
//! url = "/static/"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::FieldPath;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Static root. Absolute and symlink-resolved after loading.
    pub path: Option<PathBuf>,

    /// URL prefix the static root is served under.
    pub url: String,
}

impl StaticConfig {
    pub const PATH: FieldPath = FieldPath::new("static.path");
    pub const URL: FieldPath = FieldPath::new("static.url");

    /// Force the prefix into `/segment/` form.
    pub(in crate::config) fn normalize_url(&mut self) {
        let trimmed = self.url.trim().trim_matches('/');
        self.url = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        };
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            path: None,
            url: "/static/".into(),
        }
    }
}
