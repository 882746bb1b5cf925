//! Paths that never reach the classifier.

use std::path::{Path, PathBuf};

/// Directories skipped when `watch.ignore` is not set.
pub const DEFAULT_IGNORE: &[&str] = &["node_modules", ".git", "__pycache__", "target"];

/// Drops editor artifacts and anything under an ignored directory.
///
/// Ignored names are matched against components *relative to* the watch
/// root, so a project that itself lives under `.../target/` still works.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    ignore: Vec<String>,
}

impl WatchFilter {
    pub fn new(root: impl Into<PathBuf>, ignore: impl IntoIterator<Item = String>) -> Self {
        Self {
            root: root.into(),
            ignore: ignore.into_iter().collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        if is_temp_file(path) {
            return true;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            self.ignore.iter().any(|ignored| *ignored == name)
        })
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
