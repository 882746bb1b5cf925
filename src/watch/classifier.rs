//! Maps a change batch to the one action the loop takes for it.
//!
//! ```text
//! any source file changed          → RestartAndReloadAll
//! exactly one file, under static   → ReloadSingle(path)
//! anything else                    → ReloadAll
//! ```

use std::path::{Path, PathBuf};

use smallvec::SmallVec;

use super::types::ChangeBatch;

/// What the loop does with a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Restart the app, wait for it, then reload every browser.
    RestartAndReloadAll,
    /// Reload the clients affected by this one static file.
    ReloadSingle(PathBuf),
    /// Reload every browser.
    ReloadAll,
}

/// Source extensions used when none are configured.
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["py"];

#[derive(Debug, Clone)]
pub struct ChangeClassifier {
    /// Stored without the leading dot.
    source_extensions: SmallVec<[String; 2]>,
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_EXTENSIONS.iter().copied())
    }
}

impl ChangeClassifier {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            source_extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    /// Classify a batch for the app loop.
    ///
    /// The source rule wins even when the batch also touches static files.
    pub fn classify(&self, batch: &ChangeBatch, static_root: Option<&Path>) -> Action {
        if batch.paths().any(|path| self.is_source(path)) {
            return Action::RestartAndReloadAll;
        }

        if let (Some(event), Some(root)) = (batch.single(), static_root)
            && event.path.starts_with(root)
        {
            return Action::ReloadSingle(event.path.clone());
        }

        Action::ReloadAll
    }

    pub fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.source_extensions.iter().any(|src| src == ext))
    }
}

/// Classify a batch for static-only serving: no process, no source rule.
pub fn classify_static(batch: &ChangeBatch) -> Action {
    match batch.single() {
        Some(event) => Action::ReloadSingle(event.path.clone()),
        None => Action::ReloadAll,
    }
}
