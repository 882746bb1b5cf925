//! Filesystem watching and the loops that react to it.
//!
//! ```text
//! notify ──▶ ChangeStream (filter + debounce) ──▶ ChangeBatch
//!                                                     │
//!                        ┌────────────────────────────┴───────────────┐
//!                        ▼                                            ▼
//!                 AppTask (runserver)                       LiveReloadTask (serve)
//!     classify → restart → probe → broadcast             classify_static → broadcast
//! ```

mod classifier;
mod debouncer;
mod filter;
mod task;
mod types;


use std::path::Path;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use debouncer::Debouncer;

pub use classifier::{Action, ChangeClassifier, DEFAULT_SOURCE_EXTENSIONS, classify_static};
pub use debouncer::DEFAULT_DEBOUNCE_MS;
pub use filter::{DEFAULT_IGNORE, WatchFilter};
pub use task::{AppTask, LiveReloadTask};
pub use types::{ChangeBatch, ChangeEvent, ChangeKind};

/// Debounced stream of change batches below one root.
///
/// Dropping the stream drops the watcher, which ends the subscription.
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<notify::Result<notify::Event>>,
    /// Must be kept alive; `None` only for streams fed by hand.
    _watcher: Option<RecommendedWatcher>,
    debouncer: Debouncer,
}

impl ChangeStream {
    /// Start watching `filter.root()` recursively.
    ///
    /// The watcher is live before this returns, so nothing that happens
    /// while the app starts up is missed.
    pub fn watch(window: Duration, filter: WatchFilter) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(filter.root(), RecursiveMode::Recursive)?;
        crate::debug!("watch"; "watching {} for changes", filter.root().display());

        Ok(Self {
            rx,
            _watcher: Some(watcher),
            debouncer: Debouncer::new(window, filter),
        })
    }

    /// A stream fed through the returned sender instead of a watcher.
    #[cfg(test)]
    pub(crate) fn manual(
        window: Duration,
        root: &Path,
    ) -> (mpsc::UnboundedSender<notify::Result<notify::Event>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Self {
            rx,
            _watcher: None,
            debouncer: Debouncer::new(window, WatchFilter::new(root, Vec::new())),
        };
        (tx, stream)
    }

    /// Next debounced batch.
    ///
    /// `None` once the subscription is gone; `Some(Err)` for a watcher
    /// failure, which callers treat as fatal.
    pub async fn next_batch(&mut self) -> Option<notify::Result<ChangeBatch>> {
        loop {
            tokio::select! {
                biased;
                event = self.rx.recv() => match event {
                    Some(Ok(event)) => self.debouncer.add_event(&event),
                    Some(Err(e)) => return Some(Err(e)),
                    None => return self.debouncer.take_if_ready().map(Ok),
                },
                _ = tokio::time::sleep(self.debouncer.sleep_duration()) => {
                    if let Some(batch) = self.debouncer.take_if_ready() {
                        return Some(Ok(batch));
                    }
                }
            }
        }
    }
}

/// Log a batch one line per file.
fn log_batch(batch: &ChangeBatch) {
    for event in batch.iter() {
        crate::log!("watch"; "{}: {}", event.kind.label(), display_path(&event.path));
    }
}

fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(|p| p.display().to_string()))
        .unwrap_or_else(|| path.display().to_string())
}
