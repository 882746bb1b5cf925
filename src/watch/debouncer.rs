use std::path::PathBuf;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::filter::WatchFilter;
use super::types::{ChangeBatch, ChangeKind};

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Pure debouncer: only handles timing and event deduplication.
///
/// A batch is released once `window` has passed without a new event.
pub(super) struct Debouncer {
    window: Duration,
    filter: WatchFilter,
    /// Path → ChangeKind (dedup is free via HashMap key uniqueness)
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    pub(super) last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new(window: Duration, filter: WatchFilter) -> Self {
        Self {
            window,
            filter,
            changes: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Deleted + Created/Modified → Created/Modified (file was restored)
    /// - Modified + Deleted → Deleted
    /// - Created + Deleted → dropped
    /// - otherwise the first event wins
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Deleted,
            EventKind::Modify(modify) => {
                // chmod/atime noise would otherwise restart the app for nothing
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for path in &event.paths {
            if self.filter.is_ignored(path) {
                continue;
            }
            self.record(path.clone(), kind);
        }
    }

    fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        if let Some(&existing) = self.changes.get(&path) {
            match (existing, kind) {
                (ChangeKind::Deleted, ChangeKind::Created | ChangeKind::Modified) => {
                    crate::debug!("watch"; "restore deleted->modified: {}", path.display());
                    self.changes.insert(path, ChangeKind::Modified);
                }
                (ChangeKind::Modified, ChangeKind::Deleted) => {
                    crate::debug!("watch"; "upgrade modified->deleted: {}", path.display());
                    self.changes.insert(path, ChangeKind::Deleted);
                }
                (ChangeKind::Created, ChangeKind::Deleted) => {
                    crate::debug!("watch"; "discard created+deleted: {}", path.display());
                    self.changes.remove(&path);
                }
                _ => return,
            }
            self.last_event = Some(Instant::now());
            return;
        }

        crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
        self.changes.insert(path, kind);
        self.last_event = Some(Instant::now());
    }

    /// Take the pending batch if the window has elapsed.
    ///
    /// Kinds are reconciled against the filesystem first, so an atomic
    /// save (delete + rename) reports as a modification.
    pub(super) fn take_if_ready(&mut self) -> Option<ChangeBatch> {
        if !self.is_ready() {
            return None;
        }

        let mut changes = std::mem::take(&mut self.changes);
        self.last_event = None;
        correct_by_existence(&mut changes);

        if changes.is_empty() {
            return None;
        }
        Some(ChangeBatch::from_map(changes))
    }

    pub(super) fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };
        last_event.elapsed() >= self.window && !self.changes.is_empty()
    }

    /// Precise sleep duration until next possible ready time.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        self.window
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

fn correct_by_existence(changes: &mut FxHashMap<PathBuf, ChangeKind>) {
    changes.retain(|path, kind| {
        let exists = path.exists();
        match *kind {
            ChangeKind::Created if !exists => {
                crate::debug!("watch"; "discard created (gone): {}", path.display());
                return false;
            }
            ChangeKind::Modified if !exists => *kind = ChangeKind::Deleted,
            ChangeKind::Deleted if exists => *kind = ChangeKind::Modified,
            _ => {}
        }
        true
    });
}
