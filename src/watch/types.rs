use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

/// A single debounced filesystem change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Changes observed within one debounce window.
///
/// Produced with at least one event; sorted by path so logs and
/// classification are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch(Vec<ChangeEvent>);

impl ChangeBatch {
    pub(super) fn from_map(changes: FxHashMap<PathBuf, ChangeKind>) -> Self {
        changes
            .into_iter()
            .map(|(path, kind)| ChangeEvent { path, kind })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeEvent> {
        self.0.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(|event| event.path.as_path())
    }

    /// The only event, if the batch holds exactly one.
    pub fn single(&self) -> Option<&ChangeEvent> {
        match self.0.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

impl FromIterator<ChangeEvent> for ChangeBatch {
    fn from_iter<I: IntoIterator<Item = ChangeEvent>>(iter: I) -> Self {
        let mut events: Vec<_> = iter.into_iter().collect();
        events.sort_by(|a, b| a.path.cmp(&b.path));
        Self(events)
    }
}
