//! Filesystem path normalization.

use std::path::{Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Expand `~` and resolve `path` against `base` when relative.
pub fn expand_relative(path: &Path, base: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    let path = PathBuf::from(expanded);
    if path.is_relative() {
        normalize_path(&base.join(path))
    } else {
        normalize_path(&path)
    }
}

/// Join `rel` onto a URL prefix with exactly one `/` between them.
///
/// `rel` uses the platform separator; the result always uses `/`.
pub fn url_join(prefix: &str, rel: &Path) -> String {
    let mut url = prefix.trim_end_matches('/').to_string();
    for component in rel.components() {
        url.push('/');
        url.push_str(&component.as_os_str().to_string_lossy());
    }
    if url.is_empty() {
        url.push('/');
    }
    url
}
