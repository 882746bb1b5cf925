//! URL to filesystem path resolution for static files.

use std::path::{Path, PathBuf};

use smallvec::SmallVec;

/// URLs that name the same page as `url`, most specific first.
///
/// `/foo` and `/foo/` both cover `/foo.html` and `/foo/index.html`. The
/// `.html` form is skipped for the root, which has no name to extend.
pub fn canonicalize_static_path(url: &str) -> SmallVec<[String; 3]> {
    let trimmed = url.trim_end_matches('/');
    let mut candidates = SmallVec::new();
    candidates.push(url.to_string());
    if !trimmed.is_empty() {
        candidates.push(format!("{trimmed}.html"));
    }
    candidates.push(format!("{trimmed}/index.html"));
    candidates
}

/// Maps request paths to files below a fixed root.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    /// Canonical, so containment checks compare like with like.
    root: PathBuf,
}

impl StaticResolver {
    pub fn new(root: &Path) -> std::io::Result<Self> {
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a request path (relative to the static URL prefix).
    ///
    /// Precedence: the exact file; for a directory only its `index.html`;
    /// otherwise the `.html` sibling then `index.html`. Anything escaping the
    /// root, including through symlinks, resolves to `None`.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let clean = normalize_url(request_path);
        if clean.split('/').any(|segment| segment == "..") {
            return None;
        }

        let candidates = canonicalize_static_path(&format!("/{clean}"));
        let (exact, rest) = candidates.split_first()?;

        match self.locate(exact) {
            Some(found) if found.is_file() => return Some(found),
            Some(found) if found.is_dir() => {
                return rest
                    .last()
                    .and_then(|index| self.locate(index))
                    .filter(|index| index.is_file());
            }
            _ => {}
        }

        rest.iter()
            .filter_map(|candidate| self.locate(candidate))
            .find(|found| found.is_file())
    }

    fn locate(&self, url: &str) -> Option<PathBuf> {
        let canonical = self.root.join(url.trim_start_matches('/')).canonicalize().ok()?;
        canonical.starts_with(&self.root).then_some(canonical)
    }
}

/// Normalize URL: decode, strip query string, trim slashes
fn normalize_url(url: &str) -> String {
    use percent_encoding::percent_decode_str;

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();
    decoded.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, StaticResolver) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("index.html"), "home").unwrap();
        fs::write(root.join("about.html"), "about").unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        fs::write(root.join("docs/index.html"), "docs").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("empty.html"), "shadowed").unwrap();
        fs::create_dir_all(root.join("css")).unwrap();
        fs::write(root.join("css/app.css"), "body{}").unwrap();
        fs::write(root.join("my file.txt"), "spaces").unwrap();
        let resolver = StaticResolver::new(root).unwrap();
        (dir, resolver)
    }

    fn name(resolver: &StaticResolver, url: &str) -> Option<String> {
        resolver.resolve(url).map(|p| {
            p.strip_prefix(resolver.root())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
    }

    #[test]
    fn test_candidates() {
        assert_eq!(
            canonicalize_static_path("/foo").as_slice(),
            ["/foo", "/foo.html", "/foo/index.html"]
        );
        assert_eq!(
            canonicalize_static_path("/foo/").as_slice(),
            ["/foo/", "/foo.html", "/foo/index.html"]
        );
        assert_eq!(canonicalize_static_path("/").as_slice(), ["/", "/index.html"]);
    }

    #[test]
    fn test_resolve_exact_and_html_sibling() {
        let (_dir, resolver) = site();
        assert_eq!(name(&resolver, "/css/app.css").as_deref(), Some("css/app.css"));
        assert_eq!(name(&resolver, "/about").as_deref(), Some("about.html"));
        assert_eq!(name(&resolver, "/about/").as_deref(), Some("about.html"));
        assert_eq!(name(&resolver, "/about.html").as_deref(), Some("about.html"));
    }

    #[test]
    fn test_resolve_directory_index() {
        let (_dir, resolver) = site();
        assert_eq!(name(&resolver, "/").as_deref(), Some("index.html"));
        assert_eq!(name(&resolver, "").as_deref(), Some("index.html"));
        assert_eq!(name(&resolver, "/docs").as_deref(), Some("docs/index.html"));
        assert_eq!(name(&resolver, "/docs/").as_deref(), Some("docs/index.html"));
    }

    #[test]
    fn test_directory_without_index_is_not_found() {
        let (_dir, resolver) = site();
        // the directory wins over empty.html and has no index
        assert_eq!(name(&resolver, "/empty"), None);
    }

    #[test]
    fn test_query_and_encoding() {
        let (_dir, resolver) = site();
        assert_eq!(name(&resolver, "/about?v=2").as_deref(), Some("about.html"));
        assert_eq!(name(&resolver, "/my%20file.txt").as_deref(), Some("my file.txt"));
    }

    #[test]
    fn test_missing_is_none() {
        let (_dir, resolver) = site();
        assert_eq!(name(&resolver, "/nope"), None);
        assert_eq!(name(&resolver, "/css/nope.css"), None);
    }

    #[test]
    fn test_traversal_rejected() {
        let (_dir, resolver) = site();
        assert_eq!(name(&resolver, "/../index.html"), None);
        assert_eq!(name(&resolver, "/%2e%2e/index.html"), None);
        assert_eq!(name(&resolver, "/css/../index.html"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (dir, resolver) = site();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.html"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.html"), dir.path().join("link.html"))
            .unwrap();

        assert_eq!(name(&resolver, "/link.html"), None);
        assert_eq!(name(&resolver, "/link"), None);
    }
}
