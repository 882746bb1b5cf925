//! Content types for files served from the static root.

use std::path::Path;

pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const OCTET_STREAM: &str = "application/octet-stream";
}

/// Extension (lowercase) to content type; the usual front-end asset set.
const TABLE: &[(&[&str], &str)] = &[
    (&["html", "htm"], types::HTML),
    (&["txt"], types::PLAIN),
    (&["css"], "text/css; charset=utf-8"),
    (&["js", "mjs"], "text/javascript; charset=utf-8"),
    (&["map", "json"], "application/json"),
    (&["xml"], "application/xml"),
    (&["svg"], "image/svg+xml"),
    (&["png"], "image/png"),
    (&["jpg", "jpeg"], "image/jpeg"),
    (&["gif"], "image/gif"),
    (&["webp"], "image/webp"),
    (&["avif"], "image/avif"),
    (&["ico"], "image/x-icon"),
    (&["woff"], "font/woff"),
    (&["woff2"], "font/woff2"),
    (&["ttf"], "font/ttf"),
    (&["otf"], "font/otf"),
    (&["mp4"], "video/mp4"),
    (&["webm"], "video/webm"),
    (&["mp3"], "audio/mpeg"),
    (&["wasm"], "application/wasm"),
    (&["pdf"], "application/pdf"),
];

pub fn from_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(types::OCTET_STREAM, from_extension)
}

pub fn from_extension(ext: &str) -> &'static str {
    let ext = ext.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map_or(types::OCTET_STREAM, |&(_, ty)| ty)
}

/// Whether `path` names an HTML document.
pub fn is_html(path: &Path) -> bool {
    from_path(path) == types::HTML
}
