//! HTTP response handlers.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::embed::serve::{LIVERELOAD_TAG, livereload_js};
use crate::utils::mime::{self, types};

/// Fixed `Last-Modified` of the embedded client; it only changes with a release.
pub const LIVERELOAD_LAST_MODIFIED: &str = "Fri, 01 Jan 2016 00:00:00 GMT";

const JAVASCRIPT: &str = "application/javascript";

/// Respond with a static file, injecting the reload tag into HTML.
pub fn respond_file(request: Request, path: &Path, inject: bool) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type, &[("Access-Control-Allow-Origin", "*")]);
    }

    let body = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let body = if inject && content_type == types::HTML {
        inject_livereload(&body)
    } else {
        body
    };

    send_body(request, 200, content_type, body, &[("Access-Control-Allow-Origin", "*")])
}

/// Respond with the embedded reload client, honouring `If-Modified-Since`.
pub fn respond_livereload_js(request: Request, ws_port: u16) -> Result<()> {
    let cached = header_value(&request, "If-Modified-Since")
        .is_some_and(|since| since.trim() == LIVERELOAD_LAST_MODIFIED);
    let extra = [("Last-Modified", LIVERELOAD_LAST_MODIFIED)];

    if cached {
        let response = decorate(Response::empty(StatusCode(304)), &[], &extra);
        request.respond(response)?;
        return Ok(());
    }
    if is_head_request(&request) {
        return send_head(request, 200, JAVASCRIPT, &extra);
    }

    let body = livereload_js(ws_port);
    send_body(request, 200, JAVASCRIPT, body.into_bytes(), &extra)
}

pub fn respond_not_found(request: Request) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 404, types::PLAIN, &[]);
    }
    send_body(request, 404, types::PLAIN, b"404: Not Found\n".to_vec(), &[])
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    let response = Response::from_data(b"405: Method Not Allowed\n".to_vec()).with_status_code(StatusCode(405));
    let response = decorate(response, &[("Content-Type", types::PLAIN)], &[("Allow", "GET, HEAD")]);
    request.respond(response)?;
    Ok(())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503: Service Unavailable\n".to_vec(), &[])
}

pub fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn header_value<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request
        .headers()
        .iter()
        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

fn send_head(request: Request, status: u16, content_type: &str, extra: &[(&str, &str)]) -> Result<()> {
    let response = decorate(Response::empty(StatusCode(status)), &[("Content-Type", content_type)], extra);
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &str,
    body: Vec<u8>,
    extra: &[(&str, &str)],
) -> Result<()> {
    let response = Response::from_data(body).with_status_code(StatusCode(status));
    request.respond(decorate(response, &[("Content-Type", content_type)], extra))?;
    Ok(())
}

/// Add headers, plus `Cache-Control: no-cache` which every response carries.
fn decorate<R: Read>(
    mut response: Response<R>,
    headers: &[(&str, &str)],
    extra: &[(&str, &str)],
) -> Response<R> {
    let fields = headers.iter().chain(extra.iter()).copied();
    for (key, value) in fields.chain([("Cache-Control", "no-cache")]) {
        if let Ok(header) = Header::from_bytes(key.as_bytes(), value.as_bytes()) {
            response.add_header(header);
        }
    }
    response
}

/// Insert the reload tag before the last `</body>`, or append it.
pub fn inject_livereload(content: &[u8]) -> Vec<u8> {
    let tag = LIVERELOAD_TAG.as_bytes();
    const PATTERN: &[u8] = b"</body>";

    let mut result = Vec::with_capacity(content.len() + tag.len());
    match content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
    {
        Some(pos) => {
            result.extend_from_slice(&content[..pos]);
            result.extend_from_slice(tag);
            result.extend_from_slice(&content[pos..]);
        }
        None => {
            result.extend_from_slice(content);
            result.extend_from_slice(tag);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_before_last_body_close() {
        let html = b"<html><body><p>&lt;/body&gt;</p></BODY></html>";
        let out = String::from_utf8(inject_livereload(html)).unwrap();
        assert_eq!(
            out,
            "<html><body><p>&lt;/body&gt;</p><script src=\"/livereload.js\"></script>\n</BODY></html>"
        );
    }

    #[test]
    fn test_inject_appends_without_body() {
        let out = String::from_utf8(inject_livereload(b"<p>fragment</p>")).unwrap();
        assert_eq!(out, "<p>fragment</p><script src=\"/livereload.js\"></script>\n");
    }
}
