//! Auxiliary HTTP server: the reload client script and static files.

mod path;
mod response;

pub use path::{StaticResolver, canonicalize_static_path};

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use tiny_http::{Method, Request, Server};

use crate::{debug, log};

/// Path the reload client is served from.
pub const LIVERELOAD_PATH: &str = "/livereload.js";

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// What the aux server serves.
#[derive(Debug, Clone)]
pub struct Site {
    /// Files below this URL prefix come from `resolver`.
    pub static_url: String,
    pub resolver: Option<StaticResolver>,
    /// WebSocket port baked into the client script; `None` disables live reload.
    pub ws_port: Option<u16>,
}

impl Site {
    /// Request path relative to the static mount, if it is under it.
    fn static_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let prefix = self.static_url.trim_end_matches('/');
        let rest = path.strip_prefix(prefix)?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }
}

pub struct AuxServer {
    server: Arc<Server>,
    addr: SocketAddr,
    shutting_down: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl AuxServer {
    /// Bind and start serving on a background thread.
    pub fn bind(interface: IpAddr, port: u16, site: Site) -> Result<Self> {
        let (server, addr) = bind_with_retry(interface, port)?;
        let server = Arc::new(server);
        let shutting_down = Arc::new(AtomicBool::new(false));

        // requests are served concurrently so a slow file never blocks the script
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .thread_name(|i| format!("aux-{i}"))
            .build()
            .context("failed to create request thread pool")?;

        let worker = {
            let server = Arc::clone(&server);
            let shutting_down = Arc::clone(&shutting_down);
            let site = Arc::new(site);
            thread::Builder::new()
                .name("aux-http".into())
                .spawn(move || run_request_loop(&server, &pool, &site, &shutting_down))
                .context("failed to spawn aux server")?
        };

        debug!("aux"; "listening on http://{}", addr);
        Ok(Self {
            server,
            addr,
            shutting_down,
            worker: Some(worker),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Answer 503 from now on, stop accepting and wait for the loop to end.
    pub fn shutdown(mut self) {
        self.shutting_down.store(true, Ordering::Relaxed);
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for AuxServer {
    fn drop(&mut self) {
        self.shutting_down.store(true, Ordering::Relaxed);
        self.server.unblock();
    }
}

fn run_request_loop(server: &Server, pool: &rayon::ThreadPool, site: &Arc<Site>, shutting_down: &Arc<AtomicBool>) {
    for request in server.incoming_requests() {
        let site = Arc::clone(site);
        let shutting_down = Arc::clone(shutting_down);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &site, &shutting_down) {
                log!("error"; "request error: {e:#}");
            }
        });
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, site: &Site, shutting_down: &AtomicBool) -> Result<()> {
    if shutting_down.load(Ordering::Relaxed) || crate::shutdown::is_shutdown() {
        return response::respond_unavailable(request);
    }
    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    let url = request.url().to_string();
    let path = url.split(['?', '#']).next().unwrap_or("/");
    debug!("aux"; "{} {}", request.method(), path);

    if let Some(ws_port) = site.ws_port
        && path == LIVERELOAD_PATH
    {
        return response::respond_livereload_js(request, ws_port);
    }

    if let (Some(resolver), Some(rest)) = (&site.resolver, site.static_path(path))
        && let Some(file) = resolver.resolve(rest)
    {
        return response::respond_file(request, &file, site.ws_port.is_some());
    }

    response::respond_not_found(request)
}

/// Bind to the specified interface and port, with automatic port retry.
fn bind_with_retry(interface: IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match Server::http(SocketAddr::new(interface, port)) {
            Ok(server) => {
                let addr = server
                    .server_addr()
                    .to_ip()
                    .unwrap_or_else(|| SocketAddr::new(interface, port));
                if offset > 0 {
                    log!("aux"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::{Read, Write};
    use std::net::{Ipv4Addr, TcpStream};
    use std::time::Duration;

    use tempfile::TempDir;

    use super::response::LIVERELOAD_LAST_MODIFIED;
    use super::*;

    struct Reply {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    }

    impl Reply {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    fn request(addr: SocketAddr, raw: &str) -> Reply {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream.write_all(raw.as_bytes()).unwrap();

        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();

        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        let mut lines = head.lines();
        let status = lines.next().unwrap().split(' ').nth(1).unwrap().parse().unwrap();
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Reply {
            status,
            headers,
            body: body.to_string(),
        }
    }

    fn get(addr: SocketAddr, path: &str) -> Reply {
        request(addr, &format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"))
    }

    fn serve(ws_port: Option<u16>, static_url: &str) -> (TempDir, AuxServer) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<html><body>home</body></html>").unwrap();
        fs::create_dir_all(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/app.css"), "body{}").unwrap();

        let site = Site {
            static_url: static_url.to_string(),
            resolver: Some(StaticResolver::new(dir.path()).unwrap()),
            ws_port,
        };
        let server = AuxServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, site).unwrap();
        (dir, server)
    }

    #[test]
    fn test_livereload_js() {
        let (_dir, server) = serve(Some(35729), "/static/");

        let reply = get(server.addr(), "/livereload.js");
        assert_eq!(reply.status, 200);
        assert_eq!(reply.header("Content-Type"), Some("application/javascript"));
        assert_eq!(reply.header("Last-Modified"), Some(LIVERELOAD_LAST_MODIFIED));
        assert_eq!(reply.header("Cache-Control"), Some("no-cache"));
        assert!(reply.body.contains("var WS_PORT = 35729;"));
        server.shutdown();
    }

    #[test]
    fn test_livereload_js_not_modified() {
        let (_dir, server) = serve(Some(35729), "/static/");

        let reply = request(
            server.addr(),
            &format!(
                "GET /livereload.js HTTP/1.1\r\nHost: localhost\r\nIf-Modified-Since: {LIVERELOAD_LAST_MODIFIED}\r\nConnection: close\r\n\r\n"
            ),
        );
        assert_eq!(reply.status, 304);
        assert!(reply.body.is_empty());

        let stale = request(
            server.addr(),
            "GET /livereload.js HTTP/1.1\r\nHost: localhost\r\nIf-Modified-Since: Sat, 02 Jan 2016 00:00:00 GMT\r\nConnection: close\r\n\r\n",
        );
        assert_eq!(stale.status, 200);
        server.shutdown();
    }

    #[test]
    fn test_static_file_and_injection() {
        let (_dir, server) = serve(Some(35729), "/static/");

        let css = get(server.addr(), "/static/css/app.css");
        assert_eq!(css.status, 200);
        assert_eq!(css.body, "body{}");
        assert_eq!(css.header("Access-Control-Allow-Origin"), Some("*"));

        let page = get(server.addr(), "/static/");
        assert_eq!(page.status, 200);
        assert_eq!(
            page.body,
            "<html><body>home<script src=\"/livereload.js\"></script>\n</body></html>"
        );
        server.shutdown();
    }

    #[test]
    fn test_no_injection_without_livereload() {
        let (_dir, server) = serve(None, "/");

        let page = get(server.addr(), "/index.html");
        assert_eq!(page.body, "<html><body>home</body></html>");
        assert_eq!(get(server.addr(), "/livereload.js").status, 404);
        server.shutdown();
    }

    #[test]
    fn test_not_found() {
        let (_dir, server) = serve(Some(35729), "/static/");

        for path in ["/static/missing.css", "/css/app.css", "/staticx/css/app.css", "/static/../index.html"] {
            let reply = get(server.addr(), path);
            assert_eq!(reply.status, 404, "{path}");
            assert_eq!(reply.body, "404: Not Found\n");
            assert_eq!(reply.header("Cache-Control"), Some("no-cache"));
            assert_eq!(reply.header("Access-Control-Allow-Origin"), None);
        }
        server.shutdown();
    }

    #[test]
    fn test_other_methods_rejected() {
        let (_dir, server) = serve(Some(35729), "/");
        let reply = request(
            server.addr(),
            "POST /index.html HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        assert_eq!(reply.status, 405);
        server.shutdown();
    }

    #[test]
    fn test_static_mount_prefix() {
        let site = Site {
            static_url: "/static/".into(),
            resolver: None,
            ws_port: None,
        };
        assert_eq!(site.static_path("/static/a.css"), Some("/a.css"));
        assert_eq!(site.static_path("/static"), Some(""));
        assert_eq!(site.static_path("/staticx/a.css"), None);

        let root = Site {
            static_url: "/".into(),
            ..site
        };
        assert_eq!(root.static_path("/a.css"), Some("/a.css"));
    }
}
