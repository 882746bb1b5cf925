//! One browser connection: handshake, info, keepalive.
//!
//! ```text
//! AwaitingHello ──hello(7)──▶ Ready ──info──▶ registered
//!       │                       │
//!       └── info / unknown / binary / bad json ──▶ closed
//! ```
//!
//! The socket is non-blocking after the upgrade so the broadcaster can
//! write through the shared sink while this thread polls for input.

use std::io;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tungstenite::http::StatusCode;
use tungstenite::protocol::Message;
use tungstenite::{Error as WsError, WebSocket};

use super::message::{ClientMessage, PROTOCOL_7, ServerMessage};
use super::registry::{ClientId, ClientSink, ReloadRegistry, SendError};
use crate::error::DevError;
use crate::{debug, log};

/// Upgrade path browsers connect to.
pub const WS_PATH: &str = "/livereload";

#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    /// Ping after this much silence.
    pub keepalive: Duration,
    /// Close after this much silence.
    pub idle_timeout: Duration,
    pub poll_interval: Duration,
    pub handshake_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(50),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared write side of an upgraded socket.
pub(super) struct SocketSink {
    ws: Mutex<WebSocket<TcpStream>>,
}

impl ClientSink for SocketSink {
    fn send_text(&self, text: &str) -> Result<(), SendError> {
        let mut ws = self.ws.lock();
        match ws.send(Message::Text(text.to_owned().into())) {
            Ok(()) => Ok(()),
            // frame is queued; the connection thread flushes it
            Err(WsError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Err(SendError::Closing),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self) {
        let mut ws = self.ws.lock();
        let _ = ws.close(None);
        let _ = ws.flush();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingHello,
    Ready,
}

enum Flow {
    Continue,
    /// Peer went away or the socket failed.
    Disconnected,
    /// Close from our side.
    Violation(DevError),
}

struct Connection {
    id: ClientId,
    sink: Arc<SocketSink>,
    registry: ReloadRegistry,
    settings: ConnectionSettings,
    phase: Phase,
    last_seen: Instant,
    last_ping: Instant,
}

/// Upgrade `stream` and serve it until it closes or `shutdown` is set.
pub(super) fn serve_connection(
    stream: TcpStream,
    id: ClientId,
    registry: ReloadRegistry,
    settings: ConnectionSettings,
    shutdown: Arc<AtomicBool>,
) {
    // a client that never finishes the upgrade must not pin this thread
    let _ = stream.set_read_timeout(Some(settings.handshake_timeout));

    let ws = match tungstenite::accept_hdr(stream, check_path) {
        Ok(ws) => ws,
        Err(e) => {
            debug!("ws"; "handshake failed: {}", e);
            return;
        }
    };
    if let Err(e) = ws.get_ref().set_nonblocking(true) {
        log!("error"; "failed to configure websocket: {}", e);
        return;
    }

    let now = Instant::now();
    let mut connection = Connection {
        id,
        sink: Arc::new(SocketSink { ws: Mutex::new(ws) }),
        registry,
        settings,
        phase: Phase::AwaitingHello,
        last_seen: now,
        last_ping: now,
    };
    connection.run(&shutdown);
}

fn check_path(request: &Request, response: Response) -> Result<Response, ErrorResponse> {
    if request.uri().path() == WS_PATH {
        return Ok(response);
    }
    debug!("ws"; "rejecting upgrade on {}", request.uri().path());
    let mut rejection = ErrorResponse::new(Some("404: Not Found\n".to_string()));
    *rejection.status_mut() = StatusCode::NOT_FOUND;
    Err(rejection)
}

impl Connection {
    fn run(&mut self, shutdown: &AtomicBool) {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                self.sink.close();
                break;
            }

            let read = self.sink.ws.lock().read();
            let flow = match read {
                Ok(message) => {
                    self.last_seen = Instant::now();
                    self.on_message(message)
                }
                Err(WsError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    let flow = self.on_idle();
                    if matches!(flow, Flow::Continue) {
                        thread::sleep(self.settings.poll_interval);
                    }
                    flow
                }
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Flow::Disconnected,
                Err(e) => {
                    debug!("ws"; "connection closed with error: {}", e);
                    Flow::Disconnected
                }
            };

            match flow {
                Flow::Continue => {}
                Flow::Disconnected => break,
                Flow::Violation(err) => {
                    log!("error"; "{}", err);
                    self.sink.close();
                    self.drain_close();
                    break;
                }
            }
        }

        if self.registry.unregister(self.id) {
            debug!("ws"; "browser disconnected");
        } else {
            debug!("ws"; "browser disconnected, appears no websocket connection was made");
        }
    }

    fn on_message(&mut self, message: Message) -> Flow {
        match message {
            Message::Text(text) => self.on_text(text.as_str()),
            Message::Binary(_) => Flow::Violation(DevError::ProtocolViolation(
                "unexpected binary message".into(),
            )),
            Message::Close(_) => {
                // tungstenite queued the close reply; push it out
                let _ = self.sink.ws.lock().flush();
                Flow::Disconnected
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Flow::Continue,
        }
    }

    fn on_text(&mut self, text: &str) -> Flow {
        let message = match ClientMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                return Flow::Violation(DevError::ProtocolViolation(format!(
                    "unknown or malformed message {text}: {e}"
                )));
            }
        };

        match (message, self.phase) {
            (ClientMessage::Hello { protocols }, _) => {
                if !protocols.iter().any(|p| p == PROTOCOL_7) {
                    return Flow::Violation(DevError::ProtocolViolation(format!(
                        "live reload protocol 7 not supported by client {text}"
                    )));
                }
                if let Err(e) = self.sink.send_text(&ServerMessage::handshake().to_json()) {
                    debug!("ws"; "failed to send handshake: {}", e);
                    return Flow::Disconnected;
                }
                self.phase = Phase::Ready;
                Flow::Continue
            }
            (ClientMessage::Info { .. }, Phase::AwaitingHello) => Flow::Violation(
                DevError::ProtocolViolation("info received before hello".into()),
            ),
            (ClientMessage::Info { url }, Phase::Ready) => {
                let page = page_path(&url);
                debug!("ws"; "browser connected: {}", page);
                let sink: Arc<dyn ClientSink> = self.sink.clone();
                self.registry.register(self.id, sink, page);
                Flow::Continue
            }
        }
    }

    /// Flush queued frames and run keepalive bookkeeping.
    fn on_idle(&mut self) -> Flow {
        let mut ws = self.sink.ws.lock();
        match ws.flush() {
            Ok(()) => {}
            Err(WsError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return Flow::Disconnected,
            Err(e) => {
                debug!("ws"; "flush failed: {}", e);
                return Flow::Disconnected;
            }
        }

        let silent = self.last_seen.elapsed();
        if silent >= self.settings.idle_timeout {
            debug!("ws"; "closing idle connection after {:?}", silent);
            let _ = ws.close(None);
            let _ = ws.flush();
            return Flow::Disconnected;
        }

        if silent >= self.settings.keepalive && self.last_ping.elapsed() >= self.settings.keepalive {
            self.last_ping = Instant::now();
            match ws.send(Message::Ping(Default::default())) {
                Ok(()) => {}
                Err(WsError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    debug!("ws"; "keepalive failed: {}", e);
                    return Flow::Disconnected;
                }
            }
        }
        Flow::Continue
    }

    /// Give the peer a moment to answer our close frame.
    fn drain_close(&self) {
        for _ in 0..20 {
            match self.sink.ws.lock().read() {
                Ok(_) => {}
                Err(WsError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(_) => return,
            }
            thread::sleep(self.settings.poll_interval);
        }
    }
}

/// Decoded path component of the URL a browser announces.
///
/// `http://localhost:8000/foo%20bar?x=1` → `/foo bar`
fn page_path(url: &str) -> String {
    use percent_encoding::percent_decode_str;

    let raw = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        }
    };
    percent_decode_str(&raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path() {
        assert_eq!(page_path("http://localhost:8000/"), "/");
        assert_eq!(page_path("http://localhost:8000/about?x=1#top"), "/about");
        assert_eq!(page_path("http://127.0.0.1:8001/static/my%20page.html"), "/static/my page.html");
        assert_eq!(page_path("/blog/"), "/blog/");
        assert_eq!(page_path("docs"), "/docs");
    }
}
