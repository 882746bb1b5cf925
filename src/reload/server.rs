//! Live reload WebSocket server.
//!
//! One acceptor thread plus one thread per browser connection. Connections
//! register themselves in the shared [`ReloadRegistry`]; the broadcaster
//! writes through the registry, never through the server.

use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use super::connection::{ConnectionSettings, serve_connection};
use super::registry::{ClientId, ReloadRegistry};
use crate::utils::plural_count;
use crate::{debug, log};

/// Consecutive ports tried when the requested one is taken.
const MAX_PORT_RETRIES: u16 = 10;

const ACCEPT_POLL: Duration = Duration::from_millis(100);

pub struct ProtocolServer {
    addr: SocketAddr,
    registry: ReloadRegistry,
    shutdown: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ProtocolServer {
    /// Bind on `interface`, starting at `base_port`, and start accepting.
    pub fn bind(
        interface: IpAddr,
        base_port: u16,
        registry: ReloadRegistry,
        settings: ConnectionSettings,
    ) -> Result<Self> {
        let listener = try_bind_port(interface, base_port, MAX_PORT_RETRIES)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        if base_port != 0 && addr.port() != base_port {
            log!("ws"; "port {} is in use, using {}", base_port, addr.port());
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(Mutex::new(Vec::new()));

        let acceptor = {
            let registry = registry.clone();
            let shutdown = Arc::clone(&shutdown);
            let connections = Arc::clone(&connections);
            thread::Builder::new()
                .name("ws-accept".into())
                .spawn(move || accept_loop(listener, registry, settings, shutdown, connections))
                .context("failed to spawn websocket acceptor")?
        };

        debug!("ws"; "listening on ws://{}/livereload", addr);
        Ok(Self {
            addr,
            registry,
            shutdown,
            acceptor: Some(acceptor),
            connections,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting, close every registered client and wait for all
    /// connection threads to finish.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let closed = self.registry.close_all();

        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        let handles: Vec<_> = self.connections.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        debug!("ws"; "closed {}", plural_count(closed, "websocket"));
    }
}

impl Drop for ProtocolServer {
    fn drop(&mut self) {
        // threads notice the flag on their next poll
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

fn accept_loop(
    listener: TcpListener,
    registry: ReloadRegistry,
    settings: ConnectionSettings,
    shutdown: Arc<AtomicBool>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
) {
    let mut next_id: ClientId = 0;

    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("ws"; "client connected: {}", peer);
                // the handshake runs blocking; the connection flips it back
                let _ = stream.set_nonblocking(false);

                next_id += 1;
                let id = next_id;
                let registry = registry.clone();
                let shutdown = Arc::clone(&shutdown);
                let spawned = thread::Builder::new()
                    .name(format!("ws-{id}"))
                    .spawn(move || serve_connection(stream, id, registry, settings, shutdown));

                match spawned {
                    Ok(handle) => {
                        let mut connections = connections.lock();
                        connections.retain(|handle| !handle.is_finished());
                        connections.push(handle);
                    }
                    Err(e) => log!("error"; "failed to spawn connection thread: {}", e),
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(e) => {
                log!("error"; "websocket accept error: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<TcpListener> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind((interface, port)) {
            Ok(listener) => return Ok(listener),
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "failed to bind websocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}
