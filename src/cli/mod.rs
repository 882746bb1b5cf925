//! Command-line interface module.

mod args;
pub mod runserver;
pub mod serve;

pub use args::{Cli, Commands, LiveReloadArgs, RunserverArgs, ServeArgs};

use anyhow::{Context, Result};
use std::net::SocketAddr;

use crate::config::DevConfig;
use crate::reload::{ProtocolServer, ReloadRegistry};
use crate::serve::{AuxServer, LIVERELOAD_PATH, Site, StaticResolver};
use crate::{debug, log};

/// The async side of both commands runs on one thread.
fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")
}

/// The reload WebSocket server and the aux HTTP server, started together.
struct Servers {
    registry: ReloadRegistry,
    protocol: Option<ProtocolServer>,
    aux: AuxServer,
}

impl Servers {
    fn start(config: &DevConfig, aux_port: u16) -> Result<Self> {
        let registry = ReloadRegistry::new();
        let live = &config.livereload;

        let protocol = live
            .enable
            .then(|| {
                ProtocolServer::bind(
                    live.interface,
                    live.ws_port,
                    registry.clone(),
                    live.connection_settings(),
                )
            })
            .transpose()
            .context("failed to start livereload server")?;

        let resolver = config
            .static_files
            .path
            .as_deref()
            .map(StaticResolver::new)
            .transpose()
            .context("failed to open static directory")?;

        let site = Site {
            static_url: config.static_files.url.clone(),
            resolver,
            ws_port: protocol.as_ref().map(ProtocolServer::port),
        };
        let aux = AuxServer::bind(live.interface, aux_port, site).context("failed to start aux server")?;

        if let Some(protocol) = &protocol {
            debug!("reload"; "ws://{}{}", protocol.local_addr(), crate::reload::WS_PATH);
        }
        Ok(Self {
            registry,
            protocol,
            aux,
        })
    }

    fn aux_addr(&self) -> SocketAddr {
        self.aux.addr()
    }

    fn livereload_enabled(&self) -> bool {
        self.protocol.is_some()
    }

    fn script_url(&self) -> String {
        format!("http://{}{}", self.aux_addr(), LIVERELOAD_PATH)
    }

    /// Close browser connections first so no reload races the exit.
    fn shutdown(self) {
        if let Some(protocol) = self.protocol {
            protocol.shutdown();
        }
        self.aux.shutdown();
        log!("serve"; "stopped");
    }
}
