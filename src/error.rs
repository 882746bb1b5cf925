//! Error kinds raised by the dev loop.
//!
//! Only `StartupFailed`, `Watch`, `Config` and port errors end the loop.
//! The rest are logged where they happen and the loop carries on.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum DevError {
    /// The application process could not be spawned.
    #[error("failed to start `{command}`")]
    StartupFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A child survived both the interrupt and the kill tier.
    #[error("process {pid} did not exit after interrupt and kill")]
    ShutdownTimeout { pid: u32 },

    /// A client broke the reload protocol; its connection gets closed.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A reload message could not be delivered to one client.
    #[error("failed to send reload to {url}")]
    BroadcastSend {
        url: String,
        #[source]
        source: crate::reload::SendError,
    },

    /// The restarted app never accepted a connection.
    #[error("app at {url} not reachable after {attempts} attempts")]
    ProbeExhausted { url: String, attempts: u32 },

    #[error("port {0} is already in use")]
    PortInUse(u16),

    #[error("file watcher failed")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = DevError> = std::result::Result<T, E>;
