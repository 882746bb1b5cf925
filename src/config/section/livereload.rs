//! `[livereload]` section configuration.
//!
//! ```toml
//! [livereload]
//! enable = true
//! interface = "127.0.0.1"     # where the aux and websocket servers bind
//! aux_port = 8001             # default: app.port + 1
//! ws_port = 35729
//! keepalive_secs = 30
//! idle_timeout_secs = 120
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::FieldPath;
use crate::reload::ConnectionSettings;

/// Default LiveReload WebSocket port.
pub const DEFAULT_WS_PORT: u16 = 35729;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveReloadConfig {
    pub enable: bool,

    pub interface: IpAddr,

    /// Port of the script/static server. Resolved against `app.port` on load.
    pub aux_port: Option<u16>,

    pub ws_port: u16,

    pub keepalive_secs: u64,

    pub idle_timeout_secs: u64,
}

impl LiveReloadConfig {
    pub const AUX_PORT: FieldPath = FieldPath::new("livereload.aux_port");
    pub const WS_PORT: FieldPath = FieldPath::new("livereload.ws_port");
    pub const IDLE_TIMEOUT: FieldPath = FieldPath::new("livereload.idle_timeout_secs");

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            keepalive: Duration::from_secs(self.keepalive_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            ..ConnectionSettings::default()
        }
    }
}

impl Default for LiveReloadConfig {
    fn default() -> Self {
        Self {
            enable: true,
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            aux_port: None,
            ws_port: DEFAULT_WS_PORT,
            keepalive_secs: 30,
            idle_timeout_secs: 120,
        }
    }
}
