//! LiveReload protocol 7 messages.
//!
//! Browser → server: `hello` (protocol negotiation) and `info` (the page URL).
//! Server → browser: `hello` (handshake reply) and `reload`.

use serde::{Deserialize, Serialize};

/// The only protocol this server speaks.
pub const PROTOCOL_7: &str = "http://livereload.com/protocols/official-7";

pub const SERVER_NAME: &str = "livereload-devloop";

/// Messages accepted from browsers.
///
/// Extra fields (e.g. `plugins` on `info`) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ClientMessage {
    Hello {
        #[serde(default)]
        protocols: Vec<String>,
    },
    Info {
        url: String,
    },
}

impl ClientMessage {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Messages sent to browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ServerMessage {
    Hello {
        protocols: Vec<String>,
        #[serde(rename = "serverName")]
        server_name: String,
    },
    Reload {
        path: String,
        #[serde(rename = "liveCSS")]
        live_css: bool,
        #[serde(rename = "liveImg")]
        live_img: bool,
    },
}

impl ServerMessage {
    /// Reply to an accepted `hello`.
    pub fn handshake() -> Self {
        Self::Hello {
            protocols: vec![PROTOCOL_7.to_string()],
            server_name: SERVER_NAME.to_string(),
        }
    }

    /// Ask a browser to reload `path`; CSS and images are swapped in place.
    pub fn reload(path: impl Into<String>) -> Self {
        Self::Reload {
            path: path.into(),
            live_css: true,
            live_img: true,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"command":"reload","path":"/"}"#.to_string())
    }
}
