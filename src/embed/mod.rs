//! Resources compiled into the binary.

pub mod serve {
    /// Browser side of the reload protocol.
    const LIVERELOAD_SOURCE: &str = include_str!("serve/livereload.js");
    const WS_PORT_PLACEHOLDER: &str = "__DEVLOOP_WS_PORT__";

    /// Tag appended to served HTML pages.
    pub const LIVERELOAD_TAG: &str = "<script src=\"/livereload.js\"></script>\n";

    /// The client script, pointed at the WebSocket server on `ws_port`.
    pub fn livereload_js(ws_port: u16) -> String {
        LIVERELOAD_SOURCE.replace(WS_PORT_PLACEHOLDER, &ws_port.to_string())
    }
}
