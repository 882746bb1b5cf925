//! Browser live reload over the LiveReload protocol 7.
//!
//! ```text
//! ProtocolServer ──register/unregister──▶ ReloadRegistry ◀──snapshot── ReloadBroadcaster
//!   (threads)                              (shared handle)               (watch loop)
//! ```

mod broadcast;
mod connection;
pub mod message;
mod registry;
mod server;

pub use broadcast::ReloadBroadcaster;
pub use connection::{ConnectionSettings, WS_PATH};
pub use registry::{ReloadRegistry, SendError};
pub use server::ProtocolServer;

#[cfg(test)]
pub(crate) use registry::testing;
