//! Fan-out of reload messages to registered browsers.

use std::path::{Path, PathBuf};

use super::message::ServerMessage;
use super::registry::{RegisteredClient, ReloadRegistry};
use crate::error::DevError;
use crate::serve::canonicalize_static_path;
use crate::utils::{mime, path::url_join, plural_count};
use crate::{debug, log};

pub struct ReloadBroadcaster {
    registry: ReloadRegistry,
    static_root: Option<PathBuf>,
    static_url: String,
}

impl ReloadBroadcaster {
    pub fn new(registry: ReloadRegistry, static_root: Option<PathBuf>, static_url: impl Into<String>) -> Self {
        Self {
            registry,
            static_root,
            static_url: static_url.into(),
        }
    }

    pub fn registry(&self) -> &ReloadRegistry {
        &self.registry
    }

    /// Prompt browsers to reload; returns how many were sent a message.
    ///
    /// `None` reloads every client at its own URL. A changed static file
    /// reloads every client unless it is HTML, in which case only clients
    /// showing that page are told.
    pub fn broadcast(&self, changed: Option<&Path>) -> usize {
        if self.registry.is_empty() {
            return 0;
        }

        let target = changed.and_then(|path| {
            let url = self.url_for(path);
            if url.is_none() {
                debug!("reload"; "{} is outside the static root, reloading all", path.display());
            }
            url
        });

        broadcast_to(&self.registry.snapshot(), target.as_deref())
    }

    /// Public URL of a file under the static root.
    pub fn url_for(&self, path: &Path) -> Option<String> {
        let root = self.static_root.as_deref()?;
        let relative = path.strip_prefix(root).ok()?;
        Some(url_join(&self.static_url, relative))
    }
}

/// Send to `clients` the reload for `target` (a static URL) or a full reload.
pub fn broadcast_to(clients: &[RegisteredClient], target: Option<&str>) -> usize {
    if clients.is_empty() {
        return 0;
    }

    let html_target = target.filter(|url| mime::is_html(Path::new(url)));
    debug!("reload"; "prompting source reload for {}", plural_count(clients.len(), "client"));

    let mut reloads = 0;
    for client in clients {
        if let Some(page) = html_target
            && !canonicalize_static_path(&client.url).iter().any(|c| c == page)
        {
            debug!("reload"; "skipping reload for client at {}", client.url);
            continue;
        }

        let path = target.unwrap_or(&client.url);
        let message = ServerMessage::reload(path).to_json();
        match client.sink.send_text(&message) {
            Ok(()) => reloads += 1,
            Err(source) => {
                let err = DevError::BroadcastSend {
                    url: path.to_string(),
                    source,
                };
                log!("error"; "{:#}", anyhow::Error::from(err));
            }
        }
    }

    if reloads > 0 {
        log!("reload"; "prompted reload of {} on {}", target.unwrap_or("page"), plural_count(reloads, "client"));
    }
    debug!("reload"; "reloaded {} of {}", reloads, plural_count(clients.len(), "client"));
    reloads
}
