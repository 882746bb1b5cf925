//! Connected browsers that announced their page URL.

use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use thiserror::Error;

pub type ClientId = u64;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("connection is closing")]
    Closing,
    #[error(transparent)]
    Socket(#[from] tungstenite::Error),
}

/// Outbound half of a browser connection.
pub trait ClientSink: Send + Sync {
    fn send_text(&self, text: &str) -> Result<(), SendError>;

    /// Start a close handshake. Must not block on the peer.
    fn close(&self);
}

/// Point-in-time copy of one registry entry.
#[derive(Clone)]
pub struct RegisteredClient {
    pub id: ClientId,
    pub sink: Arc<dyn ClientSink>,
    pub url: String,
}

struct Entry {
    sink: Arc<dyn ClientSink>,
    url: String,
}

/// Shared between the protocol server (writers) and the broadcaster (reader).
///
/// Cloning shares the same registry. Every mutation is idempotent: a
/// connection appears at most once, and removing an unknown id is a no-op.
#[derive(Clone, Default)]
pub struct ReloadRegistry {
    clients: Arc<Mutex<FxHashMap<ClientId, Entry>>>,
}

impl ReloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client, or update its URL if already present.
    ///
    /// Returns `true` when the client was not registered before.
    pub fn register(&self, id: ClientId, sink: Arc<dyn ClientSink>, url: impl Into<String>) -> bool {
        let url = url.into();
        let mut clients = self.clients.lock();
        match clients.get_mut(&id) {
            Some(entry) => {
                entry.url = url;
                false
            }
            None => {
                clients.insert(id, Entry { sink, url });
                true
            }
        }
    }

    /// Returns `false` if `id` is not registered.
    pub fn update_url(&self, id: ClientId, url: impl Into<String>) -> bool {
        match self.clients.lock().get_mut(&id) {
            Some(entry) => {
                entry.url = url.into();
                true
            }
            None => false,
        }
    }

    pub fn unregister(&self, id: ClientId) -> bool {
        self.clients.lock().remove(&id).is_some()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    pub fn url_of(&self, id: ClientId) -> Option<String> {
        self.clients.lock().get(&id).map(|entry| entry.url.clone())
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Copy out the current clients so sends happen outside the lock.
    pub fn snapshot(&self) -> Vec<RegisteredClient> {
        let clients = self.clients.lock();
        let mut snapshot: Vec<_> = clients
            .iter()
            .map(|(&id, entry)| RegisteredClient {
                id,
                sink: Arc::clone(&entry.sink),
                url: entry.url.clone(),
            })
            .collect();
        snapshot.sort_by_key(|client| client.id);
        snapshot
    }

    /// Remove every client and close them concurrently.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Entry> = self.clients.lock().drain().map(|(_, entry)| entry).collect();
        crate::debug!("reload"; "closing {} websockets...", drained.len());
        drained.par_iter().for_each(|entry| entry.sink.close());
        drained.len()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeSink;
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let registry = ReloadRegistry::new();
        let sink = Arc::new(FakeSink::default());

        assert!(registry.register(1, sink.clone(), "/"));
        assert!(!registry.register(1, sink, "/about"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.url_of(1).as_deref(), Some("/about"));
    }

    #[test]
    fn test_update_and_unregister() {
        let registry = ReloadRegistry::new();
        assert!(!registry.update_url(7, "/nowhere"));

        registry.register(7, Arc::new(FakeSink::default()), "/");
        assert!(registry.update_url(7, "/blog"));
        assert_eq!(registry.url_of(7).as_deref(), Some("/blog"));

        assert!(registry.unregister(7));
        assert!(!registry.unregister(7));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = ReloadRegistry::new();
        let other = registry.clone();
        other.register(3, Arc::new(FakeSink::default()), "/");
        assert!(registry.contains(3));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = ReloadRegistry::new();
        registry.register(2, Arc::new(FakeSink::default()), "/b");
        registry.register(1, Arc::new(FakeSink::default()), "/a");

        let snapshot = registry.snapshot();
        registry.unregister(1);

        let urls: Vec<_> = snapshot.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, ["/a", "/b"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_close_all() {
        let registry = ReloadRegistry::new();
        let sinks: Vec<_> = (0..4).map(|_| Arc::new(FakeSink::default())).collect();
        for (id, sink) in sinks.iter().enumerate() {
            registry.register(id as ClientId, sink.clone(), "/");
        }

        assert_eq!(registry.close_all(), 4);
        assert!(registry.is_empty());
        assert!(sinks.iter().all(|sink| *sink.closed.lock()));
    }
}
