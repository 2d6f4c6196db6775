//! Per-client SSE registry: tracks one outbound channel per open
//! event stream, keyed by session id, serialized under a single guard.

use axum::response::sse::Event;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::info;

pub type EventResult = Result<Event, Infallible>;

#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<FxHashMap<String, mpsc::UnboundedSender<EventResult>>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh `session_<counter>_<8 hex chars>` id, registers a
    /// channel for it, and returns the id alongside the receiving half.
    pub fn register(&self) -> (String, mpsc::UnboundedReceiver<EventResult>) {
        let counter = self.next_id.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("session_{counter}_{:08x}", rand::random::<u32>());
        let (tx, rx) = mpsc::unbounded_channel();
        let mut clients = self.clients.lock();
        clients.insert(session_id.clone(), tx);
        tracing::debug!(session_id, clients = clients.len(), "sse client connected");
        (session_id, rx)
    }

    pub fn unregister(&self, session_id: &str) {
        let mut clients = self.clients.lock();
        if clients.remove(session_id).is_some() {
            info!(session_id, clients = clients.len(), "sse client disconnected");
        }
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    /// Sends `event` to the client registered under `session_id`, if any.
    /// A send failure (receiver dropped) silently removes the client —
    /// transport errors never affect the store.
    pub fn send_to(&self, session_id: &str, event: Event) {
        let sender = self.clients.lock().get(session_id).cloned();
        let Some(sender) = sender else {
            return;
        };
        if sender.send(Ok(event)).is_err() {
            self.unregister(session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_session_id_matches_documented_form() {
        let registry = ClientRegistry::new();
        let (id, _rx) = registry.register();
        assert!(id.starts_with("session_"));
        let parts: Vec<&str> = id.splitn(3, '_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn unregister_is_a_no_op_for_unknown_session() {
        let registry = ClientRegistry::new();
        registry.unregister("session_99_deadbeef");
    }

    #[test]
    fn send_to_dropped_receiver_removes_the_client() {
        let registry = ClientRegistry::new();
        let (id, rx) = registry.register();
        drop(rx);
        registry.send_to(&id, Event::default().event("message").data("{}"));
        assert!(registry.clients.lock().get(&id).is_none());
    }
}
