//! Connection hub: live outbound handles and broadcast fan-out
//!
//! Each connection registers a bounded outbound queue here; its writer task
//! drains the queue onto the socket. Fan-out uses `try_send`, so a slow or
//! backlogged client drops its own frames instead of stalling registry
//! mutations or other connections. A dropped delta is healed by the next
//! full-state resync event.

use log::warn;
use shared::ServerEvent;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Frames buffered per connection before fan-out starts dropping.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

#[derive(Debug, Default)]
pub struct Hub {
    conns: HashMap<String, mpsc::Sender<ServerEvent>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            conns: HashMap::new(),
        }
    }

    /// Registers a new connection: mints an id unused among open
    /// connections and returns it with the queue's receiving end.
    pub fn register(&mut self) -> (String, mpsc::Receiver<ServerEvent>) {
        let id = loop {
            let candidate = format!("{:08x}", rand::random::<u32>());
            if !self.conns.contains_key(&candidate) {
                break candidate;
            }
        };
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        self.conns.insert(id.clone(), tx);
        (id, rx)
    }

    /// Drops the connection's outbound handle. Safe on unknown ids.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.conns.remove(id).is_some()
    }

    /// Queues one event for one connection, fire-and-forget.
    pub fn send_to(&self, id: &str, event: ServerEvent) {
        if let Some(tx) = self.conns.get(id) {
            deliver(id, tx, event);
        }
    }

    /// Queues one event for every connection except `exclude`.
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<&str>) {
        for (id, tx) in &self.conns {
            if Some(id.as_str()) == exclude {
                continue;
            }
            deliver(id, tx, event.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

fn deliver(id: &str, tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("Outbound queue full for {}, dropping {:?}", id, event);
        }
        // Writer already gone; the read side will run disconnect cleanup.
        Err(mpsc::error::TrySendError::Closed(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_register_mints_unique_ids() {
        let mut hub = Hub::new();
        let (a, _rx_a) = hub.register();
        let (b, _rx_b) = hub.register();
        assert_ne!(a, b);
        assert_eq!(hub.len(), 2);
    }

    #[test]
    fn test_send_to_reaches_only_target() {
        let mut hub = Hub::new();
        let (a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();

        hub.send_to(&a, ServerEvent::Welcome { id: a.clone() });

        assert_eq!(drain(&mut rx_a).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let mut hub = Hub::new();
        let (a, mut rx_a) = hub.register();
        let (_b, mut rx_b) = hub.register();
        let (_c, mut rx_c) = hub.register();

        let event = ServerEvent::PlayerDisconnected("x".to_string());
        hub.broadcast(&event, Some(&a));

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![event.clone()]);
        assert_eq!(drain(&mut rx_c), vec![event]);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let mut hub = Hub::new();
        let (a, mut rx_a) = hub.register();

        for _ in 0..OUTBOUND_QUEUE_DEPTH + 10 {
            hub.send_to(&a, ServerEvent::PlayerDisconnected("x".to_string()));
        }

        // The overflow was dropped, nothing beyond the queue depth arrives.
        assert_eq!(drain(&mut rx_a).len(), OUTBOUND_QUEUE_DEPTH);
    }

    #[test]
    fn test_send_after_unregister_is_noop() {
        let mut hub = Hub::new();
        let (a, mut rx_a) = hub.register();
        assert!(hub.unregister(&a));
        assert!(!hub.unregister(&a));

        hub.send_to(&a, ServerEvent::Welcome { id: a.clone() });
        assert!(drain(&mut rx_a).is_empty());
    }
}
