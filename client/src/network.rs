//! Client network layer: connection, event pump, and send throttling
//!
//! One reader task applies every inbound frame to the shared store; one
//! writer task drains the outbound queue onto the socket. Submissions are
//! gated on the store's connection status, and movement reports are
//! rate-limited by wall-clock elapsed time so the reporting rate is
//! independent of however fast the render loop runs.

use crate::game::{ConnectionStatus, SharedStore};
use log::{debug, error, info, warn};
use shared::{ClientEvent, ServerEvent, Vec3, MOVEMENT_INTERVAL_MS};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Wall-clock throttle for local transform reports.
///
/// Frame count is useless here — at 144 fps a per-frame gate would still
/// send 144 reports a second — so the gate is elapsed time.
#[derive(Debug)]
pub struct MovementReporter {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl MovementReporter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn should_send(&mut self) -> bool {
        self.should_send_at(Instant::now())
    }

    fn should_send_at(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

/// A live connection to the arena server.
pub struct NetClient {
    store: SharedStore,
    events_tx: mpsc::Sender<ClientEvent>,
    reporter: MovementReporter,
}

impl NetClient {
    /// Connects and starts the reader/writer tasks. On failure the store
    /// gets a user-visible notice and stays disconnected; nothing else in
    /// it is touched.
    pub async fn connect(
        addr: &str,
        store: SharedStore,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Connecting to {}...", addr);
        let stream = match TcpStream::connect(addr).await {
            Ok(stream) => stream,
            Err(e) => {
                store
                    .lock()
                    .connection_lost(&format!("Could not reach server: {}", e));
                return Err(e.into());
            }
        };

        // Fresh session: the mirror is rebuilt from the snapshot.
        store.lock().begin_session();

        let (reader, writer) = stream.into_split();
        let (events_tx, events_rx) = mpsc::channel(64);
        tokio::spawn(read_loop(reader, store.clone()));
        tokio::spawn(write_loop(writer, events_rx));

        Ok(Self {
            store,
            events_tx,
            reporter: MovementReporter::new(Duration::from_millis(MOVEMENT_INTERVAL_MS)),
        })
    }

    /// Requests to join with a display name. Valid once per connection,
    /// before the join echo arrives.
    pub async fn join(&self, name: &str) -> bool {
        {
            let store = self.store.lock();
            if store.status() != ConnectionStatus::Connected || store.local_player().is_some() {
                return false;
            }
        }
        self.send(ClientEvent::JoinGame {
            name: name.to_string(),
        })
        .await
    }

    /// Records the locally simulated transform and forwards it to the
    /// server at most once per throttle interval. Returns whether a report
    /// actually went out this call.
    pub async fn report_movement(&mut self, position: Vec3, rotation: Vec3) -> bool {
        {
            let mut store = self.store.lock();
            if !store.can_submit() {
                return false;
            }
            store.set_local_transform(position, rotation);
            // The server ignores movement from the dead; skip the traffic.
            if store.local_player().map(|p| p.is_dead).unwrap_or(true) {
                return false;
            }
        }
        if !self.reporter.should_send() {
            return false;
        }
        self.send(ClientEvent::PlayerMovement { position, rotation })
            .await
    }

    pub async fn shoot(&self, target_id: &str) -> bool {
        if !self.store.lock().can_submit() {
            return false;
        }
        self.send(ClientEvent::PlayerShoot {
            target_id: target_id.to_string(),
        })
        .await
    }

    /// Asks for a respawn; only meaningful while dead.
    pub async fn request_respawn(&self) -> bool {
        {
            let store = self.store.lock();
            if !store.can_submit() || !store.local_player().map(|p| p.is_dead).unwrap_or(false) {
                return false;
            }
        }
        self.send(ClientEvent::RespawnRequest).await
    }

    async fn send(&self, event: ClientEvent) -> bool {
        if self.events_tx.send(event).await.is_err() {
            warn!("Outbound channel closed, event dropped");
            return false;
        }
        true
    }
}

/// Applies inbound frames to the store until the connection dies, then
/// surfaces the loss as a notice.
async fn read_loop(reader: OwnedReadHalf, store: SharedStore) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<ServerEvent>(&line) {
                Ok(event) => store.apply_event(event),
                Err(e) => warn!("Malformed frame from server: {}", e),
            },
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                error!("Read error: {}", e);
                break;
            }
        }
    }

    store.lock().connection_lost("Connection to server lost");
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<ClientEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(mut frame) => {
                frame.push('\n');
                if let Err(e) = writer.write_all(frame.as_bytes()).await {
                    debug!("Write failed, dropping writer: {}", e);
                    break;
                }
            }
            Err(e) => error!("Failed to serialize {:?}: {}", event, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_passes_first_report() {
        let mut reporter = MovementReporter::new(Duration::from_millis(50));
        assert!(reporter.should_send_at(Instant::now()));
    }

    #[test]
    fn test_throttle_collapses_fast_reports() {
        let mut reporter = MovementReporter::new(Duration::from_millis(50));
        let start = Instant::now();

        assert!(reporter.should_send_at(start));
        // A 120 fps render loop hammering the reporter: one report per
        // 50ms window survives.
        let mut sent = 0;
        for frame in 1..=12 {
            if reporter.should_send_at(start + Duration::from_millis(frame * 8)) {
                sent += 1;
            }
        }
        assert_eq!(sent, 1);
    }

    #[test]
    fn test_throttle_uses_elapsed_time_not_call_count() {
        let mut reporter = MovementReporter::new(Duration::from_millis(50));
        let start = Instant::now();

        assert!(reporter.should_send_at(start));
        assert!(!reporter.should_send_at(start + Duration::from_millis(49)));
        assert!(reporter.should_send_at(start + Duration::from_millis(50)));
        assert!(reporter.should_send_at(start + Duration::from_millis(250)));
    }
}
