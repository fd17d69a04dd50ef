//! Server transport layer: TCP accept loop, per-connection tasks, framing
//!
//! The wire format is newline-delimited JSON: one object per line, one line
//! per event. TCP supplies the reliable ordered channel; everything above
//! the framing (sessions, registry, hub) is transport-agnostic, so any
//! other ordered transport could replace this module.
//!
//! Each accepted connection gets two tasks: a reader driving the session
//! state machine and a writer draining the connection's bounded outbound
//! queue. Broadcast fan-out happens while the registry write guard is still
//! held and never awaits, so broadcasts are queued in exactly the order the
//! corresponding registry mutations completed.

use crate::hub::Hub;
use crate::registry::Registry;
use crate::session::{Outbound, Recipients, Session};
use log::{debug, error, info, warn};
use shared::{ClientEvent, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};

/// Main server owning the listener and the shared state both halves of
/// every connection task operate on.
pub struct Server {
    listener: TcpListener,
    registry: Arc<RwLock<Registry>>,
    hub: Arc<RwLock<Hub>>,
}

impl Server {
    pub async fn new(addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: Arc::new(RwLock::new(Registry::new())),
            hub: Arc::new(RwLock::new(Hub::new())),
        })
    }

    /// The actually bound address, for callers that asked for port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop: one independent handling context per connection.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let registry = Arc::clone(&self.registry);
            let hub = Arc::clone(&self.hub);
            tokio::spawn(async move {
                handle_connection(stream, addr, registry, hub).await;
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<RwLock<Registry>>,
    hub: Arc<RwLock<Hub>>,
) {
    let (reader, writer) = stream.into_split();

    // Bootstrap under both guards: the queue is minted and filled with
    // welcome + snapshot before any other task can broadcast into it, so
    // the client's first frames are always its identity and the snapshot,
    // and no racing join can interleave between snapshot and announcement.
    let (id, outbound_rx) = {
        let mut reg = registry.write().await;
        let mut hub_guard = hub.write().await;
        let (id, outbound_rx) = hub_guard.register();
        let entity = reg.create(&id);
        hub_guard.send_to(&id, ServerEvent::Welcome { id: id.clone() });
        hub_guard.send_to(&id, ServerEvent::CurrentPlayers(reg.snapshot()));
        hub_guard.broadcast(&ServerEvent::NewPlayer(entity), Some(&id));
        (id, outbound_rx)
    };
    info!("Client {} connected from {}", id, addr);
    tokio::spawn(write_loop(writer, outbound_rx));

    let mut session = Session::new(id.clone());
    session.mark_awaiting_join();

    read_loop(reader, &mut session, &registry, &hub).await;

    // Exactly-once cleanup: deregister the connection, then announce the
    // removal to whoever is left.
    {
        let mut reg = registry.write().await;
        let removal = session.disconnect(&mut reg);
        let mut hub_guard = hub.write().await;
        hub_guard.unregister(&id);
        if let Some(out) = removal {
            dispatch(&hub_guard, &id, vec![out]);
        }
    }
    info!("Client {} disconnected", id);
}

/// Drives the session until the connection dies. A malformed frame is a
/// transport failure and terminates this session only.
async fn read_loop(
    reader: OwnedReadHalf,
    session: &mut Session,
    registry: &Arc<RwLock<Registry>>,
    hub: &Arc<RwLock<Hub>>,
) {
    let mut lines = BufReader::new(reader).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ClientEvent>(&line) {
                    Ok(event) => {
                        // Fan-out happens under the registry guard and
                        // never awaits: broadcast order is mutation order.
                        let mut reg = registry.write().await;
                        let outbounds = session.handle_event(event, &mut reg);
                        if !outbounds.is_empty() {
                            let hub_guard = hub.read().await;
                            dispatch(&hub_guard, session.id(), outbounds);
                        }
                    }
                    Err(e) => {
                        warn!("Malformed frame from {}: {}", session.id(), e);
                        break;
                    }
                }
            }
            Ok(None) => {
                debug!("Client {} closed the connection", session.id());
                break;
            }
            Err(e) => {
                warn!("Read error from {}: {}", session.id(), e);
                break;
            }
        }
    }
}

/// Drains one connection's outbound queue onto its socket. Ends when the
/// hub drops the sending side or the peer stops accepting writes.
async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<ServerEvent>) {
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

/// Routes a session's outbound list through the hub.
fn dispatch(hub: &Hub, sender_id: &str, outbounds: Vec<Outbound>) {
    for out in outbounds {
        match out.to {
            Recipients::All => hub.broadcast(&out.event, None),
            Recipients::Others => hub.broadcast(&out.event, Some(sender_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Outbound;

    #[test]
    fn test_dispatch_respects_recipients() {
        let mut hub = Hub::new();
        let (sender, mut rx_sender) = hub.register();
        let (_peer, mut rx_peer) = hub.register();

        let directed = Outbound {
            to: Recipients::Others,
            event: ServerEvent::PlayerDisconnected("x".to_string()),
        };
        let global = Outbound {
            to: Recipients::All,
            event: ServerEvent::PlayerDamaged {
                id: "x".to_string(),
                hp: 90,
            },
        };
        dispatch(&hub, &sender, vec![directed, global]);

        // Sender sees only the All event, the peer sees both, in order.
        assert_eq!(
            rx_sender.try_recv().unwrap(),
            ServerEvent::PlayerDamaged {
                id: "x".to_string(),
                hp: 90,
            }
        );
        assert!(rx_sender.try_recv().is_err());
        assert_eq!(
            rx_peer.try_recv().unwrap(),
            ServerEvent::PlayerDisconnected("x".to_string())
        );
        assert_eq!(
            rx_peer.try_recv().unwrap(),
            ServerEvent::PlayerDamaged {
                id: "x".to_string(),
                hp: 90,
            }
        );
    }

    #[test]
    fn test_frames_are_single_lines() {
        let event = ServerEvent::Welcome {
            id: "abc".to_string(),
        };
        let frame = serde_json::to_string(&event).unwrap();
        assert!(!frame.contains('\n'));
    }
}
