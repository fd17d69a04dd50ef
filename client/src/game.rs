//! Client-side reconciliation store
//!
//! Mirrors the server's view of the world. The local player's stats are
//! server-authoritative and corrected wholesale by `updatePlayerState`
//! echoes; its transform is whatever local simulation last reported. Remote
//! entities are read-only mirrors updated exclusively by inbound events.
//!
//! The render loop and the network receive path are separate concurrency
//! domains, so the store is shared as an `Arc<Mutex<_>>` and every entity
//! update replaces the entity atomically under the lock — a reader can
//! never observe a half-applied update.

use crate::feed::KillFeed;
use log::info;
use shared::{
    KillLogEntry, PlayerState, ServerEvent, Vec3, KILL_FEED_TTL_MS, SMOOTHING_FACTOR,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

/// A remote entity: last-known authoritative state plus the smoothed
/// position actually shown on screen.
#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub state: PlayerState,
    pub display_position: Vec3,
}

impl RemotePlayer {
    fn new(state: PlayerState) -> Self {
        let display_position = state.position;
        Self {
            state,
            display_position,
        }
    }

    /// One render step of exponential approach toward the last-known
    /// server position. A fixed fraction of the remaining distance per
    /// step self-corrects regardless of update rate irregularities.
    fn smooth_step(&mut self) {
        for axis in 0..3 {
            self.display_position[axis] +=
                (self.state.position[axis] - self.display_position[axis]) * SMOOTHING_FACTOR;
        }
    }
}

#[derive(Debug)]
pub struct GameStore {
    status: ConnectionStatus,
    /// User-visible connection notice, set on failures.
    pub notice: Option<String>,
    local_id: Option<String>,
    local: Option<PlayerState>,
    remotes: HashMap<String, RemotePlayer>,
    pub feed: KillFeed,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            notice: None,
            local_id: None,
            local: None,
            remotes: HashMap::new(),
            feed: KillFeed::new(),
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Starts over on a fresh connection: the previous mirror is stale and
    /// will be rebuilt from the `currentPlayers` snapshot.
    pub fn begin_session(&mut self) {
        self.status = ConnectionStatus::Connected;
        self.notice = None;
        self.local_id = None;
        self.local = None;
        self.remotes.clear();
    }

    /// Drops into the disconnected state with a user-visible notice. The
    /// mirror is left intact for display; join-dependent actions are
    /// blocked until a new connection succeeds.
    pub fn connection_lost(&mut self, notice: &str) {
        self.status = ConnectionStatus::Disconnected;
        self.notice = Some(notice.to_string());
    }

    pub fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }

    pub fn local_player(&self) -> Option<&PlayerState> {
        self.local.as_ref()
    }

    /// True once connected and joined; gates shoot/respawn/movement.
    pub fn can_submit(&self) -> bool {
        self.status() == ConnectionStatus::Connected && self.local.is_some()
    }

    /// Local simulation owns the local transform between server echoes.
    pub fn set_local_transform(&mut self, position: Vec3, rotation: Vec3) {
        if let Some(local) = self.local.as_mut() {
            local.position = position;
            local.rotation = rotation;
        }
    }

    /// Remote mirror for the render loop, cloned so the lock is released
    /// before any drawing happens.
    pub fn remote_players(&self) -> Vec<RemotePlayer> {
        self.remotes.values().cloned().collect()
    }

    pub fn remote(&self, id: &str) -> Option<&RemotePlayer> {
        self.remotes.get(id)
    }

    /// Advances every remote's displayed position one smoothing step.
    pub fn smooth_step(&mut self) {
        for remote in self.remotes.values_mut() {
            remote.smooth_step();
        }
    }

    /// Applies one inbound server event. Returns the kill-feed entry when
    /// one was pushed so the caller can schedule its expiry.
    pub fn apply_event(&mut self, event: ServerEvent) -> Option<KillLogEntry> {
        match event {
            ServerEvent::Welcome { id } => {
                info!("Connected as {}", id);
                self.local_id = Some(id);
            }

            ServerEvent::CurrentPlayers(players) => {
                self.remotes = players
                    .into_iter()
                    .filter(|(id, _)| Some(id.as_str()) != self.local_id.as_deref())
                    .map(|(id, state)| (id, RemotePlayer::new(state)))
                    .collect();
            }

            ServerEvent::NewPlayer(state) => {
                if Some(state.id.as_str()) != self.local_id.as_deref() {
                    self.remotes
                        .insert(state.id.clone(), RemotePlayer::new(state));
                }
            }

            ServerEvent::PlayerMoved {
                id,
                position,
                rotation,
            } => {
                if let Some(remote) = self.remotes.get_mut(&id) {
                    remote.state.position = position;
                    remote.state.rotation = rotation;
                }
            }

            ServerEvent::PlayerDamaged { id, hp } => {
                if Some(id.as_str()) == self.local_id.as_deref() {
                    if let Some(local) = self.local.as_mut() {
                        local.hp = hp;
                    }
                } else if let Some(remote) = self.remotes.get_mut(&id) {
                    remote.state.hp = hp;
                }
            }

            ServerEvent::UpdatePlayerState(state) => {
                if Some(state.id.as_str()) == self.local_id.as_deref() {
                    // Full authoritative correction, position included —
                    // local simulation resumes from here.
                    self.local = Some(state);
                } else {
                    match self.remotes.get_mut(&state.id) {
                        Some(remote) => remote.state = state,
                        None => {
                            self.remotes
                                .insert(state.id.clone(), RemotePlayer::new(state));
                        }
                    }
                }
            }

            ServerEvent::KillFeed(entry) => {
                self.feed.push(entry.clone());
                return Some(entry);
            }

            ServerEvent::PlayerDisconnected(id) => {
                self.remotes.remove(&id);
            }
        }
        None
    }
}

/// Handle shared between the network task and the render loop.
#[derive(Clone, Default)]
pub struct SharedStore(Arc<Mutex<GameStore>>);

impl SharedStore {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(GameStore::new())))
    }

    pub fn lock(&self) -> MutexGuard<'_, GameStore> {
        // A poisoning panic in one domain must not take down the other.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies an inbound event and, for kill-feed entries, schedules the
    /// entry's independent one-shot expiry.
    pub fn apply_event(&self, event: ServerEvent) {
        let pushed = self.lock().apply_event(event);
        if let Some(entry) = pushed {
            self.schedule_expiry(entry.id, Duration::from_millis(KILL_FEED_TTL_MS));
        }
    }

    fn schedule_expiry(&self, entry_id: String, ttl: Duration) {
        let store = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            store.lock().feed.remove(&entry_id);
        });
    }
}
