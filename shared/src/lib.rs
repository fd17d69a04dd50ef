use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const MAX_HP: i32 = 100;
pub const SHOT_DAMAGE: i32 = 10;
pub const KILL_REWARD: u32 = 100;
pub const ARENA_EXTENT: f32 = 40.0;
pub const SPAWN_HEIGHT: f32 = 1.0;
pub const INITIAL_POSITION: [f32; 3] = [0.0, 2.0, 0.0];
pub const MAX_NAME_LEN: usize = 16;
pub const KILL_FEED_CAP: usize = 5;
pub const KILL_FEED_TTL_MS: u64 = 5_000;
pub const MOVEMENT_INTERVAL_MS: u64 = 50;
pub const SMOOTHING_FACTOR: f32 = 0.2;

pub type Vec3 = [f32; 3];

/// Authoritative per-player record. Field names are the wire contract.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: String,
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub color: String,
    pub hp: i32,
    pub max_hp: i32,
    pub is_dead: bool,
    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
}

impl PlayerState {
    /// A freshly connected player before `joinGame`: placeholder name,
    /// full health, standing at the drop-in point.
    pub fn new(id: &str, color: String) -> Self {
        Self {
            id: id.to_string(),
            name: format!("Guest-{}", id),
            position: INITIAL_POSITION,
            rotation: [0.0, 0.0, 0.0],
            color,
            hp: MAX_HP,
            max_hp: MAX_HP,
            is_dead: false,
            kills: 0,
            deaths: 0,
            score: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KillLogEntry {
    pub id: String,
    pub killer_name: String,
    pub victim_name: String,
    pub timestamp: u64,
}

/// Events a client may send. One JSON object per frame, e.g.
/// `{"event":"joinGame","data":{"name":"Raven"}}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinGame {
        name: String,
    },
    PlayerMovement {
        position: Vec3,
        rotation: Vec3,
    },
    #[serde(rename_all = "camelCase")]
    PlayerShoot {
        target_id: String,
    },
    RespawnRequest,
}

/// Events the server pushes to clients. `Welcome` is transport bootstrap
/// (it tells the client which id the server bound to its connection); the
/// rest are the broadcast catalogue.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Welcome {
        id: String,
    },
    CurrentPlayers(HashMap<String, PlayerState>),
    NewPlayer(PlayerState),
    PlayerMoved {
        id: String,
        position: Vec3,
        rotation: Vec3,
    },
    PlayerDamaged {
        id: String,
        hp: i32,
    },
    UpdatePlayerState(PlayerState),
    KillFeed(KillLogEntry),
    PlayerDisconnected(String),
}

// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
