//! Authoritative entity registry for the arena server
//!
//! This module is the single source of truth for player state, including:
//! - Entity lifecycle (creation on connect, activation on join, removal on
//!   disconnect)
//! - Health, death, and respawn bookkeeping
//! - Kill, death, and score counters
//! - The snapshot handed to newly connected clients
//!
//! The registry itself is a plain synchronous structure. Connection sessions
//! share it behind a single `Arc<RwLock<Registry>>`; every read-modify-write
//! runs under the write guard, which serializes all mutations and keeps the
//! two-sided damage update (target hp/deaths, shooter kills/score) atomic
//! with respect to snapshot readers.

use log::info;
use rand::Rng;
use shared::{
    PlayerState, Vec3, ARENA_EXTENT, KILL_REWARD, MAX_NAME_LEN, SPAWN_HEIGHT,
};
use std::collections::HashMap;

/// Outcome of a resolved `apply_damage` call.
///
/// Carries the post-mutation clones of both parties so the caller can
/// broadcast full-state resyncs without re-reading the registry.
#[derive(Debug, Clone)]
pub struct DamageOutcome {
    /// Target hp after the hit, floored at zero.
    pub target_hp: i32,
    /// True exactly once per life: the hit that crossed hp to zero.
    pub died: bool,
    pub shooter: PlayerState,
    pub target: PlayerState,
}

#[derive(Debug)]
struct Slot {
    state: PlayerState,
    /// Set on `joinGame`; only active entities appear in snapshots.
    active: bool,
}

/// All entities currently owned by the server, keyed by connection id.
#[derive(Debug, Default)]
pub struct Registry {
    slots: HashMap<String, Slot>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Creates the default entity for a newly established connection.
    ///
    /// The id is assigned by the connection layer and is unique among open
    /// connections. The entity starts inactive with a placeholder name and
    /// a randomly derived, thereafter immutable color.
    pub fn create(&mut self, id: &str) -> PlayerState {
        let mut rng = rand::thread_rng();
        let color = format!("hsl({}, 100%, 50%)", rng.gen_range(0..360));
        let state = PlayerState::new(id, color);

        info!("Created entity {} ({})", id, state.name);
        self.slots.insert(
            id.to_string(),
            Slot {
                state: state.clone(),
                active: false,
            },
        );
        state
    }

    pub fn get(&self, id: &str) -> Option<&PlayerState> {
        self.slots.get(id).map(|slot| &slot.state)
    }

    /// Promotes an entity to active on `joinGame`.
    ///
    /// Sets the display name (trimmed and capped at `MAX_NAME_LEN` chars,
    /// keeping the placeholder if the submission is empty), restores full
    /// health, and makes the entity visible in snapshots. Returns the
    /// activated state, or None if the id is unknown or already active —
    /// the name is mutable exactly once per join.
    pub fn activate(&mut self, id: &str, name: &str) -> Option<PlayerState> {
        let slot = self.slots.get_mut(id)?;
        if slot.active {
            return None;
        }

        let trimmed: String = name.trim().chars().take(MAX_NAME_LEN).collect();
        if !trimmed.is_empty() {
            slot.state.name = trimmed;
        }
        slot.state.hp = slot.state.max_hp;
        slot.state.is_dead = false;
        slot.active = true;

        info!("Entity {} joined as {:?}", id, slot.state.name);
        Some(slot.state.clone())
    }

    /// Applies a client-reported transform. The report is trusted as-is;
    /// returns false (no-op) if the entity is unknown or dead.
    pub fn apply_movement(&mut self, id: &str, position: Vec3, rotation: Vec3) -> bool {
        match self.slots.get_mut(id) {
            Some(slot) if !slot.state.is_dead => {
                slot.state.position = position;
                slot.state.rotation = rotation;
                true
            }
            _ => false,
        }
    }

    /// Resolves one hit of `amount` from shooter against target.
    ///
    /// No-op (None) if either party is unknown or the target is already
    /// dead, which makes over-kill idempotent: only the call that crosses
    /// hp to zero marks the death, increments the target's deaths, and
    /// credits the shooter with a kill and `KILL_REWARD` score.
    pub fn apply_damage(
        &mut self,
        shooter_id: &str,
        target_id: &str,
        amount: i32,
    ) -> Option<DamageOutcome> {
        if !self.slots.contains_key(shooter_id) {
            return None;
        }

        let target = self.slots.get_mut(target_id)?;
        if target.state.is_dead {
            return None;
        }

        target.state.hp = (target.state.hp - amount).max(0);
        let died = target.state.hp == 0;
        if died {
            target.state.is_dead = true;
            target.state.deaths += 1;
        }
        let target_hp = target.state.hp;

        if died {
            // Separate borrow: shooter and target may be the same entity.
            if let Some(shooter) = self.slots.get_mut(shooter_id) {
                shooter.state.kills += 1;
                shooter.state.score += KILL_REWARD;
            }
            info!("Entity {} killed {}", shooter_id, target_id);
        }

        let shooter = self.slots.get(shooter_id)?.state.clone();
        let target = self.slots.get(target_id)?.state.clone();
        Some(DamageOutcome {
            target_hp,
            died,
            shooter,
            target,
        })
    }

    /// Brings a dead entity back at a fresh random spawn point with full
    /// health. No-op (None) if the id is unknown or the entity is alive,
    /// so a raced double request cannot reset a living player.
    pub fn respawn(&mut self, id: &str) -> Option<PlayerState> {
        let slot = self.slots.get_mut(id)?;
        if !slot.state.is_dead {
            return None;
        }

        slot.state.hp = slot.state.max_hp;
        slot.state.is_dead = false;
        slot.state.position = random_spawn();

        info!("Entity {} respawned at {:?}", id, slot.state.position);
        Some(slot.state.clone())
    }

    /// Deletes the entry. Safe to call on unknown ids; returns the removed
    /// state so the caller can decide whether a removal broadcast is due.
    pub fn remove(&mut self, id: &str) -> Option<PlayerState> {
        let removed = self.slots.remove(id).map(|slot| slot.state);
        if removed.is_some() {
            info!("Removed entity {}", id);
        }
        removed
    }

    /// Full-state snapshot of all active entities, for `currentPlayers`.
    pub fn snapshot(&self) -> HashMap<String, PlayerState> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.active)
            .map(|(id, slot)| (id.clone(), slot.state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Uniform random point on the arena floor, inside the ±EXTENT/2 square.
fn random_spawn() -> Vec3 {
    let mut rng = rand::thread_rng();
    [
        (rng.gen::<f32>() - 0.5) * ARENA_EXTENT,
        SPAWN_HEIGHT,
        (rng.gen::<f32>() - 0.5) * ARENA_EXTENT,
    ]
}
