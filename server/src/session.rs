//! Per-connection session state machine
//!
//! A session owns exactly one registry entry and translates the inbound
//! event stream into registry mutations plus a list of addressed outbound
//! broadcasts. It is deliberately socket-free: the transport layer feeds it
//! decoded events and dispatches whatever it returns, which keeps the whole
//! protocol rule set unit-testable.
//!
//! Phases: `Connecting → AwaitingJoin → Active → Disconnected` (terminal).
//! Events arriving outside their valid phase are dropped silently — clients
//! may legitimately race a state transition, so this is not an error.

use crate::registry::Registry;
use log::debug;
use shared::{now_millis, ClientEvent, KillLogEntry, ServerEvent, SHOT_DAMAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    AwaitingJoin,
    Active,
    Disconnected,
}

/// Who a broadcast is addressed to, relative to the session that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    All,
    Others,
}

#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipients,
    pub event: ServerEvent,
}

impl Outbound {
    fn all(event: ServerEvent) -> Self {
        Self {
            to: Recipients::All,
            event,
        }
    }

    fn others(event: ServerEvent) -> Self {
        Self {
            to: Recipients::Others,
            event,
        }
    }
}

pub struct Session {
    id: String,
    phase: Phase,
}

impl Session {
    pub fn new(id: String) -> Self {
        Self {
            id,
            phase: Phase::Connecting,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Called once the transport bootstrap (welcome + snapshot) is done.
    pub fn mark_awaiting_join(&mut self) {
        if self.phase == Phase::Connecting {
            self.phase = Phase::AwaitingJoin;
        }
    }

    /// Applies one inbound event and returns the broadcasts it caused.
    pub fn handle_event(&mut self, event: ClientEvent, registry: &mut Registry) -> Vec<Outbound> {
        match event {
            ClientEvent::JoinGame { name } => {
                if self.phase != Phase::AwaitingJoin {
                    debug!("Dropping joinGame from {} in {:?}", self.id, self.phase);
                    return Vec::new();
                }
                match registry.activate(&self.id, &name) {
                    Some(state) => {
                        self.phase = Phase::Active;
                        vec![Outbound::all(ServerEvent::UpdatePlayerState(state))]
                    }
                    None => Vec::new(),
                }
            }

            ClientEvent::PlayerMovement { position, rotation } => {
                if self.phase != Phase::Active {
                    debug!("Dropping movement from {} in {:?}", self.id, self.phase);
                    return Vec::new();
                }
                if registry.apply_movement(&self.id, position, rotation) {
                    vec![Outbound::others(ServerEvent::PlayerMoved {
                        id: self.id.clone(),
                        position,
                        rotation,
                    })]
                } else {
                    Vec::new()
                }
            }

            ClientEvent::PlayerShoot { target_id } => {
                if self.phase != Phase::Active {
                    debug!("Dropping shot from {} in {:?}", self.id, self.phase);
                    return Vec::new();
                }
                match registry.apply_damage(&self.id, &target_id, SHOT_DAMAGE) {
                    Some(outcome) => {
                        let mut out = vec![Outbound::all(ServerEvent::PlayerDamaged {
                            id: target_id,
                            hp: outcome.target_hp,
                        })];
                        if outcome.died {
                            let entry = KillLogEntry {
                                id: format!("kill-{:08x}", rand::random::<u32>()),
                                killer_name: outcome.shooter.name.clone(),
                                victim_name: outcome.target.name.clone(),
                                timestamp: now_millis(),
                            };
                            out.push(Outbound::all(ServerEvent::UpdatePlayerState(
                                outcome.target,
                            )));
                            out.push(Outbound::all(ServerEvent::UpdatePlayerState(
                                outcome.shooter,
                            )));
                            out.push(Outbound::all(ServerEvent::KillFeed(entry)));
                        }
                        out
                    }
                    None => Vec::new(),
                }
            }

            ClientEvent::RespawnRequest => {
                if self.phase != Phase::Active {
                    debug!("Dropping respawn from {} in {:?}", self.id, self.phase);
                    return Vec::new();
                }
                match registry.respawn(&self.id) {
                    Some(state) => vec![Outbound::all(ServerEvent::UpdatePlayerState(state))],
                    None => Vec::new(),
                }
            }
        }
    }

    /// Terminal transition: deregisters the entity and yields the removal
    /// broadcast. Idempotent — only the first call produces anything, so
    /// racing close signals cannot announce the removal twice.
    pub fn disconnect(&mut self, registry: &mut Registry) -> Option<Outbound> {
        if self.phase == Phase::Disconnected {
            return None;
        }
        self.phase = Phase::Disconnected;
        registry
            .remove(&self.id)
            .map(|_| Outbound::all(ServerEvent::PlayerDisconnected(self.id.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MAX_HP, SHOT_DAMAGE};

    fn joined_session(id: &str, name: &str, registry: &mut Registry) -> Session {
        let mut session = Session::new(id.to_string());
        registry.create(id);
        session.mark_awaiting_join();
        let out = session.handle_event(
            ClientEvent::JoinGame {
                name: name.to_string(),
            },
            registry,
        );
        assert_eq!(out.len(), 1);
        session
    }

    fn shoot(session: &mut Session, target: &str, registry: &mut Registry) -> Vec<Outbound> {
        session.handle_event(
            ClientEvent::PlayerShoot {
                target_id: target.to_string(),
            },
            registry,
        )
    }

    #[test]
    fn test_join_echoes_full_state() {
        let mut registry = Registry::new();
        let mut session = Session::new("a".to_string());
        registry.create("a");
        session.mark_awaiting_join();

        let out = session.handle_event(
            ClientEvent::JoinGame {
                name: "Raven".to_string(),
            },
            &mut registry,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipients::All);
        match &out[0].event {
            ServerEvent::UpdatePlayerState(state) => {
                assert_eq!(state.name, "Raven");
                assert_eq!(state.hp, MAX_HP);
                assert!(!state.is_dead);
            }
            other => panic!("Unexpected event {:?}", other),
        }
        assert_eq!(session.phase(), Phase::Active);
    }

    #[test]
    fn test_events_before_join_are_dropped() {
        let mut registry = Registry::new();
        let mut session = Session::new("a".to_string());
        registry.create("a");
        session.mark_awaiting_join();

        let out = session.handle_event(
            ClientEvent::PlayerMovement {
                position: [1.0, 1.0, 1.0],
                rotation: [0.0, 0.0, 0.0],
            },
            &mut registry,
        );
        assert!(out.is_empty());
        assert_eq!(session.phase(), Phase::AwaitingJoin);

        let out = session.handle_event(ClientEvent::RespawnRequest, &mut registry);
        assert!(out.is_empty());
    }

    #[test]
    fn test_double_join_is_dropped() {
        let mut registry = Registry::new();
        let mut session = joined_session("a", "Raven", &mut registry);

        let out = session.handle_event(
            ClientEvent::JoinGame {
                name: "Impostor".to_string(),
            },
            &mut registry,
        );
        assert!(out.is_empty());
        assert_eq!(registry.get("a").unwrap().name, "Raven");
    }

    #[test]
    fn test_movement_goes_to_others_only() {
        let mut registry = Registry::new();
        let mut session = joined_session("a", "Raven", &mut registry);

        let out = session.handle_event(
            ClientEvent::PlayerMovement {
                position: [4.0, 1.0, 4.0],
                rotation: [0.0, 1.5, 0.0],
            },
            &mut registry,
        );

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipients::Others);
        assert_eq!(
            out[0].event,
            ServerEvent::PlayerMoved {
                id: "a".to_string(),
                position: [4.0, 1.0, 4.0],
                rotation: [0.0, 1.5, 0.0],
            }
        );
    }

    #[test]
    fn test_shot_broadcasts_damage_to_everyone() {
        let mut registry = Registry::new();
        let mut shooter = joined_session("a", "Raven", &mut registry);
        let _target = joined_session("b", "Crow", &mut registry);

        let out = shoot(&mut shooter, "b", &mut registry);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].to, Recipients::All);
        assert_eq!(
            out[0].event,
            ServerEvent::PlayerDamaged {
                id: "b".to_string(),
                hp: MAX_HP - SHOT_DAMAGE,
            }
        );
    }

    #[test]
    fn test_kill_emits_resyncs_and_feed_entry() {
        let mut registry = Registry::new();
        let mut shooter = joined_session("a", "Raven", &mut registry);
        let _target = joined_session("b", "Crow", &mut registry);

        let lethal_shots = (MAX_HP / SHOT_DAMAGE) as usize;
        for _ in 0..lethal_shots - 1 {
            assert_eq!(shoot(&mut shooter, "b", &mut registry).len(), 1);
        }

        let out = shoot(&mut shooter, "b", &mut registry);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|o| o.to == Recipients::All));
        assert_eq!(
            out[0].event,
            ServerEvent::PlayerDamaged {
                id: "b".to_string(),
                hp: 0,
            }
        );
        match &out[1].event {
            ServerEvent::UpdatePlayerState(state) => {
                assert_eq!(state.id, "b");
                assert!(state.is_dead);
                assert_eq!(state.deaths, 1);
            }
            other => panic!("Unexpected event {:?}", other),
        }
        match &out[2].event {
            ServerEvent::UpdatePlayerState(state) => {
                assert_eq!(state.id, "a");
                assert_eq!(state.kills, 1);
                assert_eq!(state.score, 100);
            }
            other => panic!("Unexpected event {:?}", other),
        }
        match &out[3].event {
            ServerEvent::KillFeed(entry) => {
                assert_eq!(entry.killer_name, "Raven");
                assert_eq!(entry.victim_name, "Crow");
                assert!(entry.timestamp > 0);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        // Shooting the corpse again produces nothing.
        assert!(shoot(&mut shooter, "b", &mut registry).is_empty());
    }

    #[test]
    fn test_shot_at_unknown_target_is_dropped() {
        let mut registry = Registry::new();
        let mut session = joined_session("a", "Raven", &mut registry);
        assert!(shoot(&mut session, "ghost", &mut registry).is_empty());
    }

    #[test]
    fn test_respawn_broadcasts_new_state() {
        let mut registry = Registry::new();
        let mut shooter = joined_session("a", "Raven", &mut registry);
        let mut target = joined_session("b", "Crow", &mut registry);

        for _ in 0..(MAX_HP / SHOT_DAMAGE) {
            shoot(&mut shooter, "b", &mut registry);
        }
        assert!(registry.get("b").unwrap().is_dead);

        let out = target.handle_event(ClientEvent::RespawnRequest, &mut registry);
        assert_eq!(out.len(), 1);
        match &out[0].event {
            ServerEvent::UpdatePlayerState(state) => {
                assert_eq!(state.hp, MAX_HP);
                assert!(!state.is_dead);
            }
            other => panic!("Unexpected event {:?}", other),
        }

        // Respawning while alive is silently dropped.
        let out = target.handle_event(ClientEvent::RespawnRequest, &mut registry);
        assert!(out.is_empty());
    }

    #[test]
    fn test_disconnect_announces_exactly_once() {
        let mut registry = Registry::new();
        let mut session = joined_session("a", "Raven", &mut registry);

        let out = session.disconnect(&mut registry).unwrap();
        assert_eq!(
            out.event,
            ServerEvent::PlayerDisconnected("a".to_string())
        );
        assert!(registry.get("a").is_none());

        // Concurrent close signals collapse into the first transition.
        assert!(session.disconnect(&mut registry).is_none());
        assert_eq!(session.phase(), Phase::Disconnected);
    }

    #[test]
    fn test_no_events_after_disconnect() {
        let mut registry = Registry::new();
        let mut session = joined_session("a", "Raven", &mut registry);
        session.disconnect(&mut registry);

        let out = session.handle_event(
            ClientEvent::PlayerMovement {
                position: [0.0, 0.0, 0.0],
                rotation: [0.0, 0.0, 0.0],
            },
            &mut registry,
        );
        assert!(out.is_empty());
    }
}
