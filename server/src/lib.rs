//! # Arena Server Library
//!
//! Authoritative server for the arena shooter's synchronization core. It
//! owns the canonical player state — health, kills, deaths, scores, and
//! client-reported transforms — and streams incremental updates to every
//! connected client over a persistent, reliable, ordered connection.
//!
//! ## Architecture
//!
//! ### One task per connection, one shared registry
//! Every accepted connection runs its own handling context. The only shared
//! mutable resource is the [`registry::Registry`] behind an `RwLock`: all
//! read-modify-write operations (damage resolution, respawn, join) take the
//! write guard, so concurrent shots against the same target can never both
//! observe pre-damage hp and double-credit a kill.
//!
//! ### Fire-and-forget broadcasts
//! Outbound fan-out goes through the [`hub::Hub`], which holds a bounded
//! queue per connection and drops frames for clients that cannot keep up.
//! A slow connection therefore never stalls the registry or its peers;
//! dropped deltas are healed by the next full-state resync event.
//!
//! ### Sessions are socket-free
//! The per-connection protocol rules live in [`session::Session`], a state
//! machine from decoded events to addressed broadcasts. The transport
//! adapter in [`network`] is the only module that touches sockets, which
//! keeps every protocol rule unit-testable.
//!
//! ## Module Organization
//!
//! - [`registry`] — entity store and the damage/respawn/score rules
//! - [`session`] — per-connection state machine and event validation
//! - [`hub`] — live connection handles and broadcast fan-out
//! - [`network`] — TCP listener, framing, reader/writer tasks

pub mod hub;
pub mod network;
pub mod registry;
pub mod session;
