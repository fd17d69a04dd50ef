//! # Arena Client Library
//!
//! Client-side half of the synchronization core: it mirrors remote players
//! from the server's broadcast stream and feeds local intents back up. The
//! rendering, input, and UI layers are external collaborators — they read
//! the store's snapshot every frame and call into the network client; this
//! crate owns no presentation.
//!
//! ## Reconciliation
//! Remote entities are read-only mirrors updated exclusively by inbound
//! events; the local player's stats are corrected by server echoes while
//! its transform stays locally simulated. See [`game::GameStore`].
//!
//! ## Smoothing
//! Displayed remote positions approach the last-known server position by a
//! fixed fraction per render step. The exponential approach self-corrects
//! under irregular update rates, trading a little positional lag for
//! motion that never snaps.
//!
//! ## Throttling
//! Transform reports to the server are rate-limited by wall-clock elapsed
//! time (not frame count), so bandwidth stays bounded whatever the render
//! frame rate does. See [`network::MovementReporter`].
//!
//! ## Module Organization
//!
//! - [`game`] — reconciliation store shared between network and render
//! - [`feed`] — self-expiring kill notification log
//! - [`network`] — connection, event pump, submission gating

pub mod feed;
pub mod game;
pub mod network;
