//! Hole Arena Server Library
//!
//! Authoritative simulation core for a session-based arena where each
//! player steers a growing hole and swallows the props it can fit.
//!
//! # Features
//!
//! - `lobby` - Join codes, rooms and the session tick driver (enabled by default)
//! - `minimal` - Build only the simulation core, for testing/debugging

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod metrics;

#[cfg(feature = "lobby")]
pub mod lobby;
