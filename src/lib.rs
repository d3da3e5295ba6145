//! Lightcycle Arena simulation core
//!
//! A deterministic light-cycle arena: players lay trails, the first to touch a
//! wall or a trail is out, and AI opponents steer by sensor fans or forward
//! simulation, optionally on background worker threads.
//!
//! # Features
//!
//! - `powerups` - Powerup spawning and timed trail modifiers (enabled by default)
//! - `minimal` - Build without optional features for testing/debugging

pub mod config;
pub mod util;
pub mod game;
