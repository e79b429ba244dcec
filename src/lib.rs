//! Skyduel - multiplayer flight-combat simulation core
//!
//! Each client flies one airplane in a fixed 60 Hz frame loop and shares
//! its pose and combat events through a broadcast key-value store. The
//! crate also ships that store as an in-memory relay behind a WebSocket
//! endpoint, plus headless bot pilots.

pub mod app;
pub mod bot;
pub mod config;
pub mod game;
pub mod http;
pub mod store;
pub mod sync;
pub mod util;
pub mod ws;
