//! WebSocket relay endpoint

pub mod handler;
pub mod protocol;
