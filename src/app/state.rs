//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::store::MemoryRelay;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Broadcast store shared by socket clients and in-process sessions
    pub relay: Arc<MemoryRelay>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let relay = Arc::new(MemoryRelay::new(config.tuning.sync.relay_capacity));
        Self {
            config: Arc::new(config),
            relay,
        }
    }
}
