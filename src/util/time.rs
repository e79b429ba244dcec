//! Time utilities for the frame simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Process start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize process start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get process uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Fixed frame cadence. Every acceleration and damping constant is tuned per frame.
pub const FRAME_RATE: u32 = 60;
pub const FRAME_DURATION_MICROS: u64 = 1_000_000 / FRAME_RATE as u64;

/// Duration of one simulation frame
pub fn frame_duration() -> Duration {
    Duration::from_micros(FRAME_DURATION_MICROS)
}

/// Convert a frame count to milliseconds at the fixed cadence
pub fn frames_to_millis(frames: u32) -> u64 {
    frames as u64 * 1000 / FRAME_RATE as u64
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
