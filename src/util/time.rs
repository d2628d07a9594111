//! Time utilities for the simulation clock

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Default simulation rate in ticks per second
pub const DEFAULT_TICK_RATE: u32 = 60;

pub const MIN_TICK_RATE: u32 = 1;
pub const MAX_TICK_RATE: u32 = 240;

/// Wall-clock length of one tick
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate.clamp(MIN_TICK_RATE, MAX_TICK_RATE) as u64)
}

/// Physics delta for one tick, in seconds
pub fn tick_delta(tick_rate: u32) -> f32 {
    1.0 / tick_rate.clamp(MIN_TICK_RATE, MAX_TICK_RATE) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_delta_matches_rate() {
        assert!((tick_delta(60) - 1.0 / 60.0).abs() < f32::EPSILON);
        assert_eq!(tick_duration(50), Duration::from_millis(20));
        // Zero would divide by zero
        assert_eq!(tick_delta(0), 1.0);
    }

    #[test]
    fn uptime_starts_after_init() {
        init_server_time();
        assert!(uptime_secs() < 5);
        assert!(unix_millis() > 0);
    }
}
