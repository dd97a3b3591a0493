//! World time.
//!
//! The server's clock is wall time in milliseconds. A client estimates it as
//! the last time-sync value plus the local time elapsed since that message
//! arrived.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn wall_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

/// Server-side world time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerClock;

impl ServerClock {
    /// Current world time.
    pub fn now(&self) -> i64 {
        wall_millis()
    }
}

/// Client-side estimate of server time.
#[derive(Debug, Clone, Copy)]
pub struct ClientClock {
    origin: Instant,
    server_time: i64,
    received_at: i64,
}

impl Default for ClientClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientClock {
    /// Unsynced clock; reads as local elapsed time until the first sync.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            server_time: 0,
            received_at: 0,
        }
    }

    /// Local monotonic milliseconds since this clock was created.
    pub fn local_millis(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }

    /// Record a time-sync value received now.
    pub fn sync(&mut self, server_time: i64) {
        let local = self.local_millis();
        self.sync_at(server_time, local);
    }

    /// Record a time-sync value received at local time `local_ms`.
    pub fn sync_at(&mut self, server_time: i64, local_ms: i64) {
        self.server_time = server_time;
        self.received_at = local_ms;
    }

    /// Estimated server time now.
    pub fn now(&self) -> i64 {
        self.now_at(self.local_millis())
    }

    /// Estimated server time at local time `local_ms`.
    pub fn now_at(&self, local_ms: i64) -> i64 {
        self.server_time + (local_ms - self.received_at)
    }

    /// Last server time received.
    pub fn last_sync(&self) -> i64 {
        self.server_time
    }
}
