use std::time::{Duration, Instant};

/// Link liveness. Heartbeat recency is the only input; other readings
/// succeeding does not keep the link "connected".
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub connected: bool,
    pub last_heartbeat: Option<Instant>,
}

impl ConnectionState {
    pub fn on_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
        self.connected = true;
    }

    pub fn hb_age(&self, now: Instant) -> Option<Duration> {
        self.last_heartbeat.map(|t| now.saturating_duration_since(t))
    }

    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        match self.hb_age(now) {
            Some(age) => age > stale_after,
            None => false,
        }
    }

    /// Drops `connected` once the last heartbeat is older than `stale_after`.
    /// Returns true when this call changed the state.
    pub fn refresh(&mut self, now: Instant, stale_after: Duration) -> bool {
        if self.connected && self.is_stale(now, stale_after) {
            self.connected = false;
            return true;
        }
        false
    }
}
