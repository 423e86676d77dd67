pub mod doctor;
pub mod health;
pub mod ingest;
pub mod poller;
pub mod readings;
pub mod sources;
pub mod state;

use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_POLL_MS: u64 = 1000;
pub const DEFAULT_STALE_MS: u64 = 5000;
/// Free-memory value treated as "0% used" by the memory usage formula.
pub const DEFAULT_MEM_REFERENCE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Directory the MAVLink listener writes `<MESSAGE>.json` files into,
    /// e.g. "public/params".
    pub params_dir: String,

    /// Snapshot poll period. Default 1000 ms.
    pub poll_ms: Option<u64>,

    /// Heartbeat age after which the link is reported disconnected.
    /// Default 5000 ms.
    pub stale_ms: Option<u64>,

    /// Reference for the memory usage percentage (MEMINFO free bytes that
    /// would mean an idle system).
    pub mem_reference: Option<f64>,
}

impl TelemetryConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_ms.unwrap_or(DEFAULT_POLL_MS))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_ms.unwrap_or(DEFAULT_STALE_MS))
    }

    pub fn ingest_config(&self) -> ingest::IngestConfig {
        ingest::IngestConfig {
            stale_after: self.stale_after(),
            mem_reference: self.mem_reference.unwrap_or(DEFAULT_MEM_REFERENCE),
        }
    }
}
