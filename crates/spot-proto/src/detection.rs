use serde::{Deserialize, Serialize};

/// Emitted exactly once per zone, the first time the tracked position comes
/// within the detection radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub ts_unix_ms: i64,
    pub zone_id: String,
    pub distance_m: f64,
    pub lat: f64,
    pub lng: f64,
    pub detected: usize,
    pub total: usize,
    pub mission_complete: bool,
}

impl DetectionEvent {
    pub fn progress(&self) -> String {
        format!("{}/{}", self.detected, self.total)
    }
}
