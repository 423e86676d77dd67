use tracing::{info, warn};

use spot_proto::detection::DetectionEvent;

use crate::arena::LocalPoint;
use crate::detect::{DetectionState, Detector};
use crate::zones::ZoneSet;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SessionError {
    #[error("total zone count must be > 0")]
    NoZones,
    #[error("detection threshold must be a finite positive distance, got {0}")]
    BadThreshold(f64),
}

/// One safe-spot run: the latest zone set plus everything detected so far.
pub struct SafeSpotSession {
    detector: Detector,
    state: DetectionState,
    zones: ZoneSet,
    total_zones: usize,
}

impl SafeSpotSession {
    pub fn new(detector: Detector, total_zones: usize) -> Result<Self, SessionError> {
        if total_zones == 0 {
            return Err(SessionError::NoZones);
        }
        if !(detector.threshold_m.is_finite() && detector.threshold_m > 0.0) {
            return Err(SessionError::BadThreshold(detector.threshold_m));
        }
        Ok(Self { detector, state: DetectionState::default(), zones: ZoneSet::default(), total_zones })
    }

    /// Replaces arena and zones wholesale. Detection state is kept.
    pub fn update_zones(&mut self, set: ZoneSet) {
        if let Some(why) = &set.degraded {
            warn!("session: zone data degraded ({}), using fallback set", why);
        }
        if !set.arena.is_complete() {
            warn!("session: arena has {} corners, using fallback mapping", set.arena.corners().len());
        }
        self.zones = set;
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn total_zones(&self) -> usize {
        self.total_zones
    }

    pub fn is_complete(&self) -> bool {
        self.state.is_complete(self.total_zones)
    }

    /// Runs one detection sweep; each returned event fires exactly once per
    /// zone for the lifetime of the session.
    pub fn step(&mut self, position: LocalPoint, ts_unix_ms: i64) -> Vec<DetectionEvent> {
        let hits = self.detector.detect_hits(position, &self.zones.zones, &self.zones.arena, &mut self.state);
        let already = self.state.len() - hits.len();

        hits.into_iter()
            .enumerate()
            .map(|(i, hit)| {
                let detected = already + i + 1;
                let zone = self.zones.zones.iter().find(|z| z.id == hit.id);
                let ev = DetectionEvent {
                    ts_unix_ms,
                    zone_id: hit.id,
                    distance_m: hit.distance_m,
                    lat: zone.map(|z| z.lat).unwrap_or_default(),
                    lng: zone.map(|z| z.lng).unwrap_or_default(),
                    detected,
                    total: self.total_zones,
                    mission_complete: detected >= self.total_zones,
                };
                info!("session: safe spot {} detected at {:.2}m ({})", ev.zone_id, ev.distance_m, ev.progress());
                if ev.mission_complete {
                    info!("session: mission complete, all {} safe spots detected", self.total_zones);
                }
                ev
            })
            .collect()
    }

    /// Explicit session reset: forget every detection.
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
