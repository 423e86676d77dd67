use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::arena::{to_local_frame, ArenaFrame, FieldDims, GeoPoint, LocalPoint};

pub const DEFAULT_THRESHOLD_M: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
}

impl SafeZone {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self { id: id.into(), lat, lng }
    }

    pub fn geo(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }
}

/// Zone ids detected so far, in detection order. Membership is monotonic:
/// only `reset` removes ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionState {
    detected: Vec<String>,
}

impl DetectionState {
    pub fn contains(&self, id: &str) -> bool {
        self.detected.iter().any(|d| d == id)
    }

    /// Returns false when `id` was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.detected.push(id.to_string());
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.detected
    }

    pub fn len(&self) -> usize {
        self.detected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detected.is_empty()
    }

    /// Mission complete once every configured zone has been seen.
    pub fn is_complete(&self, total_zones: usize) -> bool {
        total_zones > 0 && self.detected.len() >= total_zones
    }

    pub fn reset(&mut self) {
        self.detected.clear();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneHit {
    pub id: String,
    pub distance_m: f64,
    pub zone: LocalPoint,
}

/// Flags first-time entry into circular zones around points of interest.
/// Stateless itself; the caller owns the `DetectionState`.
#[derive(Debug, Clone)]
pub struct Detector {
    pub threshold_m: f64,
    pub field: FieldDims,
}

impl Default for Detector {
    fn default() -> Self {
        Self { threshold_m: DEFAULT_THRESHOLD_M, field: FieldDims::default() }
    }
}

impl Detector {
    pub fn new(threshold_m: f64, field: FieldDims) -> Self {
        Self { threshold_m, field }
    }

    /// Ids of zones entered for the first time, in `zones` order.
    pub fn detect(
        &self,
        current: LocalPoint,
        zones: &[SafeZone],
        arena: &ArenaFrame,
        state: &mut DetectionState,
    ) -> Vec<String> {
        self.detect_hits(current, zones, arena, state).into_iter().map(|h| h.id).collect()
    }

    /// Same as `detect`, with distances and local zone positions.
    pub fn detect_hits(
        &self,
        current: LocalPoint,
        zones: &[SafeZone],
        arena: &ArenaFrame,
        state: &mut DetectionState,
    ) -> Vec<ZoneHit> {
        let mut hits = Vec::new();
        if !current.is_finite() {
            return hits;
        }
        for zone in zones {
            if state.contains(&zone.id) {
                continue;
            }
            if !zone.geo().is_finite() {
                warn!("detect: zone {} has non-finite coordinates, skipped", zone.id);
                continue;
            }
            let local = to_local_frame(zone.geo(), arena, self.field);
            let distance_m = current.distance_to(&local);
            if distance_m <= self.threshold_m && state.insert(&zone.id) {
                hits.push(ZoneHit { id: zone.id.clone(), distance_m, zone: local });
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> ArenaFrame {
        ArenaFrame::new(vec![
            GeoPoint::new(12.0345, 77.1234),
            GeoPoint::new(12.0345, 77.1265),
            GeoPoint::new(12.0315, 77.1265),
            GeoPoint::new(12.0315, 77.1234),
        ])
    }

    /// A zone whose local position is exactly (x, y) in the 9x12 field.
    fn zone_at(id: &str, x: f64, y: f64) -> SafeZone {
        SafeZone::new(id, 12.0315 + y / 12.0 * 0.0030, 77.1234 + x / 9.0 * 0.0031)
    }

    #[test]
    fn detects_within_threshold_once() {
        let det = Detector::default();
        let zones = vec![zone_at("Spot1", 4.5, 6.0)];
        let mut st = DetectionState::default();

        let pos = LocalPoint::new(4.6, 6.1);
        assert_eq!(det.detect(pos, &zones, &arena(), &mut st), vec!["Spot1".to_string()]);
        assert!(st.contains("Spot1"));

        // still inside the radius: no second event
        assert!(det.detect(pos, &zones, &arena(), &mut st).is_empty());
        assert_eq!(st.len(), 1);
    }

    #[test]
    fn outside_threshold_is_ignored() {
        let det = Detector::default();
        let zones = vec![zone_at("Spot1", 4.5, 6.0)];
        let mut st = DetectionState::default();
        assert!(det.detect(LocalPoint::new(5.2, 6.0), &zones, &arena(), &mut st).is_empty());
        assert!(st.is_empty());
    }

    #[test]
    fn boundary_distance_counts() {
        let det = Detector::new(1.0, FieldDims::default());
        let zones = vec![zone_at("Edge", 2.0, 2.0)];
        let mut st = DetectionState::default();
        let hits = det.detect_hits(LocalPoint::new(2.0, 2.99), &zones, &arena(), &mut st);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance_m <= 1.0);
    }

    #[test]
    fn simultaneous_hits_keep_zone_order() {
        let det = Detector::new(2.0, FieldDims::default());
        let zones = vec![zone_at("B", 3.0, 3.0), zone_at("A", 3.5, 3.5), zone_at("C", 8.0, 11.0)];
        let mut st = DetectionState::default();
        let ids = det.detect(LocalPoint::new(3.2, 3.2), &zones, &arena(), &mut st);
        assert_eq!(ids, vec!["B".to_string(), "A".to_string()]);
        assert_eq!(st.ids(), &["B".to_string(), "A".to_string()]);
    }

    #[test]
    fn non_finite_zone_is_skipped_not_fatal() {
        let det = Detector::default();
        let zones = vec![SafeZone::new("Bad", f64::NAN, 77.12), zone_at("Good", 1.0, 1.0)];
        let mut st = DetectionState::default();
        let ids = det.detect(LocalPoint::new(1.0, 1.0), &zones, &arena(), &mut st);
        assert_eq!(ids, vec!["Good".to_string()]);
        assert!(!st.contains("Bad"));
    }

    #[test]
    fn three_zones_complete_the_mission() {
        let det = Detector::default();
        let zones = vec![zone_at("Spot1", 1.0, 1.0), zone_at("Spot2", 4.0, 6.0), zone_at("Spot3", 8.0, 10.0)];
        let mut st = DetectionState::default();

        for (x, y) in [(1.1, 1.0), (4.0, 6.2), (7.9, 10.1)] {
            let ids = det.detect(LocalPoint::new(x, y), &zones, &arena(), &mut st);
            assert_eq!(ids.len(), 1);
        }
        assert_eq!(st.len(), 3);
        assert!(st.is_complete(zones.len()));

        st.reset();
        assert!(st.is_empty());
        assert!(!st.is_complete(3));
    }

    #[test]
    fn duplicate_ids_fire_once() {
        let det = Detector::default();
        let zones = vec![zone_at("Spot1", 1.0, 1.0), zone_at("Spot1", 1.0, 1.0)];
        let mut st = DetectionState::default();
        assert_eq!(det.detect(LocalPoint::new(1.0, 1.0), &zones, &arena(), &mut st).len(), 1);
    }
}
