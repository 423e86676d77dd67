use serde::{Deserialize, Serialize};

/// Reference origin for the degraded mapping used when no complete arena is
/// known. Fixed for the reference field, not derived from any data.
pub const FALLBACK_ORIGIN: GeoPoint = GeoPoint { lat: 12.03, lng: 77.12 };
/// Field meters per degree in the degraded mapping.
pub const FALLBACK_M_PER_DEG: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Point in the arena's planar frame, meters from the field origin. With a
/// complete arena x runs east from min lng and y north from min lat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalPoint {
    pub x: f64,
    pub y: f64,
}

impl LocalPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &LocalPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldDims {
    pub width_m: f64,
    pub height_m: f64,
}

impl Default for FieldDims {
    fn default() -> Self {
        Self { width_m: 9.0, height_m: 12.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// Geographic corners of the operating field. Only the bounding extent is
/// used, so corners need not be axis-aligned or ordered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArenaFrame {
    corners: Vec<GeoPoint>,
}

impl ArenaFrame {
    pub fn new(corners: Vec<GeoPoint>) -> Self {
        Self { corners }
    }

    pub fn corners(&self) -> &[GeoPoint] {
        &self.corners
    }

    /// Four or more finite corners. Anything less maps through the fallback.
    pub fn is_complete(&self) -> bool {
        self.corners.len() >= 4 && self.corners.iter().all(GeoPoint::is_finite)
    }

    pub fn bounds(&self) -> Option<Bounds> {
        if !self.is_complete() {
            return None;
        }
        let mut b = Bounds {
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
            min_lng: f64::INFINITY,
            max_lng: f64::NEG_INFINITY,
        };
        for c in &self.corners {
            b.min_lat = b.min_lat.min(c.lat);
            b.max_lat = b.max_lat.max(c.lat);
            b.min_lng = b.min_lng.min(c.lng);
            b.max_lng = b.max_lng.max(c.lng);
        }
        Some(b)
    }

    /// Corners mapped into the local frame (for drawing the arena outline).
    pub fn local_corners(&self, field: FieldDims) -> Vec<LocalPoint> {
        self.corners.iter().map(|c| to_local_frame(*c, self, field)).collect()
    }
}

/// Maps a geographic point into the arena's local frame, clamped to the
/// field. Always returns finite coordinates.
pub fn to_local_frame(point: GeoPoint, arena: &ArenaFrame, field: FieldDims) -> LocalPoint {
    match arena.bounds() {
        Some(b) => LocalPoint {
            x: scale_axis(point.lng, b.min_lng, b.max_lng, field.width_m),
            y: scale_axis(point.lat, b.min_lat, b.max_lat, field.height_m),
        },
        // degraded mapping: x from latitude, y from longitude
        None => LocalPoint {
            x: clamp_axis((point.lat - FALLBACK_ORIGIN.lat) * FALLBACK_M_PER_DEG, field.width_m),
            y: clamp_axis((point.lng - FALLBACK_ORIGIN.lng) * FALLBACK_M_PER_DEG, field.height_m),
        },
    }
}

fn scale_axis(v: f64, min: f64, max: f64, extent: f64) -> f64 {
    let span = max - min;
    // degenerate arena collapses the axis onto its boundary
    if !(span > 0.0) {
        return 0.0;
    }
    clamp_axis((v - min) / span * extent, extent)
}

/// Clamps `v` into `0..=extent`. Non-finite values and a negative or NaN
/// extent never panic; they collapse toward 0.
pub(crate) fn clamp_axis(v: f64, extent: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, extent.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_arena() -> ArenaFrame {
        ArenaFrame::new(vec![
            GeoPoint::new(12.0345, 77.1234),
            GeoPoint::new(12.0345, 77.1265),
            GeoPoint::new(12.0315, 77.1265),
            GeoPoint::new(12.0315, 77.1234),
        ])
    }

    #[test]
    fn maps_into_field_by_bounding_box() {
        let p = to_local_frame(GeoPoint::new(12.0330, 77.1250), &reference_arena(), FieldDims::default());
        // 0.0016 / 0.0031 of the 9 m width
        assert!((p.x - 4.645).abs() < 0.01, "x = {}", p.x);
        assert!((p.y - 6.0).abs() < 1e-6, "y = {}", p.y);
    }

    #[test]
    fn corners_map_to_field_extent() {
        let local = reference_arena().local_corners(FieldDims::default());
        assert_eq!(local[0], LocalPoint::new(0.0, 12.0));
        assert_eq!(local[1], LocalPoint::new(9.0, 12.0));
        assert_eq!(local[2], LocalPoint::new(9.0, 0.0));
        assert_eq!(local[3], LocalPoint::new(0.0, 0.0));
    }

    #[test]
    fn outside_points_are_clamped() {
        let p = to_local_frame(GeoPoint::new(13.0, 70.0), &reference_arena(), FieldDims::default());
        assert_eq!(p, LocalPoint::new(0.0, 12.0));
    }

    #[test]
    fn degenerate_latitude_gives_zero_y() {
        let arena = ArenaFrame::new(vec![
            GeoPoint::new(12.03, 77.1234),
            GeoPoint::new(12.03, 77.1265),
            GeoPoint::new(12.03, 77.1265),
            GeoPoint::new(12.03, 77.1234),
        ]);
        for lat in [-90.0, 0.0, 12.03, 12.5, 90.0] {
            let p = to_local_frame(GeoPoint::new(lat, 77.125), &arena, FieldDims::default());
            assert_eq!(p.y, 0.0);
            assert!(p.x.is_finite());
        }
    }

    #[test]
    fn degenerate_longitude_gives_zero_x() {
        let arena = ArenaFrame::new(vec![
            GeoPoint::new(12.0315, 77.12),
            GeoPoint::new(12.0345, 77.12),
            GeoPoint::new(12.0345, 77.12),
            GeoPoint::new(12.0315, 77.12),
        ]);
        for lng in [-180.0, 0.0, 77.12, 77.5, 180.0] {
            let p = to_local_frame(GeoPoint::new(12.033, lng), &arena, FieldDims::default());
            assert_eq!(p.x, 0.0);
            assert!((p.y - 6.0).abs() < 1e-6, "y = {}", p.y);
        }
    }

    #[test]
    fn negative_field_never_panics() {
        let field = FieldDims { width_m: -1.0, height_m: f64::NAN };
        let p = to_local_frame(GeoPoint::new(12.035, 77.124), &ArenaFrame::default(), field);
        assert_eq!(p, LocalPoint::new(0.0, 0.0));
    }

    #[test]
    fn fewer_than_four_corners_uses_fallback_scaling() {
        let arena = ArenaFrame::new(vec![GeoPoint::new(1.0, 1.0)]);
        let p = to_local_frame(GeoPoint::new(12.035, 77.124), &arena, FieldDims::default());
        assert!((p.x - 5.0).abs() < 1e-6, "x = {}", p.x);
        assert!((p.y - 4.0).abs() < 1e-6, "y = {}", p.y);

        let far = to_local_frame(GeoPoint::new(40.0, 100.0), &ArenaFrame::default(), FieldDims::default());
        assert_eq!(far, LocalPoint::new(9.0, 12.0));
    }

    #[test]
    fn non_finite_corner_degrades_to_fallback() {
        let mut corners = reference_arena().corners().to_vec();
        corners[2].lat = f64::NAN;
        let arena = ArenaFrame::new(corners);
        assert!(!arena.is_complete());
        assert!(arena.bounds().is_none());
    }

    #[test]
    fn non_finite_point_never_leaks() {
        let p = to_local_frame(GeoPoint::new(f64::NAN, f64::INFINITY), &reference_arena(), FieldDims::default());
        assert!(p.is_finite());
    }
}
