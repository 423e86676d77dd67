use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use spot_telemetry::sources::read_json_file;

use crate::arena::{clamp_axis, to_local_frame, ArenaFrame, FieldDims, GeoPoint, LocalPoint};

/// Field meters per NED meter.
pub const DEFAULT_NED_SCALE: f64 = 0.5;

/// Yields the tracked position in the arena's local frame, or `None` when
/// nothing usable is available this cycle.
pub trait PositionSource: Send {
    fn read(&mut self, arena: &ArenaFrame) -> Option<LocalPoint>;

    fn describe(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct RawNed {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct RawGlobal {
    lat: f64,
    lon: f64,
}

/// Reads the listener's position files: LOCAL_POSITION_NED first, then
/// GLOBAL_POSITION_INT mapped through the arena.
pub struct ParamPositionSource {
    dir: PathBuf,
    field: FieldDims,
    ned_scale: f64,
}

impl ParamPositionSource {
    pub fn new(dir: impl Into<PathBuf>, field: FieldDims, ned_scale: f64) -> Self {
        Self { dir: dir.into(), field, ned_scale }
    }

    fn local_ned(&self) -> Result<LocalPoint> {
        let v = read_json_file(&self.dir.join("LOCAL_POSITION_NED.json"))?;
        let raw: RawNed = serde_json::from_value(v)?;
        anyhow::ensure!(raw.x.is_finite() && raw.y.is_finite(), "non-finite NED position");
        Ok(ned_to_field(raw.x, raw.y, self.ned_scale, self.field))
    }

    fn global(&self, arena: &ArenaFrame) -> Result<LocalPoint> {
        let v = read_json_file(&self.dir.join("GLOBAL_POSITION_INT.json"))?;
        let p = global_fix(v)?;
        Ok(to_local_frame(p, arena, self.field))
    }
}

impl PositionSource for ParamPositionSource {
    fn read(&mut self, arena: &ArenaFrame) -> Option<LocalPoint> {
        match self.local_ned() {
            Ok(p) => return Some(p),
            Err(e) => debug!("position: NED unavailable: {:#}", e),
        }
        match self.global(arena) {
            Ok(p) => Some(p),
            Err(e) => {
                debug!("position: global unavailable: {:#}", e);
                None
            }
        }
    }

    fn describe(&self) -> String {
        format!("params:{}", self.dir.display())
    }
}

/// NED x/y around the field centre, scaled and clamped to the field. NED x
/// lands on field x, NED y on field y.
pub fn ned_to_field(x: f64, y: f64, scale: f64, field: FieldDims) -> LocalPoint {
    LocalPoint::new(
        clamp_axis(field.width_m / 2.0 + x * scale, field.width_m),
        clamp_axis(field.height_m / 2.0 + y * scale, field.height_m),
    )
}

/// GLOBAL_POSITION_INT lat/lon are degrees * 1e7; an all-zero pair means no fix.
fn global_fix(v: Value) -> Result<GeoPoint> {
    let raw: RawGlobal = serde_json::from_value(v)?;
    anyhow::ensure!(raw.lat.is_finite() && raw.lon.is_finite(), "non-finite global position");
    anyhow::ensure!(raw.lat != 0.0 || raw.lon != 0.0, "no global fix");
    Ok(GeoPoint::new(raw.lat / 1e7, raw.lon / 1e7))
}

/// Deterministic orbit for bench runs without a vehicle.
#[derive(Debug, Clone)]
pub struct SimulatedPosition {
    angle: f64,
    field: FieldDims,
}

impl SimulatedPosition {
    const CENTRE: (f64, f64) = (1.5, 1.2);
    const RADIUS_M: f64 = 2.0;
    const STEP_RAD: f64 = 0.02;

    pub fn new(field: FieldDims) -> Self {
        Self { angle: 0.0, field }
    }

    pub fn next_point(&mut self) -> LocalPoint {
        self.angle += Self::STEP_RAD;
        let x = Self::CENTRE.0 + Self::RADIUS_M * self.angle.cos();
        let y = Self::CENTRE.1 + Self::RADIUS_M * (self.angle * 0.7).sin();
        LocalPoint::new(clamp_axis(x, self.field.width_m), clamp_axis(y, self.field.height_m))
    }
}

impl PositionSource for SimulatedPosition {
    fn read(&mut self, _arena: &ArenaFrame) -> Option<LocalPoint> {
        Some(self.next_point())
    }

    fn describe(&self) -> String {
        "simulated".into()
    }
}

/// First source that yields a point wins.
pub struct PositionChain {
    sources: Vec<Box<dyn PositionSource>>,
}

impl PositionChain {
    pub fn new(sources: Vec<Box<dyn PositionSource>>) -> Self {
        Self { sources }
    }
}

impl PositionSource for PositionChain {
    fn read(&mut self, arena: &ArenaFrame) -> Option<LocalPoint> {
        self.sources.iter_mut().find_map(|s| s.read(arena))
    }

    fn describe(&self) -> String {
        self.sources.iter().map(|s| s.describe()).collect::<Vec<_>>().join(" > ")
    }
}
