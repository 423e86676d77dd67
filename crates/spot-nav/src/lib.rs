pub mod arena;
pub mod detect;
pub mod doctor;
pub mod position;
pub mod session;
pub mod zones;

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use arena::FieldDims;
use detect::{Detector, DEFAULT_THRESHOLD_M};
use position::{ParamPositionSource, PositionChain, PositionSource, SimulatedPosition, DEFAULT_NED_SCALE};
use zones::{FallbackZoneSource, FileZoneSource, StaticZoneSource, ZoneSource, DEFAULT_MAX_ZONES};

pub const DEFAULT_ZONE_REFRESH_MS: u64 = 5000;
pub const DEFAULT_POSITION_POLL_MS: u64 = 250;

#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub width_m: f64,
    pub height_m: f64,
}

impl From<&FieldConfig> for FieldDims {
    fn from(c: &FieldConfig) -> Self {
        FieldDims { width_m: c.width_m, height_m: c.height_m }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZonesConfig {
    /// "file" | "mock" | "reference"
    pub source: String,

    /// Local copy of the zone file (source = "file").
    pub path: Option<String>,

    /// Zone file re-read period. Default 5000 ms.
    pub refresh_ms: Option<u64>,

    /// Serve the built-in mock arena when the file cannot be read.
    /// Default true.
    pub fallback_mock: Option<bool>,

    /// Safe spots kept from the file. Default 3.
    pub max_zones: Option<usize>,
}

impl ZonesConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_ms.unwrap_or(DEFAULT_ZONE_REFRESH_MS))
    }

    pub fn max_zones(&self) -> usize {
        self.max_zones.unwrap_or(DEFAULT_MAX_ZONES)
    }

    pub fn build_source(&self) -> Result<Box<dyn ZoneSource>> {
        let max = self.max_zones();
        let src: Box<dyn ZoneSource> = match self.source.as_str() {
            "file" => {
                let path = self.path.as_deref().filter(|p| !p.is_empty());
                let path = path.ok_or_else(|| anyhow::anyhow!("zones.path missing (source=file)"))?;
                let file = Box::new(FileZoneSource::new(path, max));
                if self.fallback_mock.unwrap_or(true) {
                    Box::new(FallbackZoneSource::new(file, Box::new(StaticZoneSource::mock(max)?)))
                } else {
                    file
                }
            }
            "mock" => Box::new(StaticZoneSource::mock(max)?),
            "reference" => Box::new(StaticZoneSource::reference(max)?),
            other => anyhow::bail!("unknown zones.source: {}", other),
        };
        Ok(src)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionConfig {
    /// Directory holding LOCAL_POSITION_NED.json / GLOBAL_POSITION_INT.json.
    /// Defaults to the telemetry params dir.
    pub params_dir: Option<String>,

    /// Position/detection period. Default 250 ms.
    pub poll_ms: Option<u64>,

    /// Field meters per NED meter. Default 0.5.
    pub ned_scale: Option<f64>,

    /// Fall back to the simulated orbit when no real position is available.
    pub simulate: Option<bool>,
}

impl PositionConfig {
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_ms.unwrap_or(DEFAULT_POSITION_POLL_MS))
    }

    pub fn build_source(&self, default_dir: &str, field: FieldDims) -> Box<dyn PositionSource> {
        let dir = self.params_dir.as_deref().unwrap_or(default_dir);
        let params = ParamPositionSource::new(dir, field, self.ned_scale.unwrap_or(DEFAULT_NED_SCALE));
        if self.simulate.unwrap_or(false) {
            let chain: Vec<Box<dyn PositionSource>> = vec![Box::new(params), Box::new(SimulatedPosition::new(field))];
            Box::new(PositionChain::new(chain))
        } else {
            Box::new(params)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectConfig {
    /// Detection radius in field meters. Default 0.5.
    pub threshold_m: Option<f64>,

    /// Zones that make up a complete mission. Default 3.
    pub total_zones: Option<usize>,
}

impl DetectConfig {
    pub fn total_zones(&self) -> usize {
        self.total_zones.unwrap_or(DEFAULT_MAX_ZONES)
    }

    pub fn detector(&self, field: FieldDims) -> Detector {
        Detector::new(self.threshold_m.unwrap_or(DEFAULT_THRESHOLD_M), field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones_cfg(source: &str) -> ZonesConfig {
        ZonesConfig { source: source.into(), path: None, refresh_ms: None, fallback_mock: None, max_zones: None }
    }

    #[test]
    fn builds_static_sources() {
        let mut src = zones_cfg("reference").build_source().unwrap();
        assert_eq!(src.fetch().unwrap().zones.len(), 3);
        assert_eq!(src.describe(), "static:reference");
    }

    #[test]
    fn file_source_needs_path() {
        assert!(zones_cfg("file").build_source().is_err());
        assert!(zones_cfg("scp").build_source().is_err());
    }

    #[test]
    fn file_source_falls_back_to_mock_by_default() {
        let mut cfg = zones_cfg("file");
        cfg.path = Some("/nonexistent/safe_zone_data.txt".into());
        let set = cfg.build_source().unwrap().fetch().unwrap();
        assert!(set.degraded.is_some());

        cfg.fallback_mock = Some(false);
        assert!(cfg.build_source().unwrap().fetch().is_err());
    }

    #[test]
    fn detect_defaults() {
        let d = DetectConfig::default();
        assert_eq!(d.total_zones(), 3);
        assert_eq!(d.detector(FieldDims::default()).threshold_m, 0.5);
    }
}
