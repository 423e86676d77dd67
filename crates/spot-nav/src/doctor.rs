use anyhow::Result;
use crate::{DetectConfig, FieldConfig, PositionConfig, ZonesConfig};

pub fn check_field(field: &FieldConfig) -> Result<()> {
    anyhow::ensure!(field.width_m.is_finite() && field.width_m > 0.0, "field.width_m must be > 0");
    anyhow::ensure!(field.height_m.is_finite() && field.height_m > 0.0, "field.height_m must be > 0");
    Ok(())
}

pub fn check_zones(zones: &ZonesConfig, detect: &DetectConfig) -> Result<()> {
    anyhow::ensure!(zones.max_zones() >= 1, "zones.max_zones must be >= 1");
    anyhow::ensure!(detect.total_zones() >= 1, "detect.total_zones must be >= 1");
    anyhow::ensure!(
        detect.total_zones() <= zones.max_zones(),
        "detect.total_zones ({}) exceeds zones.max_zones ({}); mission could never complete",
        detect.total_zones(), zones.max_zones()
    );
    anyhow::ensure!(zones.refresh_period().as_millis() >= 250, "zones.refresh_ms too small; set >= 250");
    if let Some(t) = detect.threshold_m {
        anyhow::ensure!(t.is_finite() && t > 0.0, "detect.threshold_m must be > 0");
    }
    // construction catches unknown sources and a missing path
    zones.build_source()?;
    Ok(())
}

pub fn check_position(pos: &PositionConfig) -> Result<()> {
    anyhow::ensure!(pos.poll_period().as_millis() >= 50, "position.poll_ms too small; set >= 50");
    if let Some(s) = pos.ned_scale {
        anyhow::ensure!(s.is_finite() && s > 0.0, "position.ned_scale must be > 0");
    }
    Ok(())
}
