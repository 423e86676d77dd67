use anyhow::Result;
use std::path::Path;
use tracing::warn;

use crate::TelemetryConfig;

pub fn check_telemetry(cfg: &TelemetryConfig) -> Result<()> {
    anyhow::ensure!(!cfg.params_dir.is_empty(), "telemetry.params_dir missing");
    let poll = cfg.poll_period();
    let stale = cfg.stale_after();
    anyhow::ensure!(poll.as_millis() >= 50, "telemetry.poll_ms too small; set >= 50");
    anyhow::ensure!(stale > poll, "telemetry.stale_ms must exceed telemetry.poll_ms");
    if let Some(r) = cfg.mem_reference {
        anyhow::ensure!(r.is_finite() && r > 0.0, "telemetry.mem_reference must be > 0");
    }

    let p = Path::new(&cfg.params_dir);
    if p.exists() {
        anyhow::ensure!(p.is_dir(), "telemetry.params_dir is not a dir: {}", cfg.params_dir);
    } else {
        // listener not started yet; polling will report "unavailable" until it is
        warn!("telemetry.params_dir does not exist yet: {}", cfg.params_dir);
    }
    Ok(())
}
