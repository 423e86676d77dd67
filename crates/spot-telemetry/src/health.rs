use spot_proto::telemetry::SystemHealth;

/// Derives companion/FC health from raw readings. Missing inputs give 0.
///
/// - `load`: SYS_STATUS.load in tenths of a percent.
/// - `free_mem`: MEMINFO free memory; usage is relative to `mem_reference`.
/// - `temperature_c`: IMU die temperature.
pub fn system_health(
    load: Option<f64>,
    free_mem: Option<f64>,
    temperature_c: Option<f64>,
    mem_reference: f64,
) -> SystemHealth {
    let cpu_load_percent = load.map(|l| percent(l / 1000.0 * 100.0)).unwrap_or(0);

    let memory_usage_percent = match free_mem {
        Some(free) if free > 0.0 && mem_reference > 0.0 => percent((1.0 - free / mem_reference) * 100.0),
        _ => 0,
    };

    let temperature_c = temperature_c
        .filter(|t| t.is_finite())
        .map(|t| t.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16)
        .unwrap_or(0);

    SystemHealth { cpu_load_percent, memory_usage_percent, temperature_c }
}

fn percent(v: f64) -> u8 {
    if !v.is_finite() {
        return 0;
    }
    v.round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_absent_is_zero() {
        assert_eq!(system_health(None, None, None, 1_000_000.0), SystemHealth::default());
    }

    #[test]
    fn load_is_tenths_of_percent() {
        let h = system_health(Some(456.0), None, None, 1_000_000.0);
        assert_eq!(h.cpu_load_percent, 46);
    }

    #[test]
    fn memory_usage_against_reference() {
        let h = system_health(None, Some(250_000.0), None, 1_000_000.0);
        assert_eq!(h.memory_usage_percent, 75);

        // zero free memory reads as "unknown", not 100%
        let h = system_health(None, Some(0.0), None, 1_000_000.0);
        assert_eq!(h.memory_usage_percent, 0);

        // more free than the reference clamps to 0
        let h = system_health(None, Some(2_000_000.0), None, 1_000_000.0);
        assert_eq!(h.memory_usage_percent, 0);
    }

    #[test]
    fn temperature_rounds() {
        let h = system_health(None, None, Some(41.6), 1_000_000.0);
        assert_eq!(h.temperature_c, 42);
    }
}
