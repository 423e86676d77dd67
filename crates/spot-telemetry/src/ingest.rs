use anyhow::Result;
use serde_json::Value;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use spot_proto::telemetry::{TelemetryFrame, TelemetrySnapshot};

use crate::health::system_health;
use crate::readings;
use crate::sources::{Reading, Sources};
use crate::state::ConnectionState;
use crate::{DEFAULT_MEM_REFERENCE, DEFAULT_STALE_MS};

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub stale_after: Duration,
    pub mem_reference: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_millis(DEFAULT_STALE_MS),
            mem_reference: DEFAULT_MEM_REFERENCE,
        }
    }
}

/// Folds independently failing readings into one snapshot per poll.
///
/// A heartbeat-bearing poll produces a new known-good snapshot. Without a
/// heartbeat the last known-good snapshot is held; once the heartbeat is
/// older than `stale_after` the link is reported disconnected while the held
/// snapshot keeps being returned.
pub struct Ingestor {
    cfg: IngestConfig,
    conn: ConnectionState,
    last_good: Option<TelemetrySnapshot>,
}

impl Ingestor {
    pub fn new(cfg: IngestConfig) -> Self {
        Self { cfg, conn: ConnectionState::default(), last_good: None }
    }

    pub fn poll(&mut self, sources: &mut Sources) -> TelemetrySnapshot {
        self.poll_at(sources, Instant::now(), OffsetDateTime::now_utc())
    }

    pub fn poll_at(&mut self, sources: &mut Sources, now: Instant, wall: OffsetDateTime) -> TelemetrySnapshot {
        let ts_unix_ms = (wall.unix_timestamp_nanos() / 1_000_000) as i64;

        let heartbeat = take(sources, Reading::Heartbeat, readings::heartbeat);
        let attitude = take(sources, Reading::Attitude, readings::attitude);
        let local_position = take(sources, Reading::LocalPosition, readings::local_position);
        let battery = take(sources, Reading::Battery, readings::battery);
        let imu = take(sources, Reading::Imu, readings::imu);
        let load = take(sources, Reading::SysStatus, readings::sys_load);
        let free_mem = take(sources, Reading::MemInfo, readings::free_memory);

        let health = system_health(load, free_mem, imu.map(|r| r.temperature_c), self.cfg.mem_reference);

        let was_connected = self.conn.connected;
        if heartbeat.is_some() {
            self.conn.on_heartbeat(now);
        }
        self.conn.refresh(now, self.cfg.stale_after);

        match (was_connected, self.conn.connected) {
            (false, true) => info!("telemetry: link up (heartbeat)"),
            (true, false) => warn!(
                "telemetry: link lost, no heartbeat for {}ms; holding last snapshot",
                self.conn.hb_age(now).unwrap_or_default().as_millis()
            ),
            _ => {}
        }

        if heartbeat.is_some() {
            let snap = TelemetrySnapshot {
                ts_unix_ms,
                heartbeat,
                attitude,
                local_position,
                battery,
                imu: imu.map(|r| r.imu),
                system_health: health,
            };
            self.last_good = Some(snap.clone());
            return snap;
        }

        match &self.last_good {
            Some(held) => held.clone(),
            None => TelemetrySnapshot { system_health: health, ..TelemetrySnapshot::empty(ts_unix_ms) },
        }
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.conn
    }

    pub fn last_good(&self) -> Option<&TelemetrySnapshot> {
        self.last_good.as_ref()
    }

    /// Packs a snapshot with the current link state for publishing.
    pub fn frame(&self, snapshot: TelemetrySnapshot, now: Instant) -> TelemetryFrame {
        TelemetryFrame {
            connected: self.conn.connected,
            heartbeat_age_ms: self.conn.hb_age(now).map(|d| d.as_millis() as u64),
            snapshot,
        }
    }

    /// Session reset: forget link history and the held snapshot.
    pub fn reset(&mut self) {
        self.conn = ConnectionState::default();
        self.last_good = None;
    }
}

fn take<T>(sources: &mut Sources, reading: Reading, check: fn(Value) -> Result<T>) -> Option<T> {
    match sources.fetch(reading)? {
        Ok(v) => match check(v) {
            Ok(t) => Some(t),
            Err(e) => {
                debug!("telemetry: {} unavailable: {:#}", reading.message_name(), e);
                None
            }
        },
        Err(e) => {
            debug!("telemetry: {} unavailable: {:#}", reading.message_name(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Fetch;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Shared table of canned payloads; `None` means the fetch fails.
    type Table = Arc<Mutex<Vec<(Reading, Option<Value>)>>>;

    fn sources_from(table: &Table) -> Sources {
        Sources::new(Reading::ALL.into_iter().map(|r| {
            let t = table.clone();
            let f: Fetch = Box::new(move || {
                let t = t.lock().unwrap();
                t.iter()
                    .find(|(k, _)| *k == r)
                    .and_then(|(_, v)| v.clone())
                    .ok_or_else(|| anyhow::anyhow!("{} missing", r.message_name()))
            });
            (r, f)
        }))
        .unwrap()
    }

    fn full_payloads() -> Vec<(Reading, Option<Value>)> {
        vec![
            (Reading::Heartbeat, Some(json!({"mavpackettype": "HEARTBEAT", "type": 2}))),
            (Reading::Attitude, Some(json!({"roll": 0.1, "pitch": -0.2, "yaw": 1.5,
                "rollspeed": 0.01, "pitchspeed": 0.0, "yawspeed": -0.02}))),
            (Reading::LocalPosition, Some(json!({"x": 1.0, "y": 2.0, "z": -3.0,
                "vx": 0.5, "vy": 0.0, "vz": 0.0}))),
            (Reading::Battery, Some(json!({"battery_remaining": 76, "voltages": [4012, 4020, 65535],
                "current_battery": 830}))),
            (Reading::Imu, Some(json!({"xacc": 0, "yacc": 0, "zacc": -1000,
                "xgyro": 0, "ygyro": 0, "zgyro": 0, "temperature": 3870}))),
            (Reading::SysStatus, Some(json!({"load": 250}))),
            (Reading::MemInfo, Some(json!({"freemem32": 400000}))),
        ]
    }

    fn set(table: &Table, reading: Reading, v: Option<Value>) {
        let mut t = table.lock().unwrap();
        for (k, slot) in t.iter_mut() {
            if *k == reading {
                *slot = v.clone();
            }
        }
    }

    fn wall(ms: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).unwrap()
    }

    #[test]
    fn full_poll_builds_snapshot() {
        let table: Table = Arc::new(Mutex::new(full_payloads()));
        let mut src = sources_from(&table);
        let mut ing = Ingestor::new(IngestConfig::default());
        let t0 = Instant::now();

        let s = ing.poll_at(&mut src, t0, wall(1_000));
        assert!(ing.connection().connected);
        assert_eq!(s.ts_unix_ms, 1_000);
        assert!((s.attitude.unwrap().yaw - 1.5).abs() < 1e-6);
        assert_eq!(s.local_position.unwrap().altitude_m(), 3.0);
        assert_eq!(s.battery.as_ref().unwrap().voltages_mv, vec![4012, 4020]);
        assert_eq!(s.system_health.cpu_load_percent, 25);
        assert_eq!(s.system_health.memory_usage_percent, 60);
        assert_eq!(s.system_health.temperature_c, 39);
    }

    #[test]
    fn every_failure_combination_yields_complete_snapshot() {
        let n = Reading::ALL.len();
        for mask in 0u32..(1 << n) {
            let mut payloads = full_payloads();
            for (i, (_, v)) in payloads.iter_mut().enumerate() {
                if mask & (1 << i) != 0 {
                    *v = None;
                }
            }
            let table: Table = Arc::new(Mutex::new(payloads));
            let mut src = sources_from(&table);
            let mut ing = Ingestor::new(IngestConfig::default());
            let s = ing.poll_at(&mut src, Instant::now(), wall(5));

            let hb_ok = mask & 1 == 0;
            assert_eq!(ing.connection().connected, hb_ok, "mask {:b}", mask);
            if !hb_ok {
                assert!(s.attitude.is_none() && s.local_position.is_none() && s.battery.is_none());
            }
            // zero-defaulted accessors never panic
            let _ = (s.attitude_or_zero(), s.local_position_or_zero(), s.battery_or_zero());
        }
    }

    #[test]
    fn malformed_reading_is_just_absent() {
        let table: Table = Arc::new(Mutex::new(full_payloads()));
        set(&table, Reading::Attitude, Some(json!({"roll": "bad"})));
        set(&table, Reading::Battery, Some(json!([1, 2, 3])));
        let mut src = sources_from(&table);
        let mut ing = Ingestor::new(IngestConfig::default());

        let s = ing.poll_at(&mut src, Instant::now(), wall(0));
        assert!(s.attitude.is_none());
        assert!(s.battery.is_none());
        assert!(s.local_position.is_some());
    }

    #[test]
    fn stale_link_holds_last_good_snapshot() {
        let table: Table = Arc::new(Mutex::new(full_payloads()));
        let mut src = sources_from(&table);
        let mut ing = Ingestor::new(IngestConfig::default());
        let t0 = Instant::now();

        let good = ing.poll_at(&mut src, t0, wall(0));
        assert!(ing.connection().connected);

        // heartbeat file vanishes, everything else keeps updating with zeros
        set(&table, Reading::Heartbeat, None);
        set(&table, Reading::Attitude, Some(json!({"roll": 0, "pitch": 0, "yaw": 0,
            "rollspeed": 0, "pitchspeed": 0, "yawspeed": 0})));

        let held = ing.poll_at(&mut src, t0 + Duration::from_millis(2_000), wall(2_000));
        assert!(ing.connection().connected);
        assert_eq!(held, good);

        let stale = ing.poll_at(&mut src, t0 + Duration::from_millis(5_001), wall(5_001));
        assert!(!ing.connection().connected);
        assert_eq!(stale, good);

        let frame = ing.frame(stale, t0 + Duration::from_millis(5_001));
        assert!(!frame.connected);
        assert_eq!(frame.heartbeat_age_ms, Some(5_001));
    }

    #[test]
    fn heartbeat_returns_after_stale() {
        let table: Table = Arc::new(Mutex::new(full_payloads()));
        let mut src = sources_from(&table);
        let mut ing = Ingestor::new(IngestConfig::default());
        let t0 = Instant::now();

        ing.poll_at(&mut src, t0, wall(0));
        set(&table, Reading::Heartbeat, None);
        ing.poll_at(&mut src, t0 + Duration::from_secs(6), wall(6_000));
        assert!(!ing.connection().connected);

        set(&table, Reading::Heartbeat, Some(json!({"mavpackettype": "HEARTBEAT"})));
        let s = ing.poll_at(&mut src, t0 + Duration::from_secs(7), wall(7_000));
        assert!(ing.connection().connected);
        assert_eq!(s.ts_unix_ms, 7_000);
    }

    #[test]
    fn no_history_and_no_heartbeat_is_empty() {
        let table: Table = Arc::new(Mutex::new(full_payloads()));
        set(&table, Reading::Heartbeat, Some(json!({"mavpackettype": "SYS_STATUS"})));
        let mut src = sources_from(&table);
        let mut ing = Ingestor::new(IngestConfig::default());

        let s = ing.poll_at(&mut src, Instant::now(), wall(9));
        assert!(!ing.connection().connected);
        assert!(s.heartbeat.is_none());
        assert!(s.attitude.is_none());
        assert!(s.imu.is_none());
        // health is still derived from whatever raw readings exist
        assert_eq!(s.system_health.cpu_load_percent, 25);
    }

    #[test]
    fn reset_forgets_history() {
        let table: Table = Arc::new(Mutex::new(full_payloads()));
        let mut src = sources_from(&table);
        let mut ing = Ingestor::new(IngestConfig::default());
        ing.poll_at(&mut src, Instant::now(), wall(0));
        assert!(ing.last_good().is_some());

        ing.reset();
        assert!(ing.last_good().is_none());
        assert!(!ing.connection().connected);
    }
}
