//! Shape checks for listener JSON payloads.
//!
//! Each reading is deserialized into its raw MAVLink-dict shape, every
//! required number must be finite, then it is converted into SI units.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use spot_proto::telemetry::{Attitude, Battery, Heartbeat, Imu, LocalPosition};

const STANDARD_GRAVITY: f64 = 9.80665;

trait Shape: DeserializeOwned {
    fn finite(&self) -> bool;
}

fn parse<T: Shape>(v: Value, what: &str) -> Result<T> {
    let raw: T = serde_json::from_value(v).with_context(|| format!("{} payload shape", what))?;
    anyhow::ensure!(raw.finite(), "{} payload has non-finite fields", what);
    Ok(raw)
}

fn all_finite(vals: &[f64]) -> bool {
    vals.iter().all(|v| v.is_finite())
}

#[derive(Debug, Deserialize)]
struct RawHeartbeat {
    mavpackettype: String,
    #[serde(default, rename = "type")]
    vehicle_type: f64,
    #[serde(default)]
    autopilot: f64,
    #[serde(default)]
    base_mode: f64,
    #[serde(default)]
    custom_mode: f64,
    #[serde(default)]
    system_status: f64,
}

impl Shape for RawHeartbeat {
    fn finite(&self) -> bool {
        all_finite(&[self.vehicle_type, self.autopilot, self.base_mode, self.custom_mode, self.system_status])
    }
}

pub fn heartbeat(v: Value) -> Result<Heartbeat> {
    let raw: RawHeartbeat = parse(v, "HEARTBEAT")?;
    anyhow::ensure!(raw.mavpackettype == "HEARTBEAT", "mavpackettype is {:?}", raw.mavpackettype);
    Ok(Heartbeat {
        vehicle_type: raw.vehicle_type as u8,
        autopilot: raw.autopilot as u8,
        base_mode: raw.base_mode as u8,
        custom_mode: raw.custom_mode as u32,
        system_status: raw.system_status as u8,
    })
}

#[derive(Debug, Deserialize)]
struct RawAttitude {
    roll: f64,
    pitch: f64,
    yaw: f64,
    rollspeed: f64,
    pitchspeed: f64,
    yawspeed: f64,
}

impl Shape for RawAttitude {
    fn finite(&self) -> bool {
        all_finite(&[self.roll, self.pitch, self.yaw, self.rollspeed, self.pitchspeed, self.yawspeed])
    }
}

pub fn attitude(v: Value) -> Result<Attitude> {
    let raw: RawAttitude = parse(v, "ATTITUDE")?;
    Ok(Attitude {
        roll: raw.roll as f32,
        pitch: raw.pitch as f32,
        yaw: raw.yaw as f32,
        roll_rate: raw.rollspeed as f32,
        pitch_rate: raw.pitchspeed as f32,
        yaw_rate: raw.yawspeed as f32,
    })
}

#[derive(Debug, Deserialize)]
struct RawLocalPosition {
    x: f64,
    y: f64,
    z: f64,
    vx: f64,
    vy: f64,
    vz: f64,
}

impl Shape for RawLocalPosition {
    fn finite(&self) -> bool {
        all_finite(&[self.x, self.y, self.z, self.vx, self.vy, self.vz])
    }
}

/// LOCAL_POSITION_NED is already meters and meters/second.
pub fn local_position(v: Value) -> Result<LocalPosition> {
    let raw: RawLocalPosition = parse(v, "LOCAL_POSITION_NED")?;
    Ok(LocalPosition {
        x: raw.x as f32,
        y: raw.y as f32,
        z: raw.z as f32,
        vx: raw.vx as f32,
        vy: raw.vy as f32,
        vz: raw.vz as f32,
    })
}

#[derive(Debug, Deserialize)]
struct RawBattery {
    battery_remaining: f64,
    #[serde(default)]
    voltages: Vec<f64>,
    #[serde(default = "invalid_current")]
    current_battery: f64,
}

fn invalid_current() -> f64 {
    -1.0
}

impl Shape for RawBattery {
    fn finite(&self) -> bool {
        all_finite(&[self.battery_remaining, self.current_battery]) && all_finite(&self.voltages)
    }
}

pub fn battery(v: Value) -> Result<Battery> {
    let raw: RawBattery = parse(v, "BATTERY_STATUS")?;
    // battery_remaining is -1 when the FC has no estimate
    let remaining_percent = raw.battery_remaining.round().clamp(0.0, 100.0) as u8;
    // u16::MAX marks an unused cell slot
    let voltages_mv = raw
        .voltages
        .iter()
        .filter(|mv| **mv >= 0.0 && **mv < u16::MAX as f64)
        .map(|mv| *mv as u16)
        .collect();
    // current_battery is in centiamps, -1 means invalid
    let current_a = if raw.current_battery >= 0.0 { (raw.current_battery / 100.0) as f32 } else { 0.0 };
    Ok(Battery { remaining_percent, voltages_mv, current_a })
}

#[derive(Debug, Deserialize)]
struct RawImu {
    xacc: f64,
    yacc: f64,
    zacc: f64,
    xgyro: f64,
    ygyro: f64,
    zgyro: f64,
    #[serde(default)]
    temperature: f64,
}

impl Shape for RawImu {
    fn finite(&self) -> bool {
        all_finite(&[self.xacc, self.yacc, self.zacc, self.xgyro, self.ygyro, self.zgyro, self.temperature])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuReading {
    pub imu: Imu,
    pub temperature_c: f64,
}

/// SCALED_IMU2: acceleration in milli-g, rates in millirad/s, temperature in
/// centidegrees.
pub fn imu(v: Value) -> Result<ImuReading> {
    let raw: RawImu = parse(v, "SCALED_IMU2")?;
    let acc = |mg: f64| (mg / 1000.0 * STANDARD_GRAVITY) as f32;
    let gyro = |mrad: f64| (mrad / 1000.0) as f32;
    Ok(ImuReading {
        imu: Imu {
            xacc: acc(raw.xacc),
            yacc: acc(raw.yacc),
            zacc: acc(raw.zacc),
            xgyro: gyro(raw.xgyro),
            ygyro: gyro(raw.ygyro),
            zgyro: gyro(raw.zgyro),
        },
        temperature_c: raw.temperature / 100.0,
    })
}

#[derive(Debug, Deserialize)]
struct RawSysStatus {
    load: f64,
}

impl Shape for RawSysStatus {
    fn finite(&self) -> bool {
        self.load.is_finite()
    }
}

/// SYS_STATUS.load, in tenths of a percent (0..1000).
pub fn sys_load(v: Value) -> Result<f64> {
    let raw: RawSysStatus = parse(v, "SYS_STATUS")?;
    Ok(raw.load)
}

#[derive(Debug, Deserialize)]
struct RawMemInfo {
    freemem32: Option<f64>,
    freemem: Option<f64>,
}

impl Shape for RawMemInfo {
    fn finite(&self) -> bool {
        self.freemem32.map_or(true, f64::is_finite) && self.freemem.map_or(true, f64::is_finite)
    }
}

/// MEMINFO free memory; the 32-bit field wins when both are present.
pub fn free_memory(v: Value) -> Result<f64> {
    let raw: RawMemInfo = parse(v, "MEMINFO")?;
    raw.freemem32.or(raw.freemem).context("MEMINFO has no freemem field")
}
