use serde::{Deserialize, Serialize};

/// Vehicle attitude. Angles in radians, rates in radians/second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll_rate: f32,
    pub pitch_rate: f32,
    pub yaw_rate: f32,
}

/// Local NED position (meters) and velocity (meters/second). Down is +z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
}

impl LocalPosition {
    /// Altitude above the local origin in meters (NED z flipped).
    pub fn altitude_m(&self) -> f32 {
        -self.z
    }

    pub fn ground_speed_mps(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub remaining_percent: u8,  // 0-100
    pub voltages_mv: Vec<u16>,  // per cell, unused cells dropped
    pub current_a: f32,         // Amps, 0 when the FC reports invalid
}

impl Battery {
    pub fn pack_voltage_v(&self) -> f32 {
        self.voltages_mv.iter().map(|mv| *mv as f32).sum::<f32>() / 1000.0
    }
}

/// Scaled IMU. Acceleration in m/s², angular rate in rad/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Imu {
    pub xacc: f32,
    pub yacc: f32,
    pub zacc: f32,
    pub xgyro: f32,
    pub ygyro: f32,
    pub zgyro: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub vehicle_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub custom_mode: u32,
    pub system_status: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub cpu_load_percent: u8,
    pub memory_usage_percent: u8,
    pub temperature_c: i16,
}

/// One fully-defaulted bundle of the latest telemetry. Absent readings are
/// `None`; `system_health` is always populated (zeros when unknown).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub ts_unix_ms: i64,
    pub heartbeat: Option<Heartbeat>,
    pub attitude: Option<Attitude>,
    pub local_position: Option<LocalPosition>,
    pub battery: Option<Battery>,
    pub imu: Option<Imu>,
    pub system_health: SystemHealth,
}

impl TelemetrySnapshot {
    pub fn empty(ts_unix_ms: i64) -> Self {
        Self { ts_unix_ms, ..Self::default() }
    }

    /// Attitude or its zero value.
    pub fn attitude_or_zero(&self) -> Attitude {
        self.attitude.unwrap_or_default()
    }

    pub fn local_position_or_zero(&self) -> LocalPosition {
        self.local_position.unwrap_or_default()
    }

    pub fn battery_or_zero(&self) -> Battery {
        self.battery.clone().unwrap_or_default()
    }
}

/// What the presentation layer receives on every telemetry tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub connected: bool,
    pub heartbeat_age_ms: Option<u64>,
    pub snapshot: TelemetrySnapshot,
}
