pub mod telemetry;
pub mod detection;
