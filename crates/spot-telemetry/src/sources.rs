use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Named telemetry readings, one per listener output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reading {
    Heartbeat,
    Attitude,
    LocalPosition,
    Battery,
    Imu,
    SysStatus,
    MemInfo,
}

impl Reading {
    pub const ALL: [Reading; 7] = [
        Reading::Heartbeat,
        Reading::Attitude,
        Reading::LocalPosition,
        Reading::Battery,
        Reading::Imu,
        Reading::SysStatus,
        Reading::MemInfo,
    ];

    /// MAVLink message name the listener uses for this reading.
    pub fn message_name(self) -> &'static str {
        match self {
            Reading::Heartbeat => "HEARTBEAT",
            Reading::Attitude => "ATTITUDE",
            Reading::LocalPosition => "LOCAL_POSITION_NED",
            Reading::Battery => "BATTERY_STATUS",
            Reading::Imu => "SCALED_IMU2",
            Reading::SysStatus => "SYS_STATUS",
            Reading::MemInfo => "MEMINFO",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.message_name())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IngestError {
    #[error("telemetry source set is empty")]
    NoSources,
    #[error("telemetry source set has no heartbeat source; link can never be live")]
    NoHeartbeatSource,
}

pub type Fetch = Box<dyn FnMut() -> Result<Value> + Send>;

/// Reading name -> fetch operation. Each fetch fails independently.
pub struct Sources {
    fetchers: BTreeMap<Reading, Fetch>,
}

impl Sources {
    pub fn new(entries: impl IntoIterator<Item = (Reading, Fetch)>) -> Result<Self, IngestError> {
        let fetchers: BTreeMap<Reading, Fetch> = entries.into_iter().collect();
        if fetchers.is_empty() {
            return Err(IngestError::NoSources);
        }
        if !fetchers.contains_key(&Reading::Heartbeat) {
            return Err(IngestError::NoHeartbeatSource);
        }
        Ok(Self { fetchers })
    }

    /// Every reading backed by `<dir>/<MESSAGE>.json`.
    pub fn param_dir(dir: impl AsRef<Path>) -> Result<Self, IngestError> {
        let dir = dir.as_ref().to_path_buf();
        Self::new(Reading::ALL.into_iter().map(|r| {
            let path = dir.join(r.file_name());
            (r, json_file_fetch(path))
        }))
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// `None` when no source is registered for `reading`.
    pub fn fetch(&mut self, reading: Reading) -> Option<Result<Value>> {
        self.fetchers.get_mut(&reading).map(|f| f())
    }
}

pub fn json_file_fetch(path: PathBuf) -> Fetch {
    Box::new(move || read_json_file(&path))
}

pub fn read_json_file(path: &Path) -> Result<Value> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse json {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_set_is_rejected() {
        let err = Sources::new(Vec::new()).err();
        assert_eq!(err, Some(IngestError::NoSources));
    }

    #[test]
    fn heartbeat_source_is_required() {
        let f: Fetch = Box::new(|| Ok(json!({})));
        let err = Sources::new(vec![(Reading::Attitude, f)]).err();
        assert_eq!(err, Some(IngestError::NoHeartbeatSource));
    }

    #[test]
    fn param_dir_reads_message_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("HEARTBEAT.json"), r#"{"mavpackettype":"HEARTBEAT"}"#).unwrap();
        std::fs::write(dir.path().join("ATTITUDE.json"), "{not json").unwrap();

        let mut src = Sources::param_dir(dir.path()).unwrap();
        assert_eq!(src.len(), Reading::ALL.len());

        let hb = src.fetch(Reading::Heartbeat).unwrap().unwrap();
        assert_eq!(hb["mavpackettype"], "HEARTBEAT");
        assert!(src.fetch(Reading::Attitude).unwrap().is_err());
        assert!(src.fetch(Reading::Battery).unwrap().is_err());
    }

    #[test]
    fn file_names_follow_message_names() {
        assert_eq!(Reading::LocalPosition.file_name(), "LOCAL_POSITION_NED.json");
        assert_eq!(Reading::Imu.file_name(), "SCALED_IMU2.json");
    }
}
