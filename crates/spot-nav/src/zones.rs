//! Zone/arena data file: parsing and sources.
//!
//! ```text
//! DronePosition: [12.0330, 77.1250]
//!
//! Arena:
//! Corner1: [12.0345, 77.1234]
//! ...
//! SafeSpots:
//! Spot1: [12.0331, 77.1245]
//! ...
//! Events:
//! Event1: takeoff | 2025-07-28T08:30:00.000Z | Drone taking off from base
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::arena::{ArenaFrame, GeoPoint};
use crate::detect::SafeZone;

pub const DEFAULT_MAX_ZONES: usize = 3;

/// Last-resort dataset served when the zone file cannot be read.
pub const MOCK_ZONE_FILE: &str = "DronePosition: [0.0, 0.0]

Arena:
Corner1: [37.7749, -122.4194]
Corner2: [37.7749, -122.4144]
Corner3: [37.7699, -122.4144]
Corner4: [37.7699, -122.4194]

Detected Safe Spots
SafeSpots:
Spot1: [37.7730, -122.4180]
Spot2: [37.7720, -122.4170]
Spot3: [37.7710, -122.4160]
";

/// The 9x12 m test arena.
pub const REFERENCE_ZONE_FILE: &str = "DronePosition: [12.0330, 77.1250]

Arena:
Corner1: [12.0315, 77.1234]
Corner2: [12.0345, 77.1234]
Corner3: [12.0345, 77.1265]
Corner4: [12.0315, 77.1265]

SafeSpots:
Spot1: [12.0338, 77.1245]
Spot2: [12.0338, 77.1263]
Spot3: [12.0323, 77.1263]

Events:
Event1: takeoff | 2025-07-28T08:30:00.000Z | Drone taking off from base
Event2: waypoint_reached | 2025-07-28T08:31:00.000Z | Reached waypoint 1 at [12.0338, 77.1245]
Event3: mission_start | 2025-07-28T08:32:00.000Z | Starting mission patrol
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneEventKind {
    Takeoff,
    Landing,
    MissionStart,
    MissionComplete,
    Emergency,
    WaypointReached,
}

impl DroneEventKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "takeoff" => Self::Takeoff,
            "landing" => Self::Landing,
            "mission_start" => Self::MissionStart,
            "mission_complete" => Self::MissionComplete,
            "emergency" => Self::Emergency,
            "waypoint_reached" => Self::WaypointReached,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneEvent {
    pub kind: DroneEventKind,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub message: String,
    pub coordinates: Option<GeoPoint>,
}

/// Everything one fetch of the zone file yields. Replaced wholesale on each
/// successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSet {
    pub arena: ArenaFrame,
    pub zones: Vec<SafeZone>,
    pub drone_position: Option<GeoPoint>,
    pub events: Vec<DroneEvent>,
    /// Set when this data is the fallback dataset, with the reason.
    pub degraded: Option<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ZoneFileError {
    #[error("zone file is empty")]
    Empty,
    #[error("zone file has no arena corners or safe spots")]
    NoContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Arena,
    Spots,
    Events,
}

/// Parses the zone file. Unknown and malformed lines are skipped; at most
/// `max_zones` safe spots are kept.
pub fn parse_zone_file(content: &str, max_zones: usize) -> Result<ZoneSet, ZoneFileError> {
    let mut set = ZoneSet::default();
    let mut corners = Vec::new();
    let mut section = Section::None;
    let mut saw_line = false;

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        saw_line = true;

        if let Some(rest) = line.strip_prefix("DronePosition:") {
            set.drone_position = parse_bracket_pair(rest);
            continue;
        }
        match line {
            "Arena:" => { section = Section::Arena; continue; }
            "Detected Safe Spots" | "SafeSpots:" => { section = Section::Spots; continue; }
            "Events:" => { section = Section::Events; continue; }
            _ => {}
        }

        let Some((name, rest)) = line.split_once(':') else {
            debug!("zones: ignoring line {:?}", line);
            continue;
        };
        let name = name.trim();

        match section {
            Section::Arena if is_numbered(name, "Corner") => match parse_bracket_pair(rest) {
                Some(p) => corners.push(p),
                None => warn!("zones: malformed corner line {:?}", line),
            },
            Section::Spots if is_numbered(name, "Spot") => {
                if set.zones.len() >= max_zones {
                    debug!("zones: dropping {} (max {} zones)", name, max_zones);
                    continue;
                }
                match parse_bracket_pair(rest) {
                    Some(p) => set.zones.push(SafeZone::new(name, p.lat, p.lng)),
                    None => warn!("zones: malformed spot line {:?}", line),
                }
            }
            Section::Events if is_numbered(name, "Event") => match parse_event(rest) {
                Some(ev) => set.events.push(ev),
                None => warn!("zones: malformed event line {:?}", line),
            },
            _ => debug!("zones: ignoring line {:?}", line),
        }
    }

    if !saw_line {
        return Err(ZoneFileError::Empty);
    }
    if corners.is_empty() && set.zones.is_empty() {
        return Err(ZoneFileError::NoContent);
    }
    set.arena = ArenaFrame::new(corners);
    Ok(set)
}

fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// First `[lat, lng]` pair in `s`.
fn parse_bracket_pair(s: &str) -> Option<GeoPoint> {
    let open = s.find('[')?;
    let close = open + s[open..].find(']')?;
    let (lat, lng) = s[open + 1..close].split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    Some(GeoPoint::new(lat, lng))
}

/// `<kind> | <rfc3339 timestamp> | <message>`
fn parse_event(s: &str) -> Option<DroneEvent> {
    let mut parts = s.splitn(3, '|');
    let kind = DroneEventKind::parse(parts.next()?.trim())?;
    let timestamp = OffsetDateTime::parse(parts.next()?.trim(), &Rfc3339).ok()?;
    let message = parts.next()?.trim().to_string();
    let coordinates = parse_bracket_pair(&message);
    Some(DroneEvent { kind, timestamp, message, coordinates })
}

/// Anything that can hand over a fresh zone set. The detector does not care
/// which implementation produced it.
pub trait ZoneSource: Send {
    fn fetch(&mut self) -> Result<ZoneSet>;

    fn describe(&self) -> String;
}

/// Reads a local copy of the zone file. Getting the file onto this host is
/// someone else's job.
pub struct FileZoneSource {
    path: PathBuf,
    max_zones: usize,
}

impl FileZoneSource {
    pub fn new(path: impl Into<PathBuf>, max_zones: usize) -> Self {
        Self { path: path.into(), max_zones }
    }
}

impl ZoneSource for FileZoneSource {
    fn fetch(&mut self) -> Result<ZoneSet> {
        let s = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read zone file {}", self.path.display()))?;
        let set = parse_zone_file(&s, self.max_zones)
            .with_context(|| format!("parse zone file {}", self.path.display()))?;
        Ok(set)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

pub struct StaticZoneSource {
    set: ZoneSet,
    name: String,
}

impl StaticZoneSource {
    pub fn new(name: impl Into<String>, set: ZoneSet) -> Self {
        Self { set, name: name.into() }
    }

    pub fn from_text(name: impl Into<String>, content: &str, max_zones: usize) -> Result<Self> {
        let set = parse_zone_file(content, max_zones).context("parse built-in zone data")?;
        Ok(Self::new(name, set))
    }

    pub fn mock(max_zones: usize) -> Result<Self> {
        Self::from_text("mock", MOCK_ZONE_FILE, max_zones)
    }

    pub fn reference(max_zones: usize) -> Result<Self> {
        Self::from_text("reference", REFERENCE_ZONE_FILE, max_zones)
    }
}

impl ZoneSource for StaticZoneSource {
    fn fetch(&mut self) -> Result<ZoneSet> {
        Ok(self.set.clone())
    }

    fn describe(&self) -> String {
        format!("static:{}", self.name)
    }
}

/// Serves `fallback` (marked degraded) whenever `primary` fails.
pub struct FallbackZoneSource {
    primary: Box<dyn ZoneSource>,
    fallback: Box<dyn ZoneSource>,
}

impl FallbackZoneSource {
    pub fn new(primary: Box<dyn ZoneSource>, fallback: Box<dyn ZoneSource>) -> Self {
        Self { primary, fallback }
    }
}

impl ZoneSource for FallbackZoneSource {
    fn fetch(&mut self) -> Result<ZoneSet> {
        match self.primary.fetch() {
            Ok(set) => Ok(set),
            Err(e) => {
                warn!("zones: {} failed: {:#}; using {}", self.primary.describe(), e, self.fallback.describe());
                let mut set = self.fallback.fetch()?;
                set.degraded = Some(format!("{:#}", e));
                Ok(set)
            }
        }
    }

    fn describe(&self) -> String {
        format!("{} (fallback {})", self.primary.describe(), self.fallback.describe())
    }
}
