use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use spot_nav::arena::{to_local_frame, FieldDims, GeoPoint};
use spot_nav::session::SafeSpotSession;
use spot_nav::zones::ZoneSet;
use spot_nav::{doctor as nav_doctor, DetectConfig, FieldConfig, PositionConfig, ZonesConfig};
use spot_proto::detection::DetectionEvent;
use spot_proto::telemetry::TelemetryFrame;
use spot_telemetry::ingest::Ingestor;
use spot_telemetry::poller::{spawn_poller, PollerHandle};
use spot_telemetry::sources::Sources;
use spot_telemetry::{doctor as telemetry_doctor, TelemetryConfig};

#[derive(Debug, Parser)]
#[command(name = "spot", version, about = "safespot - drone telemetry ingest & safe-zone detection")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the config file.
    Doctor,
    /// Poll telemetry, zones and position until ctrl-c; detection events go to stdout as JSON lines.
    Run,
    /// Poll telemetry once and print the frame as JSON.
    Snapshot,
    /// Fetch the zone set once and print it in field coordinates.
    Zones,
    /// Map a lat/lng into the current arena's field coordinates.
    Locate {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    telemetry: TelemetryConfig,
    zones: ZonesConfig,

    position: Option<PositionConfig>,
    field: Option<FieldConfig>,
    detect: Option<DetectConfig>,
}

impl Config {
    fn field_dims(&self) -> FieldDims {
        self.field.as_ref().map(FieldDims::from).unwrap_or_default()
    }
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

fn now_unix_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(&cfg).await?,
        Command::Snapshot => snapshot(&cfg)?,
        Command::Zones => zones_cmd(&cfg)?,
        Command::Locate { lat, lng } => locate(&cfg, lat, lng)?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    validate(cfg)?;
    info!("doctor: OK");
    Ok(())
}

fn validate(cfg: &Config) -> Result<()> {
    telemetry_doctor::check_telemetry(&cfg.telemetry)?;
    if let Some(field) = &cfg.field {
        nav_doctor::check_field(field)?;
    }
    nav_doctor::check_zones(&cfg.zones, &cfg.detect.clone().unwrap_or_default())?;
    nav_doctor::check_position(&cfg.position.clone().unwrap_or_default())?;
    Ok(())
}

fn snapshot(cfg: &Config) -> Result<()> {
    let mut sources = Sources::param_dir(&cfg.telemetry.params_dir)?;
    let mut ingestor = Ingestor::new(cfg.telemetry.ingest_config());
    let snap = ingestor.poll(&mut sources);
    let frame = ingestor.frame(snap, Instant::now());
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

fn zones_cmd(cfg: &Config) -> Result<()> {
    let field = cfg.field_dims();
    let mut src = cfg.zones.build_source()?;
    let set = src.fetch().with_context(|| format!("fetch zones from {}", src.describe()))?;

    println!("source={}", src.describe());
    if let Some(why) = &set.degraded {
        println!("DEGRADED: {}", why);
    }
    println!("arena complete={} corners={}", set.arena.is_complete(), set.arena.corners().len());
    for (c, l) in set.arena.corners().iter().zip(set.arena.local_corners(field)) {
        println!("corner lat={:.6} lng={:.6} -> x={:.2} y={:.2}", c.lat, c.lng, l.x, l.y);
    }
    for z in &set.zones {
        let l = to_local_frame(z.geo(), &set.arena, field);
        println!("zone {} lat={:.6} lng={:.6} -> x={:.2} y={:.2}", z.id, z.lat, z.lng, l.x, l.y);
    }
    for ev in &set.events {
        println!("event {:?} {} {}", ev.kind, ev.timestamp, ev.message);
    }
    Ok(())
}

fn locate(cfg: &Config, lat: f64, lng: f64) -> Result<()> {
    let field = cfg.field_dims();
    let set = cfg.zones.build_source()?.fetch()?;
    let p = to_local_frame(GeoPoint::new(lat, lng), &set.arena, field);
    println!("x={:.3} y={:.3} (arena complete={})", p.x, p.y, set.arena.is_complete());
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting");
    validate(cfg).context("config rejected, see `spot doctor`")?;
    let field = cfg.field_dims();
    let detect_cfg = cfg.detect.clone().unwrap_or_default();
    let pos_cfg = cfg.position.clone().unwrap_or_default();

    // Telemetry: ingestor state lives inside the poller; latest frame is published.
    let (tel_tx, mut tel_rx) = watch::channel(TelemetryFrame::default());
    let mut sources = Sources::param_dir(&cfg.telemetry.params_dir)?;
    let mut ingestor = Ingestor::new(cfg.telemetry.ingest_config());
    let telemetry = spawn_poller("telemetry", cfg.telemetry.poll_period(), move || {
        let snap = ingestor.poll(&mut sources);
        tel_tx.send_replace(ingestor.frame(snap, Instant::now()));
    });

    // Zones: a failed refresh keeps the previous set.
    let (zone_tx, mut zone_rx) = watch::channel::<Option<ZoneSet>>(None);
    let mut zone_src = cfg.zones.build_source()?;
    info!("run: zones from {}", zone_src.describe());
    let zones = spawn_poller("zones", cfg.zones.refresh_period(), move || match zone_src.fetch() {
        Ok(set) => {
            zone_tx.send_replace(Some(set));
        }
        Err(e) => warn!("zones: refresh failed, keeping previous set: {:#}", e),
    });

    // Position + detection: the session owns the detected set.
    let (ev_tx, mut ev_rx) = mpsc::unbounded_channel::<DetectionEvent>();
    let mut session = SafeSpotSession::new(detect_cfg.detector(field), detect_cfg.total_zones())?;
    let mut pos_src = pos_cfg.build_source(&cfg.telemetry.params_dir, field);
    info!("run: position from {}", pos_src.describe());
    let detect = spawn_poller("detect", pos_cfg.poll_period(), move || {
        if zone_rx.has_changed().unwrap_or(false) {
            if let Some(set) = zone_rx.borrow_and_update().clone() {
                session.update_zones(set);
            }
        }
        let Some(p) = pos_src.read(&session.zones().arena) else {
            return;
        };
        for ev in session.step(p, now_unix_ms()) {
            let _ = ev_tx.send(ev);
        }
    });

    let pollers = [telemetry, zones, detect];
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut watchdog = tokio::time::interval(Duration::from_secs(1));
    let mut was_connected = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("run: ctrl-c, shutting down");
                break;
            }
            _ = watchdog.tick() => {
                if let Some(dead) = pollers.iter().find(|h| h.is_finished()) {
                    error!("run: poller {} ended unexpectedly, shutting down", dead.name());
                    break;
                }
            }
            Some(ev) = ev_rx.recv() => {
                println!("{}", serde_json::to_string(&ev)?);
                if ev.mission_complete {
                    info!("run: MISSION COMPLETE ({})", ev.progress());
                }
            }
            changed = tel_rx.changed() => {
                if changed.is_err() {
                    warn!("run: telemetry poller ended");
                    break;
                }
                let frame = tel_rx.borrow_and_update().clone();
                if frame.connected != was_connected {
                    info!("run: telemetry connected={} hb_age={:?}ms", frame.connected, frame.heartbeat_age_ms);
                    was_connected = frame.connected;
                }
                let s = &frame.snapshot;
                let pos = s.local_position_or_zero();
                let bat = s.battery_or_zero();
                debug!(
                    "telemetry: alt={:.1}m gs={:.1}m/s yaw={:.2}rad bat={}% cpu={}% mem={}%",
                    pos.altitude_m(), pos.ground_speed_mps(), s.attitude_or_zero().yaw,
                    bat.remaining_percent, s.system_health.cpu_load_percent, s.system_health.memory_usage_percent,
                );
            }
        }
    }

    let mut failed = None;
    for h in pollers {
        if let Err(e) = stop_poller(h).await {
            error!("run: {:#}", e);
            failed.get_or_insert(e);
        }
    }
    info!("run: stopped");
    failed.map_or(Ok(()), Err)
}

async fn stop_poller(h: PollerHandle) -> Result<()> {
    let name = h.name();
    let ticks = h.stop().await?;
    info!("run: poller {} stopped after {} ticks", name, ticks);
    Ok(())
}
