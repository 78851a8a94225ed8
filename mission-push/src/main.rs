// mission-push/src/main.rs
// Uploads a stored mission, a parameter list or a single command to a
// MAVLink ground station and prints the upload report as JSON.

mod import;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, warn, LevelFilter};
use mission_uplink::{
    MissionUploader, TelemetryTicker, UploadResult, UplinkConfig, UploadSession,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CLI args
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "mission-push", about = "Upload missions to a MAVLink ground station")]
struct Args {
    /// TOML config file; built-in defaults otherwise.
    #[arg(long)] config: Option<PathBuf>,
    /// Overrides `ground_station.host`.
    #[arg(long)] host:   Option<String>,
    /// Overrides `ground_station.port`.
    #[arg(long)] port:   Option<u16>,
    /// -v for debug, -vv for trace.
    #[arg(short, long, action = ArgAction::Count)] verbose: u8,
    /// Log link telemetry samples while uploading.
    #[arg(long)] telemetry: bool,
    #[command(subcommand)] action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Waypoints, then geofence and rally points (JSON or planner XML).
    Mission { file: PathBuf },
    /// Vehicle parameters from a JSON array of { name, value }.
    Params { file: PathBuf },
    /// Single COMMAND_LONG by name (WAYPOINT, TAKEOFF, LAND, RTL, ...).
    Command {
        name: String,
        /// Command params 1-7 in order; missing ones are 0.
        #[arg(long = "param", allow_negative_numbers = true)]
        params: Vec<f32>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => UplinkConfig::load(path)?,
        None => UplinkConfig::default(),
    };
    if let Some(host) = args.host { config.ground_station.host = host; }
    if let Some(port) = args.port { config.ground_station.port = port; }
    config.validate()?;

    let session = Arc::new(UploadSession::udp());
    let gs = &config.ground_station;
    session
        .connect(&gs.host, gs.port)
        .with_context(|| format!("Failed to connect to {}:{}", gs.host, gs.port))?;

    let ticker = args.telemetry.then(|| spawn_telemetry_log(&session, &config));
    let uploader = MissionUploader::new(config.pacing.to_policy());

    let outcome = match args.action {
        Action::Mission { file } => {
            let mission = import::load_mission(&file)?;
            let report = uploader.upload_complete_mission(&session, &mission);
            print_json(&report)?;
            if report.is_success() {
                if !report.all_succeeded() {
                    warn!("Mission deployed, but an optional phase failed");
                }
                Ok(())
            } else {
                failure(&report.waypoints)
            }
        }
        Action::Params { file } => {
            let params = import::load_parameters(&file)?;
            let result = uploader.upload_parameters(&session, &params);
            print_json(&result)?;
            failure(&result)
        }
        Action::Command { name, params } => {
            if params.len() > 7 {
                bail!("COMMAND_LONG takes at most 7 params, got {}", params.len());
            }
            let mut p = [0.0f32; 7];
            p[..params.len()].copy_from_slice(&params);
            let result = uploader.send_named_command(&session, &name, p);
            print_json(&result)?;
            failure(&result)
        }
    };

    if let Some(ticker) = ticker {
        ticker.stop();
    }
    session.disconnect();
    outcome
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Telemetry samples go to the log as JSON lines; stdout is kept for the
/// report.
fn spawn_telemetry_log(session: &Arc<UploadSession>, config: &UplinkConfig) -> TelemetryTicker {
    let ticker = TelemetryTicker::spawn(Arc::clone(session), config.telemetry.interval());
    let rx = ticker.subscribe();
    std::thread::spawn(move || {
        for sample in rx {
            match serde_json::to_string(&sample) {
                Ok(line) => info!("telemetry {line}"),
                Err(e) => warn!("Unserializable telemetry sample: {e}"),
            }
        }
    });
    ticker
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn failure(result: &UploadResult) -> Result<()> {
    let Some(f) = &result.failure else { return Ok(()) };
    let last = result
        .last_delivered()
        .map_or_else(|| "none".to_string(), |i| i.to_string());
    bail!(
        "{} upload failed at {:?}: {} (last delivered index: {last})",
        result.phase, f.at, f.error
    )
}
