//! Track a 360° prism and print its Cartesian position.
//!
//! Sets the station up (laser on, orientation along the x axis, prism type,
//! laser off), then searches, locks and measures continuously until Ctrl-C
//! or `--count` readings. Each reading is printed on its own line:
//!
//! - `0;x;y;z;` complete measurement
//! - `1;x;y;z;` accuracy could not be verified
//! - `2` angles only
//! - `3` instrument error or unusable reply
//! - `4` communication error or undecodable reply

use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use geocom::{GeoComError, PrismType, TotalStation};
use log::{error, info, warn};
use prism_tracker::{TrackerConfig, TrackingController, COMMUNICATION_ERROR_LINE};
use tracing_subscriber::filter::LevelFilter;

/// Pause after switching the laser on so the operator can see it
const LASER_SETTLE: Duration = Duration::from_secs(3);

/// Prism tracking with a GeoCOM total station
#[derive(Parser, Debug)]
#[command(name = "prism_track")]
#[command(about = "Search, lock and continuously measure a prism")]
#[command(version)]
struct Args {
    /// Serial port the instrument is connected to
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    port: String,

    /// Baud rate configured on the instrument
    #[arg(short, long, default_value_t = 57600)]
    baud: u32,

    /// Log every frame
    #[arg(short, long)]
    debug: bool,

    /// Big 360° prism instead of the mini 360° prism
    #[arg(short = 'B', long)]
    big_prism: bool,

    /// Tracker configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many readings
    #[arg(long)]
    count: Option<u64>,

    /// Ask the operator to aim the station during setup
    #[arg(long)]
    manual: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match &args.config {
        Some(path) => TrackerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    info!("Opening port {} at {} baud", args.port, args.baud);
    let mut station = TotalStation::open(&args.port, args.baud)
        .with_context(|| format!("Failed to open {} at {} baud", args.port, args.baud))?;

    let cancel = station.device_mut().cancel_token();
    cancel.cancel_on_ctrl_c()?;

    setup_station(&mut station, &args)?;

    let retry_on_error = config.recover_retry();
    let mut tracker = TrackingController::new(station, config);
    tracker.start();

    let mut readings = 0u64;
    while !cancel.is_cancelled() {
        match tracker.step() {
            Ok(Some(reading)) => {
                println!("{reading}");
                readings += 1;
                if args.count.is_some_and(|count| readings >= count) {
                    break;
                }
            }
            Ok(None) => {
                if let Some(delay) = tracker.retry_delay() {
                    thread::sleep(delay);
                }
            }
            Err(GeoComError::Cancelled) => break,
            Err(e @ (GeoComError::Communication(_) | GeoComError::MalformedFrame(_))) => {
                println!("{COMMUNICATION_ERROR_LINE}");
                error!("{e}");
                thread::sleep(retry_on_error);
            }
            Err(e) => return Err(e.into()),
        }
        io::stdout().flush()?;
    }

    tracker.stop();
    info!("Tracking stopped after {} readings", readings);
    Ok(())
}

/// Laser on, orientation, prism type, laser off.
fn setup_station(station: &mut TotalStation, args: &Args) -> Result<()> {
    info!("Setting up station");
    station.set_laser_pointer(true)?;
    if args.manual {
        prompt("Put the laser on the x axis and press <enter>")?;
    } else {
        thread::sleep(LASER_SETTLE);
    }

    station.set_orientation()?;
    info!("Cartesian frame set: station at origin, x axis along the laser");

    let prism = if args.big_prism {
        PrismType::Prism360
    } else {
        PrismType::Mini360
    };
    station.set_prism_type(prism)?;

    if args.manual {
        prompt("Direct the station to the prism and press <enter>")?;
    }
    if let Err(e) = station.set_laser_pointer(false) {
        warn!("Failed to switch the laser off: {e}");
    }
    Ok(())
}

fn prompt(message: &str) -> Result<()> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(())
}
