//! Operator tool for GeoCOM total stations.
//!
//! Subcommands:
//! - `info`: Serial number, name, firmware, prism type and EDM mode
//! - `laser`: Switch the laser pointer on or off
//! - `measure`: One simple measurement
//! - `search`: ATR search around the current direction
//! - `edm`: Set the EDM mode
//! - `repl`: Send raw `code[,arg...]` requests

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use geocom::{
    Arg, EdmMode, GeoComError, InclinationMode, ReturnCode, SimpleMeasurement, TotalStation,
};
use strum::IntoEnumIterator;
use tracing::{info, Level};

/// Default serial port
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default GeoCOM baud rate
const DEFAULT_BAUD: u32 = 57600;

/// Wait time for the distance in `measure` [ms]
const MEASURE_WAIT_MS: u32 = 150;

/// GeoCOM total station control tool
#[derive(Parser, Debug)]
#[command(name = "geocom_tool")]
#[command(about = "Talk GeoCOM to a motorized total station")]
#[command(version)]
struct Args {
    /// Serial port the instrument is connected to
    #[arg(long, global = true, default_value = DEFAULT_PORT)]
    port: String,

    /// Baud rate configured on the instrument
    #[arg(long, global = true, default_value_t = DEFAULT_BAUD)]
    baud: u32,

    /// Log every frame
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print instrument identification and measurement settings
    Info,

    /// Switch the laser pointer
    Laser {
        #[arg(value_enum)]
        state: Switch,
    },

    /// Take one simple measurement
    Measure,

    /// ATR search for a prism around the current direction
    Search {
        /// Horizontal search window in degrees
        #[arg(long, default_value = "20.0")]
        hz: f64,

        /// Vertical search window in degrees
        #[arg(long, default_value = "20.0")]
        v: f64,
    },

    /// Set the EDM (distance measurement) mode
    Edm {
        #[arg(value_enum)]
        mode: EdmMode,
    },

    /// Interactive raw request loop
    Repl,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut station = TotalStation::open(&args.port, args.baud)
        .with_context(|| format!("Failed to open {} at {} baud", args.port, args.baud))?;

    if !matches!(args.command, Command::Repl) {
        station.device_mut().cancel_token().cancel_on_ctrl_c()?;
    }

    match args.command {
        Command::Info => cmd_info(&mut station),
        Command::Laser { state } => cmd_laser(&mut station, state),
        Command::Measure => cmd_measure(&mut station),
        Command::Search { hz, v } => cmd_search(&mut station, hz, v),
        Command::Edm { mode } => cmd_edm(&mut station, mode),
        Command::Repl => cmd_repl(&mut station),
    }
}

// ==================== Info Command ====================

fn cmd_info(station: &mut TotalStation) -> Result<()> {
    info!("Serial number: {}", station.serial_number()?);
    info!("Instrument:    {}", station.instrument_name()?);
    info!("Firmware:      {}", station.software_version()?);

    let prism = station.prism_type()?;
    info!("Prism:         {} ({})", prism.description(), prism.code());

    match station.edm_mode() {
        Ok(mode) => info!("EDM mode:      {} ({})", mode, mode.code()),
        Err(GeoComError::InvalidParameter(msg)) => info!("EDM mode:      <{msg}>"),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

// ==================== Laser Command ====================

fn cmd_laser(station: &mut TotalStation, state: Switch) -> Result<()> {
    let on = matches!(state, Switch::On);
    station.set_laser_pointer(on)?;
    info!("Laser pointer {}", if on { "on" } else { "off" });
    Ok(())
}

// ==================== Measure Command ====================

fn cmd_measure(station: &mut TotalStation) -> Result<()> {
    let measurement = station.simple_measurement(MEASURE_WAIT_MS, InclinationMode::Automatic)?;
    match measurement {
        SimpleMeasurement::Complete(polar) | SimpleMeasurement::Unverified(polar) => {
            if matches!(measurement, SimpleMeasurement::Unverified(_)) {
                info!("Accuracy could not be verified");
            }
            println!(
                "Hz = {:.6} rad ({:.4}°), V = {:.6} rad ({:.4}°), slope distance = {:.4} m",
                polar.hz,
                polar.hz.to_degrees(),
                polar.v,
                polar.v.to_degrees(),
                polar.slope_distance
            );
        }
        SimpleMeasurement::AnglesOnly { hz, v, code } => {
            println!(
                "Hz = {:.6} rad ({:.4}°), V = {:.6} rad ({:.4}°), no distance: {}",
                hz,
                hz.to_degrees(),
                v,
                v.to_degrees(),
                code.description()
            );
        }
    }
    Ok(())
}

// ==================== Search Command ====================

fn cmd_search(station: &mut TotalStation, hz_deg: f64, v_deg: f64) -> Result<()> {
    if hz_deg <= 0.0 || v_deg <= 0.0 {
        bail!("Search window must be positive, got {hz_deg}° x {v_deg}°");
    }

    info!("Searching {}° x {}°...", hz_deg, v_deg);
    match station.search(hz_deg.to_radians(), v_deg.to_radians()) {
        Ok(()) => {
            let (hz, v) = station.angles(InclinationMode::Automatic)?;
            info!(
                "Prism found at Hz = {:.4}°, V = {:.4}°",
                hz.to_degrees(),
                v.to_degrees()
            );
            Ok(())
        }
        Err(GeoComError::Device {
            code: ReturnCode::NoTarget,
        }) => bail!("No prism found"),
        Err(GeoComError::Device {
            code: ReturnCode::MultipleTargets,
        }) => bail!("Multiple prisms found"),
        Err(e) => Err(e.into()),
    }
}

// ==================== EDM Command ====================

fn cmd_edm(station: &mut TotalStation, mode: EdmMode) -> Result<()> {
    station.set_edm_mode(mode)?;
    let readback = station.edm_mode()?;
    info!("EDM mode set to {} ({})", readback, readback.code());
    Ok(())
}

// ==================== REPL Command ====================

fn cmd_repl(station: &mut TotalStation) -> Result<()> {
    let name = station.instrument_name()?;
    println!("Connected: {name}");
    println!();
    println!("GeoCOM REPL - Enter requests as code[,arg...], 'quit' to exit");
    println!("Examples: 5004, 1004,1, 9029,0.35,0.35,0");
    println!(
        "EDM modes: {}",
        EdmMode::iter()
            .map(|m| format!("{}={}", m.code(), m))
            .collect::<Vec<_>>()
            .join(" ")
    );
    println!();

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break; // EOF
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            println!("Bye!");
            break;
        }

        let (command, args) = match parse_request(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                println!("Error: {e}");
                continue;
            }
        };

        match station.device_mut().send_default(command, &args) {
            Ok(reply) => {
                println!("RC {}", ReturnCode::from_code(reply.return_code));
                for (i, param) in reply.params.iter().enumerate() {
                    println!("  [{i}] {param}");
                }
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    Ok(())
}

/// Split `code[,arg...]` into the RPC number and raw arguments.
fn parse_request(line: &str) -> Result<(u16, Vec<Arg>)> {
    let mut parts = line.split(',').map(str::trim);
    let code = parts.next().unwrap_or_default();
    let command: u16 = code
        .parse()
        .with_context(|| format!("Invalid RPC number: {code:?}"))?;
    let args = parts.filter(|p| !p.is_empty()).map(Arg::raw).collect();
    Ok((command, args))
}
