//! Command catalogue for motorized total stations.
//!
//! [`TotalStation`] wraps a [`GeoComDevice`] with one typed method per RPC.
//! Every method is a single round trip using the timeout from
//! [`Command::timeout`]; a nonzero return code becomes
//! [`GeoComError::Device`] unless the method documents otherwise.
//!
//! Angles are in radians, distances in metres.
//!
//! # Example
//!
//! ```no_run
//! use geocom::{InclinationMode, SimpleMeasurement, TotalStation};
//!
//! let mut station = TotalStation::open("/dev/ttyUSB0", 57600)?;
//! println!("Instrument: {}", station.instrument_name()?);
//! station.set_laser_pointer(true)?;
//! match station.simple_measurement(150, InclinationMode::Automatic)? {
//!     SimpleMeasurement::Complete(polar) => println!("{polar:?}"),
//!     other => println!("partial: {other:?}"),
//! }
//! # Ok::<(), geocom::GeoComError>(())
//! ```

use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::device::GeoComDevice;
use crate::error::{GeoComError, GeoComResult};
use crate::frame::{Arg, Response};
use crate::params::{
    AtrMode, Command, EdmMode, InclinationMode, MeasureCommand, MeasurementProgram,
    PositionMode, PrismType, ReturnCode, ShutdownMode, StartupMode, TargetType,
};
use crate::transport::{SerialTransport, Transport};

/// Angles and slope distance of one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarMeasurement {
    /// Horizontal angle [rad]
    pub hz: f64,
    /// Vertical (zenith) angle [rad]
    pub v: f64,
    /// Slope distance [m]
    pub slope_distance: f64,
}

/// Result of `TMC_GetSimpleMea`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimpleMeasurement {
    /// Angles and distance are valid.
    Complete(PolarMeasurement),
    /// Angles and distance present, accuracy not verified (1284).
    Unverified(PolarMeasurement),
    /// No distance available (1285 or 1288).
    AnglesOnly { hz: f64, v: f64, code: ReturnCode },
}

/// Outcome of switching the instrument on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    SwitchedOn,
    AlreadyOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftwareVersion {
    pub release: i32,
    pub version: i32,
    pub subversion: i32,
}

impl std::fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.release, self.version, self.subversion)
    }
}

/// PowerSearch / ATR working area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchArea {
    pub center_hz: f64,
    pub center_v: f64,
    pub range_hz: f64,
    pub range_v: f64,
    pub enabled: bool,
}

/// Typed GeoCOM client.
pub struct TotalStation<T: Transport = SerialTransport, C: Clock = SystemClock> {
    device: GeoComDevice<T, C>,
}

impl TotalStation<SerialTransport, SystemClock> {
    /// Open the serial link (8N1, no flow control).
    ///
    /// # Errors
    ///
    /// Returns [`GeoComError::ConnectionFailed`] if the port cannot be opened.
    pub fn open(port: &str, baud_rate: u32) -> GeoComResult<Self> {
        let device = GeoComDevice::open(port, baud_rate)?;
        info!("Connected to total station on {}", port);
        Ok(Self::new(device))
    }
}

impl<T: Transport, C: Clock> TotalStation<T, C> {
    pub fn new(device: GeoComDevice<T, C>) -> Self {
        Self { device }
    }

    /// Underlying engine, for raw requests.
    pub fn device_mut(&mut self) -> &mut GeoComDevice<T, C> {
        &mut self.device
    }

    pub fn into_device(self) -> GeoComDevice<T, C> {
        self.device
    }

    fn call(&mut self, command: Command, args: &[Arg]) -> GeoComResult<Response> {
        self.device
            .send(command.code(), args, command.timeout())?
            .ensure_success()
    }

    // ==================== COM / CSV ====================

    /// Switch the instrument on.
    ///
    /// Return code 5 means the instrument is already on and is not an error.
    pub fn switch_on(&mut self, mode: StartupMode) -> GeoComResult<PowerState> {
        let command = Command::SwitchOn;
        let reply = self
            .device
            .send(command.code(), &[mode.code().into()], command.timeout())?;
        match ReturnCode::from_code(reply.return_code) {
            ReturnCode::Ok => {
                info!("Instrument switched on");
                Ok(PowerState::SwitchedOn)
            }
            ReturnCode::NotImplemented => {
                info!("Instrument already on");
                Ok(PowerState::AlreadyOn)
            }
            code => Err(GeoComError::Device { code }),
        }
    }

    pub fn switch_off(&mut self, mode: ShutdownMode) -> GeoComResult<()> {
        self.call(Command::SwitchOff, &[mode.code().into()])?;
        info!("Instrument switched off");
        Ok(())
    }

    pub fn software_version(&mut self) -> GeoComResult<SoftwareVersion> {
        let reply = self.call(Command::GetSwVersion, &[])?;
        Ok(SoftwareVersion {
            release: reply.parse_param(0)?,
            version: reply.parse_param(1)?,
            subversion: reply.parse_param(2)?,
        })
    }

    /// Factory serial number.
    pub fn serial_number(&mut self) -> GeoComResult<String> {
        let reply = self.call(Command::GetInstrumentNo, &[])?;
        reply.string_param(0)
    }

    /// Instrument name, e.g. "TS16 R500".
    pub fn instrument_name(&mut self) -> GeoComResult<String> {
        let reply = self.call(Command::GetInstrumentName, &[])?;
        reply.string_param(0)
    }

    // ==================== EDM / TMC ====================

    pub fn set_laser_pointer(&mut self, on: bool) -> GeoComResult<()> {
        self.call(Command::LaserPointer, &[on.into()])?;
        debug!("Laser pointer {}", if on { "on" } else { "off" });
        Ok(())
    }

    /// Set the current horizontal direction as Hz = 0.
    pub fn set_orientation(&mut self) -> GeoComResult<()> {
        self.call(Command::SetOrientation, &[0.0_f64.into()])?;
        Ok(())
    }

    pub fn set_edm_mode(&mut self, mode: EdmMode) -> GeoComResult<()> {
        self.call(Command::SetEdmMode, &[mode.code().into()])?;
        Ok(())
    }

    /// Current EDM mode. A code outside the known modes is an invalid
    /// parameter.
    pub fn edm_mode(&mut self) -> GeoComResult<EdmMode> {
        let reply = self.call(Command::GetEdmMode, &[])?;
        let code: u16 = reply.parse_param(0)?;
        EdmMode::from_code(code)
            .ok_or_else(|| GeoComError::InvalidParameter(format!("unknown EDM mode {code}")))
    }

    /// Start (or stop) a distance measurement. Produces no values.
    pub fn do_measure(
        &mut self,
        command: MeasureCommand,
        inclination: InclinationMode,
    ) -> GeoComResult<()> {
        self.call(
            Command::DoMeasure,
            &[command.code().into(), inclination.code().into()],
        )?;
        Ok(())
    }

    /// Angles and slope distance of the running measurement.
    ///
    /// `wait_ms` is how long the instrument waits for the distance before
    /// falling back to angles only.
    pub fn simple_measurement(
        &mut self,
        wait_ms: u32,
        inclination: InclinationMode,
    ) -> GeoComResult<SimpleMeasurement> {
        let command = Command::GetSimpleMeasurement;
        let reply = self.device.send(
            command.code(),
            &[wait_ms.into(), inclination.code().into()],
            command.timeout(),
        )?;

        match ReturnCode::from_code(reply.return_code) {
            ReturnCode::Ok => Ok(SimpleMeasurement::Complete(polar_from(&reply)?)),
            ReturnCode::AccuracyNotGuaranteed => {
                Ok(SimpleMeasurement::Unverified(polar_from(&reply)?))
            }
            code @ (ReturnCode::AnglesOnly | ReturnCode::AnglesOnlyUncorrected) => {
                Ok(SimpleMeasurement::AnglesOnly {
                    hz: reply.parse_param(0)?,
                    v: reply.parse_param(1)?,
                    code,
                })
            }
            code => Err(GeoComError::Device { code }),
        }
    }

    /// Horizontal and vertical angle.
    pub fn angles(&mut self, inclination: InclinationMode) -> GeoComResult<(f64, f64)> {
        let reply = self.call(Command::GetAngle, &[inclination.code().into()])?;
        Ok((reply.parse_param(0)?, reply.parse_param(1)?))
    }

    /// Easting, northing and height of the target.
    pub fn coordinates(
        &mut self,
        wait_ms: u32,
        inclination: InclinationMode,
    ) -> GeoComResult<(f64, f64, f64)> {
        let reply = self.call(
            Command::GetCoordinate,
            &[wait_ms.into(), inclination.code().into()],
        )?;
        Ok((
            reply.parse_param(0)?,
            reply.parse_param(1)?,
            reply.parse_param(2)?,
        ))
    }

    // ==================== BAP ====================

    pub fn set_prism_type(&mut self, prism: PrismType) -> GeoComResult<()> {
        self.call(Command::SetPrismType, &[prism.code().into()])?;
        info!("Prism type set to {}", prism.description());
        Ok(())
    }

    pub fn prism_type(&mut self) -> GeoComResult<PrismType> {
        let reply = self.call(Command::GetPrismType, &[])?;
        Ok(PrismType::from_code(reply.parse_param(0)?))
    }

    pub fn set_target_type(&mut self, target: TargetType) -> GeoComResult<()> {
        self.call(Command::SetTargetType, &[target.code().into()])?;
        Ok(())
    }

    pub fn target_type(&mut self) -> GeoComResult<TargetType> {
        let reply = self.call(Command::GetTargetType, &[])?;
        Ok(TargetType::from_code(reply.parse_param(0)?))
    }

    pub fn set_measurement_program(&mut self, program: MeasurementProgram) -> GeoComResult<()> {
        self.call(Command::SetMeasurementProgram, &[program.code().into()])?;
        Ok(())
    }

    pub fn measurement_program(&mut self) -> GeoComResult<MeasurementProgram> {
        let reply = self.call(Command::GetMeasurementProgram, &[])?;
        Ok(MeasurementProgram::from_code(reply.parse_param(0)?))
    }

    // ==================== AUT ====================

    /// Turn the telescope to the given angles.
    pub fn make_positioning(
        &mut self,
        hz: f64,
        v: f64,
        position: PositionMode,
        atr: AtrMode,
    ) -> GeoComResult<()> {
        self.call(
            Command::MakePositioning,
            &[
                hz.into(),
                v.into(),
                position.code().into(),
                atr.code().into(),
                false.into(),
            ],
        )?;
        Ok(())
    }

    /// ATR search for a prism within the given window around the current
    /// direction.
    pub fn search(&mut self, hz_area: f64, v_area: f64) -> GeoComResult<()> {
        self.call(Command::Search, &[hz_area.into(), v_area.into(), false.into()])?;
        Ok(())
    }

    /// Centre the crosshair on a target that is already in view.
    pub fn fine_adjust(&mut self, hz_range: f64, v_range: f64) -> GeoComResult<()> {
        self.call(
            Command::FineAdjust,
            &[hz_range.into(), v_range.into(), false.into()],
        )?;
        Ok(())
    }

    /// Start following the locked prism.
    pub fn lock_in(&mut self) -> GeoComResult<()> {
        self.call(Command::LockIn, &[])?;
        Ok(())
    }

    pub fn search_area(&mut self) -> GeoComResult<SearchArea> {
        let reply = self.call(Command::GetSearchArea, &[])?;
        let enabled: i32 = reply.parse_param(4)?;
        Ok(SearchArea {
            center_hz: reply.parse_param(0)?,
            center_v: reply.parse_param(1)?,
            range_hz: reply.parse_param(2)?,
            range_v: reply.parse_param(3)?,
            enabled: enabled != 0,
        })
    }

    pub fn set_search_area(&mut self, area: &SearchArea) -> GeoComResult<()> {
        self.call(
            Command::SetSearchArea,
            &[
                area.center_hz.into(),
                area.center_v.into(),
                area.range_hz.into(),
                area.range_v.into(),
                area.enabled.into(),
            ],
        )?;
        Ok(())
    }

    /// Distance limits [m] for PowerSearch.
    pub fn ps_set_range(&mut self, min_distance: i32, max_distance: i32) -> GeoComResult<()> {
        self.call(
            Command::PsSetRange,
            &[min_distance.into(), max_distance.into()],
        )?;
        Ok(())
    }

    pub fn ps_enable_range(&mut self, enable: bool) -> GeoComResult<()> {
        self.call(Command::PsEnableRange, &[enable.into()])?;
        Ok(())
    }

    /// Run PowerSearch inside the configured search area.
    pub fn ps_search_window(&mut self) -> GeoComResult<()> {
        self.call(Command::PsSearchWindow, &[])?;
        Ok(())
    }

    // ==================== AUS ====================

    pub fn set_user_lock_state(&mut self, on: bool) -> GeoComResult<()> {
        self.call(Command::SetUserLockState, &[on.into()])?;
        Ok(())
    }

    pub fn user_lock_state(&mut self) -> GeoComResult<bool> {
        let reply = self.call(Command::GetUserLockState, &[])?;
        let state: i32 = reply.parse_param(0)?;
        Ok(state != 0)
    }

    pub fn set_user_atr_state(&mut self, on: bool) -> GeoComResult<()> {
        self.call(Command::SetUserAtrState, &[on.into()])?;
        Ok(())
    }

    pub fn user_atr_state(&mut self) -> GeoComResult<bool> {
        let reply = self.call(Command::GetUserAtrState, &[])?;
        let state: i32 = reply.parse_param(0)?;
        Ok(state != 0)
    }
}

fn polar_from(reply: &Response) -> GeoComResult<PolarMeasurement> {
    Ok(PolarMeasurement {
        hz: reply.parse_param(0)?,
        v: reply.parse_param(1)?,
        slope_distance: reply.parse_param(2)?,
    })
}
