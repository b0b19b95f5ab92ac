//! Typed GeoCOM parameters and return codes.
//!
//! The instrument speaks in bare integers. Every enumeration here has an
//! exhaustive `code()`/`from_code()` pair; codes the firmware may legally
//! return but that are not listed map to an `Unknown(code)` variant instead
//! of failing.

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Return code of a GeoCOM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    Ok,
    Undefined,
    InvalidParameter,
    /// Function not implemented. `COM_SwitchOnTPS` uses it for "already on".
    NotImplemented,
    BadArguments,
    NotCompleted,
    /// Angles and distance returned but accuracy could not be verified.
    AccuracyNotGuaranteed,
    /// Only angles could be measured.
    AnglesOnly,
    /// Only angles, without inclination correction.
    AnglesOnlyUncorrected,
    TimedOut,
    NoTarget,
    MultipleTargets,
    NoWorkingArea,
    Unknown(u16),
}

impl ReturnCode {
    pub fn code(self) -> u16 {
        match self {
            ReturnCode::Ok => 0,
            ReturnCode::Undefined => 1,
            ReturnCode::InvalidParameter => 2,
            ReturnCode::NotImplemented => 5,
            ReturnCode::BadArguments => 7,
            ReturnCode::NotCompleted => 26,
            ReturnCode::AccuracyNotGuaranteed => 1284,
            ReturnCode::AnglesOnly => 1285,
            ReturnCode::AnglesOnlyUncorrected => 1288,
            ReturnCode::TimedOut => 3077,
            ReturnCode::NoTarget => 8710,
            ReturnCode::MultipleTargets => 8711,
            ReturnCode::NoWorkingArea => 8720,
            ReturnCode::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            0 => ReturnCode::Ok,
            1 => ReturnCode::Undefined,
            2 => ReturnCode::InvalidParameter,
            5 => ReturnCode::NotImplemented,
            7 => ReturnCode::BadArguments,
            26 => ReturnCode::NotCompleted,
            1284 => ReturnCode::AccuracyNotGuaranteed,
            1285 => ReturnCode::AnglesOnly,
            1288 => ReturnCode::AnglesOnlyUncorrected,
            3077 => ReturnCode::TimedOut,
            8710 => ReturnCode::NoTarget,
            8711 => ReturnCode::MultipleTargets,
            8720 => ReturnCode::NoWorkingArea,
            other => ReturnCode::Unknown(other),
        }
    }

    /// Human readable meaning.
    pub fn description(self) -> &'static str {
        match self {
            ReturnCode::Ok => "success",
            ReturnCode::Undefined => "undefined error",
            ReturnCode::InvalidParameter => "invalid parameter",
            ReturnCode::NotImplemented => "not implemented (or already on)",
            ReturnCode::BadArguments => "bad arguments",
            ReturnCode::NotCompleted => "command not completed",
            ReturnCode::AccuracyNotGuaranteed => "accuracy could not be verified",
            ReturnCode::AnglesOnly => "only angles measured, no distance",
            ReturnCode::AnglesOnlyUncorrected => "only angles measured, no inclination correction",
            ReturnCode::TimedOut => "time-out",
            ReturnCode::NoTarget => "no target found",
            ReturnCode::MultipleTargets => "multiple targets found",
            ReturnCode::NoWorkingArea => "working area not defined",
            ReturnCode::Unknown(_) => "unknown return code",
        }
    }
}

impl From<u16> for ReturnCode {
    fn from(code: u16) -> Self {
        Self::from_code(code)
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.description())
    }
}

/// Prism (reflector) types known to the BAP subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrismType {
    Round,
    Mini,
    Tape,
    /// Leica 360° prism.
    Prism360,
    User1,
    User2,
    User3,
    /// Leica mini 360° prism.
    Mini360,
    MiniZero,
    UserDefined,
    HdsTape,
    Grz121Round,
    MaMpr122,
    Unknown(u16),
}

impl PrismType {
    pub fn code(self) -> u16 {
        match self {
            PrismType::Round => 0,
            PrismType::Mini => 1,
            PrismType::Tape => 2,
            PrismType::Prism360 => 3,
            PrismType::User1 => 4,
            PrismType::User2 => 5,
            PrismType::User3 => 6,
            PrismType::Mini360 => 7,
            PrismType::MiniZero => 8,
            PrismType::UserDefined => 9,
            PrismType::HdsTape => 10,
            PrismType::Grz121Round => 11,
            PrismType::MaMpr122 => 12,
            PrismType::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            0 => PrismType::Round,
            1 => PrismType::Mini,
            2 => PrismType::Tape,
            3 => PrismType::Prism360,
            4 => PrismType::User1,
            5 => PrismType::User2,
            6 => PrismType::User3,
            7 => PrismType::Mini360,
            8 => PrismType::MiniZero,
            9 => PrismType::UserDefined,
            10 => PrismType::HdsTape,
            11 => PrismType::Grz121Round,
            12 => PrismType::MaMpr122,
            other => PrismType::Unknown(other),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            PrismType::Round => "Leica Circular Prism",
            PrismType::Mini => "Leica Mini Prism",
            PrismType::Tape => "Leica Reflector Tape",
            PrismType::Prism360 => "Leica 360 Prism",
            PrismType::User1 | PrismType::User2 | PrismType::User3 => "not supported",
            PrismType::Mini360 => "Leica Mini 360 Prism",
            PrismType::MiniZero => "Leica Mini Zero Prism",
            PrismType::UserDefined => "User Defined Prism",
            PrismType::HdsTape => "Leica HDS Target",
            PrismType::Grz121Round => "GRZ121 360 Prism for Machine Guidance",
            PrismType::MaMpr122 => "MPR122 360 Prism for Machine Guidance",
            PrismType::Unknown(_) => "unknown prism",
        }
    }
}

/// User measurement programs (BAP_USER_MEASPRG).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementProgram {
    SingleRefStandard,
    SingleRefFast,
    SingleRefVisible,
    SingleRlessVisible,
    ContRefStandard,
    ContRefFast,
    ContRlessVisible,
    AvgRefStandard,
    AvgRefVisible,
    AvgRlessVisible,
    ContRefSynchro,
    SingleRefPrecise,
    Unknown(u16),
}

impl MeasurementProgram {
    pub fn code(self) -> u16 {
        match self {
            MeasurementProgram::SingleRefStandard => 0,
            MeasurementProgram::SingleRefFast => 1,
            MeasurementProgram::SingleRefVisible => 2,
            MeasurementProgram::SingleRlessVisible => 3,
            MeasurementProgram::ContRefStandard => 4,
            MeasurementProgram::ContRefFast => 5,
            MeasurementProgram::ContRlessVisible => 6,
            MeasurementProgram::AvgRefStandard => 7,
            MeasurementProgram::AvgRefVisible => 8,
            MeasurementProgram::AvgRlessVisible => 9,
            MeasurementProgram::ContRefSynchro => 10,
            MeasurementProgram::SingleRefPrecise => 11,
            MeasurementProgram::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            0 => MeasurementProgram::SingleRefStandard,
            1 => MeasurementProgram::SingleRefFast,
            2 => MeasurementProgram::SingleRefVisible,
            3 => MeasurementProgram::SingleRlessVisible,
            4 => MeasurementProgram::ContRefStandard,
            5 => MeasurementProgram::ContRefFast,
            6 => MeasurementProgram::ContRlessVisible,
            7 => MeasurementProgram::AvgRefStandard,
            8 => MeasurementProgram::AvgRefVisible,
            9 => MeasurementProgram::AvgRlessVisible,
            10 => MeasurementProgram::ContRefSynchro,
            11 => MeasurementProgram::SingleRefPrecise,
            other => MeasurementProgram::Unknown(other),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MeasurementProgram::SingleRefStandard => "Reflector, Standard",
            MeasurementProgram::SingleRefFast => "Reflector, Fast",
            MeasurementProgram::SingleRefVisible => "Long Range, Standard",
            MeasurementProgram::SingleRlessVisible => "No Reflector, Standard",
            MeasurementProgram::ContRefStandard => "Reflector, Tracking",
            MeasurementProgram::ContRlessVisible => "No Reflector, Fast Tracking",
            MeasurementProgram::AvgRefStandard => "Reflector, Average",
            MeasurementProgram::AvgRefVisible => "Long Range, Average",
            MeasurementProgram::AvgRlessVisible => "No Reflector, Average",
            MeasurementProgram::ContRefSynchro => "Reflector, Synchro Tracking",
            MeasurementProgram::ContRefFast | MeasurementProgram::SingleRefPrecise => {
                "not available"
            }
            MeasurementProgram::Unknown(_) => "unknown program",
        }
    }
}

/// Whether distances are measured onto a reflector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Reflector,
    Reflectorless,
    Unknown(u16),
}

impl TargetType {
    pub fn code(self) -> u16 {
        match self {
            TargetType::Reflector => 0,
            TargetType::Reflectorless => 1,
            TargetType::Unknown(code) => code,
        }
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            0 => TargetType::Reflector,
            1 => TargetType::Reflectorless,
            other => TargetType::Unknown(other),
        }
    }
}

/// Distance measurement (EDM) mode.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    ValueEnum,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
#[repr(u16)]
pub enum EdmMode {
    #[value(name = "not-used")]
    NotUsed = 0,
    /// IR standard, reflector tape
    #[value(name = "single-tape")]
    SingleTape = 1,
    /// IR standard
    #[value(name = "single-standard")]
    SingleStandard = 2,
    /// IR fast
    #[value(name = "single-fast")]
    SingleFast = 3,
    /// LO standard
    #[value(name = "single-long-range")]
    SingleLongRange = 4,
    /// RL standard
    #[value(name = "single-short-range")]
    SingleShortRange = 5,
    /// Standard repeated measurement
    #[value(name = "cont-standard")]
    ContStandard = 6,
    /// IR tracking
    #[value(name = "cont-dynamic")]
    ContDynamic = 7,
    /// RL tracking
    #[value(name = "cont-reflectorless")]
    ContReflectorless = 8,
    /// Fast repeated measurement
    #[value(name = "cont-fast")]
    ContFast = 9,
    #[value(name = "average-ir")]
    AverageIr = 10,
    #[value(name = "average-sr")]
    AverageSr = 11,
    #[value(name = "average-lr")]
    AverageLr = 12,
    /// TS30/TM30 only
    #[value(name = "precise-ir")]
    PreciseIr = 13,
    /// TS30/TM30 only
    #[value(name = "precise-tape")]
    PreciseTape = 14,
}

impl EdmMode {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a mode by its wire code. `None` for codes outside 0-14.
    pub fn from_code(code: u16) -> Option<Self> {
        use strum::IntoEnumIterator;
        Self::iter().find(|mode| mode.code() == code)
    }
}

/// Inclination sensor handling for angle measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[repr(u8)]
pub enum InclinationMode {
    /// Measure the inclination for every call
    Measure = 0,
    /// Let the instrument decide
    Automatic = 1,
    /// Compute from a plane
    Plane = 2,
}

impl InclinationMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// TMC measurement commands for `TMC_DoMeasure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MeasureCommand {
    Stop = 0,
    DefaultDistance = 1,
    Clear = 3,
    Signal = 4,
    DoMeasure = 6,
    RedTrackDistance = 10,
    Frequency = 11,
}

impl MeasureCommand {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PositionMode {
    Normal = 0,
    Precise = 1,
    Fast = 2,
}

impl PositionMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AtrMode {
    /// Position to the given angles
    Position = 0,
    /// Position to a target near the given angles
    Target = 1,
}

impl AtrMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Mode for `COM_SwitchOnTPS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StartupMode {
    Local = 0,
    Remote = 1,
    Online = 2,
}

impl StartupMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Mode for `COM_SwitchOffTPS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShutdownMode {
    Shutdown = 0,
    Sleep = 1,
}

impl ShutdownMode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// RPC numbers used by [`crate::TotalStation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
#[repr(u16)]
pub enum Command {
    GetSwVersion = 110,
    SwitchOn = 111,
    SwitchOff = 112,
    LaserPointer = 1004,
    DoMeasure = 2008,
    SetEdmMode = 2020,
    GetEdmMode = 2021,
    GetCoordinate = 2082,
    GetAngle = 2107,
    GetSimpleMeasurement = 2108,
    SetOrientation = 2113,
    GetInstrumentNo = 5003,
    GetInstrumentName = 5004,
    LockIn = 9013,
    MakePositioning = 9027,
    Search = 9029,
    FineAdjust = 9037,
    GetSearchArea = 9042,
    SetSearchArea = 9043,
    PsSetRange = 9047,
    PsEnableRange = 9048,
    PsSearchWindow = 9052,
    SetPrismType = 17008,
    GetPrismType = 17009,
    SetMeasurementProgram = 17019,
    GetMeasurementProgram = 17018,
    SetTargetType = 17021,
    GetTargetType = 17022,
    SetUserAtrState = 18005,
    GetUserAtrState = 18006,
    SetUserLockState = 18007,
    GetUserLockState = 18008,
}

impl Command {
    pub fn code(self) -> u16 {
        self as u16
    }

    /// How long to wait for the reply.
    pub fn timeout(self) -> Duration {
        match self {
            Command::LaserPointer => Duration::from_secs(30),
            Command::SwitchOn | Command::SwitchOff | Command::GetSwVersion => {
                Duration::from_secs(60)
            }
            Command::Search | Command::FineAdjust | Command::PsSearchWindow => {
                Duration::from_secs(120)
            }
            _ => Duration::from_secs(3),
        }
    }
}
