//! GeoCOM driver for motorized total stations.
//!
//! Layers, leaves first:
//!
//! - [`frame`] - ASCII request/reply codec and the rotating transaction ID
//! - [`transport`] - byte channel to the instrument (serial port in practice)
//! - [`device`] - the protocol engine: one request in flight, deadline
//!   polling, stale reply detection, cancellation
//! - [`params`] - typed return codes, modes and RPC numbers
//! - [`station`] - one typed method per RPC on top of the engine

pub mod clock;
pub mod device;
pub mod error;
pub mod frame;
pub mod params;
pub mod station;
pub mod transport;

pub use clock::{CancelToken, Clock, ManualClock, SystemClock};
pub use device::{GeoComDevice, LinkConfig};
pub use error::{GeoComError, GeoComResult};
pub use frame::{Arg, Request, Response, TransactionCounter};
pub use params::{
    AtrMode, Command, EdmMode, InclinationMode, MeasureCommand, MeasurementProgram,
    PositionMode, PrismType, ReturnCode, ShutdownMode, StartupMode, TargetType,
};
pub use station::{
    PolarMeasurement, PowerState, SearchArea, SimpleMeasurement, SoftwareVersion, TotalStation,
};
pub use transport::{SerialTransport, Transport};
