//! Error taxonomy of the protocol layer.

use thiserror::Error;

use crate::params::ReturnCode;

/// Return code the instrument itself uses for a communication time-out.
pub const RC_TIMED_OUT: u16 = 3077;

/// Errors that can occur while talking GeoCOM.
///
/// `Timeout`, `Device` and `InvalidParameter` are transient from the
/// caller's point of view: retrying or falling back is expected.
/// `MalformedFrame`, `Communication` and `ConnectionFailed` point at a broken
/// channel or a firmware mismatch.
#[derive(Error, Debug)]
pub enum GeoComError {
    /// No matching reply arrived before the deadline.
    ///
    /// Also reported when a reply with a different transaction ID arrives,
    /// or when the instrument flags the frame with a nonzero communication
    /// status.
    #[error("Timeout waiting for a matching reply")]
    Timeout,

    /// A reply arrived but does not follow the wire grammar.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The frame decoded, but a parameter is missing, not numeric, or
    /// outside the known values.
    #[error("Invalid reply parameter: {0}")]
    InvalidParameter(String),

    /// Transport failure (device removed, I/O error).
    #[error("Communication error: {0}")]
    Communication(#[from] std::io::Error),

    /// The serial port could not be opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Clean frame, nonzero return code.
    #[error("Instrument error {}: {}", code.code(), code.description())]
    Device {
        /// Return code reported by the instrument
        code: ReturnCode,
    },

    /// The operator interrupted the exchange.
    #[error("Cancelled")]
    Cancelled,
}

impl GeoComError {
    /// Numeric return code equivalent of this error.
    ///
    /// Time-outs map to 3077, the instrument's own time-out code. Errors
    /// that never reached the instrument map to 1 (undefined).
    pub fn return_code(&self) -> u16 {
        match self {
            GeoComError::Timeout => RC_TIMED_OUT,
            GeoComError::Device { code } => code.code(),
            _ => ReturnCode::Undefined.code(),
        }
    }

    /// Whether a caller may simply retry or fall back.
    ///
    /// Undecodable frames, communication failures and cancellation are not
    /// recoverable and must reach the operator.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GeoComError::Timeout | GeoComError::Device { .. } | GeoComError::InvalidParameter(_)
        )
    }
}

/// Result type for GeoCOM operations.
pub type GeoComResult<T> = Result<T, GeoComError>;
