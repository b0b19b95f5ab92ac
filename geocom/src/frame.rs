//! GeoCOM ASCII frame codec.
//!
//! Requests and replies are single ASCII lines. A request carries the RPC
//! number, a 3-bit transaction ID and the comma separated arguments:
//!
//! ```text
//! \n%R1Q,<rpc>,<trid>:<arg1>,<arg2>,...\r\n
//! ```
//!
//! The leading line feed makes the instrument discard any partial input it
//! may still be buffering. Replies look like:
//!
//! ```text
//! %R1P,<com_status>,<trid>:<return_code>,<param1>,<param2>,...\r\n
//! ```
//!
//! Some firmware revisions wrap the whole payload in single quotes. The
//! decoder strips every `'` before splitting, so quoting never changes the
//! parsed fields.
//!
//! This module performs no I/O.

use std::fmt;
use std::str::FromStr;

use crate::error::{GeoComError, GeoComResult};

/// Header marking an ASCII request in protocol revision 1.
pub const REQUEST_HEADER: &str = "%R1Q";

/// Header marking an ASCII reply in protocol revision 1.
pub const REPLY_HEADER: &str = "%R1P";

/// Number of distinct transaction IDs (the wire field is 3 bits wide).
pub const TRANSACTION_ID_MODULUS: u8 = 8;

/// Rotating transaction ID source.
///
/// Starts at 0 and advances by one (mod 8) for every request built. A
/// counter lives as long as the connection that owns it and is never reset.
#[derive(Debug, Clone, Default)]
pub struct TransactionCounter {
    next: u8,
}

impl TransactionCounter {
    /// Create a counter starting at 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// ID the next request will carry.
    pub fn peek(&self) -> u8 {
        self.next
    }

    /// Take the current ID and advance the counter.
    pub fn advance(&mut self) -> u8 {
        let id = self.next;
        self.next = (self.next + 1) % TRANSACTION_ID_MODULUS;
        id
    }
}

/// One request argument, already in its wire text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg(String);

impl Arg {
    /// Wrap text that is already formatted for the wire.
    pub fn raw(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Double-quoted string argument.
    pub fn string(text: &str) -> Self {
        Self(format!("\"{text}\""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! numeric_arg {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self(value.to_string())
                }
            }
        )*
    };
}

numeric_arg!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self(if value { "1" } else { "0" }.to_string())
    }
}

/// An encoded-once request value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    command: u16,
    transaction_id: u8,
    args: Vec<Arg>,
}

impl Request {
    pub fn new(command: u16, transaction_id: u8, args: &[Arg]) -> Self {
        Self {
            command,
            transaction_id,
            args: args.to_vec(),
        }
    }

    pub fn command(&self) -> u16 {
        self.command
    }

    pub fn transaction_id(&self) -> u8 {
        self.transaction_id
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Render the exact wire line, including the leading LF and the CR LF
    /// terminator.
    pub fn encode(&self) -> String {
        let args: Vec<&str> = self.args.iter().map(Arg::as_str).collect();
        format!(
            "\n{REQUEST_HEADER},{},{}:{}\r\n",
            self.command,
            self.transaction_id,
            args.join(",")
        )
    }
}

/// A decoded reply frame.
///
/// Parameters stay textual; only the caller knows how to type them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub com_status: u16,
    pub transaction_id: u8,
    pub return_code: u16,
    pub params: Vec<String>,
}

impl Response {
    /// Decode one reply.
    ///
    /// Anything before the `%R1P` header is ignored, as is everything after
    /// the first line break that follows it. An empty parameter list is
    /// valid.
    ///
    /// # Errors
    ///
    /// Returns [`GeoComError::MalformedFrame`] when the header, the
    /// communication status or the `<trid>:<return_code>` field is missing,
    /// or when any of those fields is not numeric.
    pub fn decode(text: &str) -> GeoComResult<Self> {
        let unquoted: String = text.chars().filter(|&c| c != '\'').collect();

        let start = unquoted
            .find(REPLY_HEADER)
            .ok_or_else(|| malformed(format!("no {REPLY_HEADER} header in {unquoted:?}")))?;
        let line = unquoted[start..]
            .lines()
            .next()
            .unwrap_or_default()
            .trim();

        let mut fields = line.split(',');
        // First field is the header itself.
        fields.next();

        let com_status = fields
            .next()
            .ok_or_else(|| malformed(format!("missing communication status in {line:?}")))?;
        let com_status: u16 = parse_field(com_status, "communication status")?;

        let trid_rc = fields
            .next()
            .ok_or_else(|| malformed(format!("missing transaction field in {line:?}")))?;
        let (trid, rc) = trid_rc
            .split_once(':')
            .ok_or_else(|| malformed(format!("missing ':' in transaction field {trid_rc:?}")))?;
        let transaction_id: u8 = parse_field(trid, "transaction id")?;
        let return_code: u16 = parse_field(rc, "return code")?;

        let mut params: Vec<String> = fields.map(|p| p.trim().to_string()).collect();
        if params.last().is_some_and(|p| p.is_empty()) {
            params.pop();
        }

        Ok(Self {
            com_status,
            transaction_id,
            return_code,
            params,
        })
    }

    /// Frame arrived intact according to the instrument's own status field.
    pub fn is_clean(&self) -> bool {
        self.com_status == 0
    }

    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }

    /// Convert a nonzero return code into [`GeoComError::Device`].
    pub fn ensure_success(self) -> GeoComResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GeoComError::Device {
                code: self.return_code.into(),
            })
        }
    }

    /// Raw parameter at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoComError::InvalidParameter`] if the reply is too short.
    pub fn param(&self, index: usize) -> GeoComResult<&str> {
        self.params.get(index).map(String::as_str).ok_or_else(|| {
            GeoComError::InvalidParameter(format!(
                "expected at least {} parameters, got {}",
                index + 1,
                self.params.len()
            ))
        })
    }

    /// Parameter at `index` parsed as `T`.
    pub fn parse_param<T: FromStr>(&self, index: usize) -> GeoComResult<T> {
        let raw = self.param(index)?;
        raw.trim().parse().map_err(|_| {
            GeoComError::InvalidParameter(format!("non-numeric parameter {index}: {raw:?}"))
        })
    }

    /// String parameter at `index` with surrounding double quotes removed.
    pub fn string_param(&self, index: usize) -> GeoComResult<String> {
        let raw = self.param(index)?;
        Ok(raw.trim_matches('"').to_string())
    }
}

fn parse_field<T: FromStr>(raw: &str, what: &str) -> GeoComResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| malformed(format!("non-numeric {what}: {raw:?}")))
}

fn malformed(message: String) -> GeoComError {
    GeoComError::MalformedFrame(message)
}
