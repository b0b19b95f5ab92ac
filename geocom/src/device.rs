//! GeoCOM protocol engine.
//!
//! [`GeoComDevice`] owns the transport and the transaction counter and runs
//! exactly one request at a time:
//!
//! 1. Drain stale bytes left over from an earlier, aborted exchange.
//! 2. Encode the request with the next transaction ID and write it.
//! 3. Poll the receive buffer until enough bytes are waiting or the
//!    deadline passes. Cancellation is checked on every iteration.
//! 4. Let the instrument finish writing (settle delay), read everything,
//!    decode, and check the transaction ID.
//!
//! A reply carrying another transaction ID is dropped and reported as a
//! time-out: the answer to *this* request never arrived. The engine does
//! not interpret return codes; [`Response::ensure_success`] and the
//! catalogue in [`crate::station`] do that.
//!
//! # Example
//!
//! ```no_run
//! use geocom::{Command, GeoComDevice};
//!
//! let mut device = GeoComDevice::open("/dev/ttyUSB0", 57600)?;
//! let reply = device.send(Command::GetInstrumentName.code(), &[], Command::GetInstrumentName.timeout())?;
//! println!("{:?}", reply.params);
//! # Ok::<(), geocom::GeoComError>(())
//! ```

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::clock::{CancelToken, Clock, SystemClock};
use crate::error::{GeoComError, GeoComResult};
use crate::frame::{Arg, Request, Response, TransactionCounter};
use crate::transport::{SerialTransport, Transport};

/// Timing of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Sleep between two "bytes available" checks.
    pub poll_interval: Duration,
    /// Pause between the first bytes arriving and reading them.
    pub settle_delay: Duration,
    /// Timeout for requests that do not specify one.
    pub default_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            settle_delay: Duration::from_millis(25),
            default_timeout: Duration::from_secs(3),
        }
    }
}

/// One connection to one instrument.
pub struct GeoComDevice<T: Transport = SerialTransport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    counter: TransactionCounter,
    config: LinkConfig,
    cancel: CancelToken,
}

impl GeoComDevice<SerialTransport, SystemClock> {
    /// Open the serial port and wrap it in an engine.
    ///
    /// # Errors
    ///
    /// Returns [`GeoComError::ConnectionFailed`] if the port cannot be opened.
    pub fn open(port: &str, baud_rate: u32) -> GeoComResult<Self> {
        let transport = SerialTransport::open(port, baud_rate)?;
        Ok(Self::new(transport))
    }
}

impl<T: Transport> GeoComDevice<T, SystemClock> {
    pub fn new(transport: T) -> Self {
        Self::with_clock(transport, SystemClock)
    }
}

impl<T: Transport, C: Clock> GeoComDevice<T, C> {
    /// Engine with an explicit time source.
    pub fn with_clock(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            counter: TransactionCounter::new(),
            config: LinkConfig::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Token that interrupts a pending exchange from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    /// Transaction ID the next request will carry.
    pub fn next_transaction_id(&self) -> u8 {
        self.counter.peek()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Give the transport back, closing the engine.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Send one request and wait for any reply.
    ///
    /// Returns the decoded reply whatever its return code.
    ///
    /// # Errors
    ///
    /// * [`GeoComError::Timeout`] - nothing (or a reply to another request)
    ///   arrived before `timeout`
    /// * [`GeoComError::MalformedFrame`] - the reply does not decode
    /// * [`GeoComError::Communication`] - the transport failed
    /// * [`GeoComError::Cancelled`] - the cancel token fired while waiting
    pub fn send(&mut self, command: u16, args: &[Arg], timeout: Duration) -> GeoComResult<Response> {
        self.send_expecting(command, args, 0, timeout)
    }

    /// [`send`](Self::send) with the engine's default timeout.
    pub fn send_default(&mut self, command: u16, args: &[Arg]) -> GeoComResult<Response> {
        self.send(command, args, self.config.default_timeout)
    }

    /// Like [`send`](Self::send), but keep polling until at least
    /// `expected_len` bytes are waiting. Zero means "any byte".
    pub fn send_expecting(
        &mut self,
        command: u16,
        args: &[Arg],
        expected_len: usize,
        timeout: Duration,
    ) -> GeoComResult<Response> {
        self.transport.discard_input()?;

        let request = Request::new(command, self.counter.advance(), args);
        let line = request.encode();
        debug!("GeoCOM send: {:?}", line.trim());
        self.transport.write_all(line.as_bytes())?;

        self.wait_for_reply(expected_len, timeout)?;
        self.clock.sleep(self.config.settle_delay);

        let bytes = self.transport.read_available()?;
        let text = String::from_utf8_lossy(&bytes);
        trace!("GeoCOM raw: {:?}", text);

        let response = Response::decode(&text)?;
        debug!(
            "GeoCOM recv: trid={} rc={} params={:?}",
            response.transaction_id, response.return_code, response.params
        );

        if !response.is_clean() {
            warn!(
                "Reply to RPC {} flagged with communication status {}",
                command, response.com_status
            );
            return Err(GeoComError::Timeout);
        }

        if response.transaction_id != request.transaction_id() {
            warn!(
                "Dropping stale reply: expected transaction {}, got {}",
                request.transaction_id(),
                response.transaction_id
            );
            return Err(GeoComError::Timeout);
        }

        Ok(response)
    }

    fn wait_for_reply(&mut self, expected_len: usize, timeout: Duration) -> GeoComResult<()> {
        let start = self.clock.now();
        loop {
            if self.cancel.is_cancelled() {
                debug!("Exchange cancelled");
                return Err(GeoComError::Cancelled);
            }

            let available = self.transport.bytes_available()?;
            let ready = if expected_len > 0 {
                available >= expected_len
            } else {
                available > 0
            };
            if ready {
                return Ok(());
            }

            if self.clock.now().duration_since(start) >= timeout {
                debug!("No reply within {:?}", timeout);
                return Err(GeoComError::Timeout);
            }

            self.clock.sleep(self.config.poll_interval);
        }
    }
}
