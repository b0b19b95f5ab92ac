//! Byte-level channel to the instrument.
//!
//! The transport knows nothing about frames. It writes bytes, reports how
//! many received bytes are waiting, and hands those bytes over without
//! blocking. The protocol engine owns the only instance.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, trace};

use crate::error::{GeoComError, GeoComResult};

/// Half-duplex byte channel.
pub trait Transport {
    /// Write all bytes and push them out of any local buffer.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Number of received bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read every byte currently available.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Throw away whatever is waiting in the receive buffer.
    fn discard_input(&mut self) -> io::Result<()> {
        let stale = self.read_available()?;
        if !stale.is_empty() {
            trace!("Discarded {} stale bytes", stale.len());
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_all(bytes)
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_available()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        (**self).discard_input()
    }
}

/// Serial port transport (8N1, no flow control).
///
/// Baud rate must match the value configured on the instrument, otherwise
/// every reply decodes as garbage.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port.
    ///
    /// # Arguments
    /// * `path` - Port name (e.g., "/dev/ttyUSB0" or "COM3")
    /// * `baud_rate` - Baud rate configured on the instrument (e.g., 57600)
    ///
    /// # Errors
    ///
    /// Returns [`GeoComError::ConnectionFailed`] if the port cannot be opened.
    pub fn open(path: &str, baud_rate: u32) -> GeoComResult<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| GeoComError::ConnectionFailed(format!("{path}: {e}")))?;

        info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }

    /// Name of the underlying port, if the OS reports one.
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let available = self.bytes_available()?;
        let mut buf = vec![0u8; available];
        if available > 0 {
            self.port.read_exact(&mut buf)?;
        }
        Ok(buf)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        debug!("Releasing serial port {:?}", self.port.name());
    }
}
