//! Serial transport consumed by the protocol layer
//!
//! [Transport] is the seam between the bootloader protocol and the
//! actual serial hardware; [SerialInterface] is the production
//! implementation on top of [serialport]. Tests drive the protocol
//! against scripted implementations of the same trait.

use std::{
    io::{Read, Write},
    thread::sleep,
    time::Duration,
};

use log::debug;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use crate::error::Error;

/// Default baud rate. The ROM auto-bauds, so more or less anything
/// reasonable works.
pub const ROM_BAUD: u32 = 115_200;

/// Time for the tail of a frame to land after its first byte arrived.
/// A response is ~20 bytes, under 2 ms at the ROM baud rate.
const FRAME_SETTLE: Duration = Duration::from_millis(5);

/// Discrete output lines repurposed to drive the reset circuit
///
/// Levels are logical: the USB-serial adapter inverts both lines on
/// their way to the RST/GPIO0 pins, and that inversion is the
/// transport's concern, not the caller's.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControlLine {
    Dtr,
    Rts,
}

/// Which buffer to empty when flushing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlushDirection {
    Input,
    Output,
    All,
}

/// A byte-oriented duplex channel with out-of-band control of the DTR
/// and RTS lines.
pub trait Transport {
    fn open(&mut self) -> Result<(), Error>;
    fn close(&mut self) -> Result<(), Error>;
    fn is_open(&self) -> bool;

    /// Read whatever bytes are currently available, up to one SLIP
    /// frame. Blocks for the first byte within the configured read
    /// timeout; the ROM emits a frame back to back, so the rest is
    /// either buffered already or arrives within a character time.
    fn read_frame(&mut self) -> Result<Vec<u8>, Error>;

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error>;

    fn set_control_line(&mut self, line: ControlLine, level: bool) -> Result<(), Error>;

    fn flush(&mut self, direction: FlushDirection) -> Result<(), Error>;

    fn read_timeout(&self) -> Duration;

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), Error>;
}

/// [Transport] implementation over a real serial port
///
/// The port is opened on demand, configured as 8N1 at the given baud
/// rate, and stays open until [Transport::close] or drop.
pub struct SerialInterface {
    port_name: String,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialInterface {
    pub fn new(port_name: &str, baud_rate: u32, read_timeout: Duration) -> Self {
        SerialInterface {
            port_name: port_name.into(),
            baud_rate,
            read_timeout,
            port: None,
        }
    }

    fn port(&mut self) -> Result<&mut (dyn SerialPort + '_), Error> {
        if self.port.is_none() {
            self.open()?;
        }
        self.port.as_deref_mut().ok_or(Error::PortNotOpen)
    }
}

impl Transport for SerialInterface {
    fn open(&mut self) -> Result<(), Error> {
        if self.port.is_some() {
            return Ok(());
        }

        debug!("Opening {} at {} baud", self.port_name, self.baud_rate);
        let port = serialport::new(&self.port_name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(self.read_timeout)
            .open()?;
        self.port = Some(port);

        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        // Dropping the handle releases the descriptor
        self.port.take();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_frame(&mut self) -> Result<Vec<u8>, Error> {
        let port = self.port()?;

        let mut byte = [0u8; 1];
        port.read_exact(&mut byte)?;
        let mut frame = vec![byte[0]];

        sleep(FRAME_SETTLE);
        loop {
            let available = port.bytes_to_read()? as usize;
            if available == 0 {
                break;
            }
            let filled = frame.len();
            frame.resize(filled + available, 0);
            port.read_exact(&mut frame[filled..])?;
        }

        Ok(frame)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn set_control_line(&mut self, line: ControlLine, level: bool) -> Result<(), Error> {
        let port = self.port()?;
        match line {
            ControlLine::Dtr => port.write_data_terminal_ready(level)?,
            ControlLine::Rts => port.write_request_to_send(level)?,
        }
        Ok(())
    }

    fn flush(&mut self, direction: FlushDirection) -> Result<(), Error> {
        let buffer = match direction {
            FlushDirection::Input => ClearBuffer::Input,
            FlushDirection::Output => ClearBuffer::Output,
            FlushDirection::All => ClearBuffer::All,
        };
        self.port()?.clear(buffer)?;
        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), Error> {
        self.read_timeout = timeout;
        if let Some(port) = self.port.as_deref_mut() {
            port.set_timeout(timeout)?;
        }
        Ok(())
    }
}
