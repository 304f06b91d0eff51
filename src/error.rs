//! Library and application errors

use std::io;

use miette::Diagnostic;
use thiserror::Error;

use crate::{command::CommandType, slip::SlipError};

/// All possible errors returned by esprom
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Serial port error")]
    #[diagnostic(code(esprom::serial_error))]
    Serial(#[from] serialport::Error),

    #[error("IO error while using the serial port")]
    #[diagnostic(code(esprom::io_error))]
    Io(#[from] io::Error),

    #[error("The serial port is not open")]
    #[diagnostic(
        code(esprom::port_not_open),
        help("The port is opened on demand; this indicates it was closed while in use")
    )]
    PortNotOpen,

    #[error("Invalid SLIP framing")]
    #[diagnostic(code(esprom::framing_error))]
    Slip(#[from] SlipError),

    #[error("No matching response to the {0} command")]
    #[diagnostic(
        code(esprom::no_matching_response),
        help("The bootloader answered, but never with the expected operation")
    )]
    NoMatchingResponse(CommandType),

    #[error("Failed to connect to the device")]
    #[diagnostic(
        code(esprom::connection_failed),
        help("Check that the device is wired for DTR/RTS bootstrapping and that nothing else holds the port open")
    )]
    ConnectionFailed,

    #[error("Failed to read register {0:#010x}")]
    #[diagnostic(code(esprom::read_reg_failed))]
    ReadRegFailed(u32),

    #[error("Failed to write register {0:#010x}")]
    #[diagnostic(code(esprom::write_reg_failed))]
    WriteRegFailed(u32),

    #[error("The {0} command is not supported yet")]
    #[diagnostic(
        code(esprom::unsupported_command),
        help("Only the reset, run and chip_id commands talk to the bootloader today")
    )]
    UnsupportedCommand(String),
}
