//! Message framing for the ROM bootloader command protocol
//!
//! Every exchange with the ROM is an 8-byte header followed by a
//! payload. The header layout is fixed: message type, operation, a
//! little-endian 16-bit payload length and a big-endian 32-bit field
//! that carries the payload checksum on outbound commands and a return
//! value on inbound responses. The mixed endianness is a property of
//! the wire format, not a choice.

use std::time::Duration;

use strum::Display;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
pub const SYNC_TIMEOUT: Duration = Duration::from_millis(100);

/// Size of the command/response header in bytes
pub const HEADER_SIZE: usize = 8;

/// Seed for the payload checksum routine
pub const CHECKSUM_MAGIC: u32 = 0xEF;

/// Payload of the SYNC command (36 bytes: 0x07 0x07 0x12 0x20, followed
/// by 32 x 0x55)
pub const SYNC_FRAME: [u8; 36] = [
    0x07, 0x07, 0x12, 0x20, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55,
    0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55, 0x55,
    0x55, 0x55, 0x55, 0x55,
];

/// Direction marker in byte 0 of the header
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Command = 0x00,
    Response = 0x01,
}

/// Operations understood by the ESP8266 ROM loader
///
/// `None` never names a real operation: it is the request-side wildcard
/// that accepts any response operation during the sync handshake.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    None = 0x00,
    FlashBegin = 0x02,
    FlashData = 0x03,
    FlashEnd = 0x04,
    MemBegin = 0x05,
    MemEnd = 0x06,
    MemData = 0x07,
    Sync = 0x08,
    WriteReg = 0x09,
    ReadReg = 0x0A,
}

impl CommandType {
    /// Read timeout appropriate for this operation
    pub fn timeout(&self) -> Duration {
        match self {
            CommandType::None | CommandType::Sync => SYNC_TIMEOUT,
            _ => DEFAULT_TIMEOUT,
        }
    }
}

/// Build the raw (not yet SLIP-encoded) bytes of a command message.
pub fn build_command(ty: CommandType, payload: &[u8], checksum: u32) -> Vec<u8> {
    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push(MessageType::Command as u8);
    message.push(ty as u8);
    message.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    message.extend_from_slice(&checksum.to_be_bytes());
    message.extend_from_slice(payload);
    message
}

/// Errors produced while parsing a decoded frame as a response message
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    #[error("frame is shorter than the {} byte header", HEADER_SIZE)]
    HeaderTooShort,
    #[error("message type 0x{0:02X} is not a response")]
    WrongMessageType(u8),
}

/// A response message from the ROM following a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub return_op: u8,
    pub return_length: u16,
    pub value: u32,
    pub data: Vec<u8>,
}

impl CommandResponse {
    /// Parse a SLIP-decoded frame into a response message.
    pub fn parse(raw: &[u8]) -> Result<Self, ResponseError> {
        if raw.len() < HEADER_SIZE {
            return Err(ResponseError::HeaderTooShort);
        }
        if raw[0] != MessageType::Response as u8 {
            return Err(ResponseError::WrongMessageType(raw[0]));
        }

        Ok(CommandResponse {
            return_op: raw[1],
            return_length: u16::from_le_bytes([raw[2], raw[3]]),
            value: read_u32_be(raw, 4).ok_or(ResponseError::HeaderTooShort)?,
            data: raw[HEADER_SIZE..].to_vec(),
        })
    }
}

/// Read a big-endian 32-bit word starting at `offset`, or `None` when
/// fewer than 4 bytes remain.
pub fn read_u32_be(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes: [u8; 4] = buf.get(offset..offset + 4)?.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

/// XOR-fold a block of words into `seed`.
///
/// Register commands put 0 in the checksum field and the ROM does not
/// check it; the flash data family seeds this with [CHECKSUM_MAGIC]
/// over the block payload.
pub fn checksum(words: &[u32], seed: u32) -> u32 {
    words.iter().fold(seed, |acc, word| acc ^ word)
}
