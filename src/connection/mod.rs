//! Establish a connection with a target device
//!
//! The [Connection] struct abstracts over the serial transport and the
//! sending/decoding of commands, and provides the higher-level
//! operations with the device: the sync handshake, register access and
//! chip-id derivation.

use std::{thread::sleep, time::Duration};

use log::debug;

use crate::{
    command::{build_command, read_u32_be, CommandResponse, CommandType, SYNC_FRAME},
    error::Error,
    interface::{FlushDirection, Transport},
    slip,
};

use self::reset::ClassicReset;

pub mod reset;

/// Hardware resets into the bootloader before giving up
const MAX_RESET_ATTEMPTS: usize = 4;
/// Sync attempts per reset; a flush-and-resync is much cheaper than
/// another reset cycle
const MAX_SYNC_ATTEMPTS: usize = 4;
/// Follow-up exchanges draining the ROM's burst of sync responses
const SYNC_PROBES: usize = 7;
/// How many frames to read looking for a matching response
const RESPONSE_RETRY: usize = 100;
/// Worst-case latency between releasing reset and the ROM listening
/// (usually well under 20 ms, the latency timer allows up to 255)
const BOOT_GRACE: Duration = Duration::from_millis(255);

/// OTP ROM addresses holding the factory identifiers. Only MAC0/MAC1
/// participate in the chip id; full MAC derivation needs all four words
/// and is not wired up yet.
pub const ESP_OTP_MAC0: u32 = 0x3FF0_0050;
pub const ESP_OTP_MAC1: u32 = 0x3FF0_0054;
pub const ESP_OTP_MAC2: u32 = 0x3FF0_0058;
pub const ESP_OTP_MAC3: u32 = 0x3FF0_005C;

/// A connection with a target device
///
/// Owns its transport exclusively for its whole lifetime; the port is
/// released when the connection is dropped. All operations are
/// blocking round-trips, one at a time.
pub struct Connection {
    transport: Box<dyn Transport>,
    connected: bool,
}

impl Connection {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Connection {
            transport: Box::new(transport),
            connected: false,
        }
    }

    /// Whether the sync handshake has completed on this connection
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Initialize a connection with a device.
    ///
    /// Resets the target into the bootloader and performs the sync
    /// handshake, retrying both bounded: the inner flush-and-sync loop
    /// absorbs transient noise after a reset, the outer loop recovers
    /// from a reset that did not land in the bootloader at all.
    pub fn begin(&mut self) -> Result<(), Error> {
        self.connected = false;

        for _ in 0..MAX_RESET_ATTEMPTS {
            self.reset_to_flash()?;
            sleep(BOOT_GRACE);

            for _ in 0..MAX_SYNC_ATTEMPTS {
                self.transport.flush(FlushDirection::All)?;

                if self.sync().is_ok() {
                    self.connected = true;
                    return Ok(());
                }
            }
            debug!("No sync after reset, resetting again");
        }

        Err(Error::ConnectionFailed)
    }

    /// Try to sync with the device.
    fn sync(&mut self) -> Result<(), Error> {
        self.with_timeout(CommandType::Sync.timeout(), |connection| {
            // The initial sync send is fire and forget; the replies it
            // provokes are collected by the probes below.
            connection.write_command(CommandType::Sync, &SYNC_FRAME, 0)?;

            // The ROM answers with a burst of responses. Every probe is
            // attempted even after one fails, so the channel gets
            // drained the same way regardless of where a failure
            // happened.
            let mut synced = true;
            for _ in 0..SYNC_PROBES {
                synced &= connection
                    .exchange(CommandType::None, &[], 0, RESPONSE_RETRY)
                    .is_ok();
            }

            if synced {
                Ok(())
            } else {
                Err(Error::ConnectionFailed)
            }
        })
    }

    /// Reset the device into the ROM bootloader.
    pub fn reset_to_flash(&mut self) -> Result<(), Error> {
        self.connected = false;
        ClassicReset::to_flash().reset(self.transport.as_mut())
    }

    /// Reset the device into normal execution of the user firmware.
    pub fn reset_to_run(&mut self) -> Result<(), Error> {
        // The bootloader session does not survive leaving the ROM
        self.connected = false;
        ClassicReset::to_run().reset(self.transport.as_mut())
    }

    /// Run an operation with a temporary read timeout on the transport.
    pub fn with_timeout<T, F>(&mut self, timeout: Duration, mut f: F) -> Result<T, Error>
    where
        F: FnMut(&mut Connection) -> Result<T, Error>,
    {
        let old_timeout = self.transport.read_timeout();
        self.transport.set_read_timeout(timeout)?;

        let result = f(self);

        self.transport.set_read_timeout(old_timeout)?;

        result
    }

    /// SLIP-encode and send a command message.
    fn write_command(&mut self, ty: CommandType, payload: &[u8], checksum: u32) -> Result<(), Error> {
        debug!("Writing command: {}", ty);
        let frame = slip::encode(&build_command(ty, payload, checksum));
        self.transport.write_bytes(&frame)
    }

    /// Send a command and wait for the matching response, returning the
    /// response payload with the header stripped.
    ///
    /// The single chokepoint for response correlation and retry policy:
    /// up to `retry_limit` frames are read; short frames and messages
    /// that are not responses just consume a retry, as do responses for
    /// other operations. A SLIP decode failure ends the exchange
    /// immediately. [CommandType::None] accepts any response operation.
    fn exchange(
        &mut self,
        ty: CommandType,
        payload: &[u8],
        checksum: u32,
        retry_limit: usize,
    ) -> Result<Vec<u8>, Error> {
        self.write_command(ty, payload, checksum)?;

        for _ in 0..retry_limit {
            let frame = self.transport.read_frame()?;
            let decoded = slip::decode(&frame)?;

            let response = match CommandResponse::parse(&decoded) {
                Ok(response) => response,
                Err(_) => continue,
            };

            if ty == CommandType::None || response.return_op == ty as u8 {
                return Ok(response.data);
            }
        }

        Err(Error::NoMatchingResponse(ty))
    }

    fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.connected {
            Ok(())
        } else {
            self.begin()
        }
    }

    /// Read a 32-bit register.
    ///
    /// Connects on demand. A failure is reported as such and never
    /// conflated with a register that legitimately holds zero.
    pub fn read_reg(&mut self, address: u32) -> Result<u32, Error> {
        self.ensure_connected()?;

        let data = self
            .with_timeout(CommandType::ReadReg.timeout(), |connection| {
                connection.exchange(
                    CommandType::ReadReg,
                    &address.to_be_bytes(),
                    0,
                    RESPONSE_RETRY,
                )
            })
            .map_err(|err| {
                debug!("Reading register {:#010x} failed: {}", address, err);
                Error::ReadRegFailed(address)
            })?;

        read_u32_be(&data, 0).ok_or(Error::ReadRegFailed(address))
    }

    /// Write a 32-bit register.
    ///
    /// The ROM's minimal write form carries only the value on the wire;
    /// the target register is implicit in this command family.
    pub fn write_reg(&mut self, address: u32, value: u32) -> Result<(), Error> {
        self.ensure_connected()?;

        self.with_timeout(CommandType::WriteReg.timeout(), |connection| {
            connection.exchange(CommandType::WriteReg, &value.to_be_bytes(), 0, RESPONSE_RETRY)
        })
        .map(|_| ())
        .map_err(|err| {
            debug!("Writing register {:#010x} failed: {}", address, err);
            Error::WriteRegFailed(address)
        })
    }

    /// Read the chip id from the OTP region.
    pub fn read_chip_id(&mut self) -> Result<u32, Error> {
        let id0 = self.read_reg(ESP_OTP_MAC0)?;
        let id1 = self.read_reg(ESP_OTP_MAC1)?;

        Ok((id0 >> 24) | ((id1 & 0x00FF_FFFF) << 8))
    }
}
