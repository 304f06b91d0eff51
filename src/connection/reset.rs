//! DTR/RTS bootstrap sequencing
//!
//! NodeMCU-style boards route the serial adapter's DTR and RTS lines
//! through an inverting transistor pair to the chip's RST and GPIO0
//! pins, which gives the host full control over the boot mode:
//!
//! ```text
//!  DTR | RTS || RST | GPIO0 | action
//!   0  |  0  ||  1  |   1   | run
//!   0  |  1  ||  1  |   0   | bootloader (flash)
//!   1  |  0  ||  0  |   1   | reset, held
//!   1  |  1  ||  1  |   1   | run
//! ```
//!
//! Line levels here are logical; the transport owns the inversion.

use std::{thread::sleep, time::Duration};

use log::debug;

use crate::{
    error::Error,
    interface::{ControlLine, Transport},
};

/// How long each line state is held during the sequence. The delays
/// model the worst-case bootstrap window of the reset circuit and are
/// deliberately not configurable.
const RESET_HOLD: Duration = Duration::from_millis(50);

/// Classic reset sequence, sets DTR and RTS sequentially.
#[derive(Debug, Clone, Copy)]
pub struct ClassicReset {
    flash: bool,
}

impl ClassicReset {
    /// Reset into the ROM bootloader (download mode)
    pub fn to_flash() -> Self {
        ClassicReset { flash: true }
    }

    /// Reset into normal execution of the user firmware
    pub fn to_run() -> Self {
        ClassicReset { flash: false }
    }

    pub fn reset(&self, transport: &mut dyn Transport) -> Result<(), Error> {
        if !transport.is_open() {
            transport.open()?;
        }

        debug!(
            "Resetting into {} mode",
            if self.flash { "flash" } else { "run" }
        );

        // Hold the chip in reset with GPIO0 released
        transport.set_control_line(ControlLine::Dtr, false)?;
        transport.set_control_line(ControlLine::Rts, true)?;
        sleep(RESET_HOLD);

        // Release reset with GPIO0 selecting the boot mode
        transport.set_control_line(ControlLine::Dtr, self.flash)?;
        transport.set_control_line(ControlLine::Rts, false)?;
        sleep(RESET_HOLD);

        // Back to the run-enabling idle state, RTS stays as set
        transport.set_control_line(ControlLine::Dtr, false)?;

        Ok(())
    }
}
