// SPDX-License-Identifier: Apache-2.0

//! Operating modes selected with the mode switches.

use core::fmt;

/// All operating modes. Exactly one is active at a time, owned by the
/// [`Controller`](crate::controller::Controller).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Conversion disabled, analog outputs at zero
    #[default]
    Standby,
    /// Converter streams into the channel buffers; channel A is replayed to the monitor output
    Acquire,
    /// Movers halted, difference computed into the result buffer
    Process,
    /// Result buffer streamed to the host
    Transmit,
}

impl Mode {
    /// Every mode, in sequence order.
    pub const ALL: [Mode; 4] = [Mode::Standby, Mode::Acquire, Mode::Process, Mode::Transmit];

    /// Position in the standby, acquire, process, transmit sequence. Also the index of the
    /// matching status LED.
    pub const fn index(self) -> usize {
        match self {
            Mode::Standby => 0,
            Mode::Acquire => 1,
            Mode::Process => 2,
            Mode::Transmit => 3,
        }
    }

    /// Whether the converter should be running in this mode.
    pub const fn converting(self) -> bool {
        !matches!(self, Mode::Standby)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Standby => "standby",
            Mode::Acquire => "acquire",
            Mode::Process => "process",
            Mode::Transmit => "transmit",
        })
    }
}
