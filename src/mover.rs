// SPDX-License-Identifier: Apache-2.0

//! Capability traits for the hardware the controller drives.
//!
//! Each trait covers one peripheral action set: the acquisition movers, the monitor output path
//! and the mode indicator. The serial side lives in [`serial::ByteTransport`](crate::serial).
//! The board implements them on real DMA channels; tests implement them in memory.

use crate::{buffer::ChannelPair, mode::Mode};

/// The two movers that stream converter output into the channel buffers.
///
/// Once started, the movers run on their own and re-trigger after every
/// [`BUFFER_LEN`](crate::config::BUFFER_LEN) samples until halted.
pub trait AcquisitionChannel {
    /// Arms both movers, channel A into `channels.a` and channel B into `channels.b`. The movers
    /// own the buffers until [`halt`](Self::halt).
    fn start(&mut self, channels: ChannelPair);

    /// Stops both movers and hands the buffers back once the last transfer has settled.
    ///
    /// Returns `None` if the movers were not armed.
    fn halt(&mut self) -> Option<ChannelPair>;

    /// Whether either mover is currently armed
    fn is_active(&self) -> bool;

    /// Sets the converter's active-conversion flag. With it cleared, armed movers stall waiting
    /// for samples.
    fn set_converting(&mut self, enabled: bool);
}

/// What the monitor mover replays to the analog output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorSource {
    /// Channel A as it is being acquired
    ChannelA,
    /// The result buffer of the last processing pass
    Result,
}

/// The mover that replays a buffer to the analog output.
pub trait MonitorOutput {
    /// Arms the mover on `source`. Must only be called while halted.
    fn arm(&mut self, source: MonitorSource);

    /// Stops the mover. Does nothing if already halted.
    fn halt(&mut self);

    /// What the mover is replaying, or `None` while halted
    fn source(&self) -> Option<MonitorSource>;

    /// Drives both analog outputs to zero. Must only be called while halted.
    fn zero_outputs(&mut self);
}

/// Shows the current mode to the operator.
pub trait ModeIndicator {
    /// Displays `mode`. Called on every control loop iteration.
    fn show(&mut self, mode: Mode);
}
