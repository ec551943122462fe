// SPDX-License-Identifier: Apache-2.0

//! Sample buffers and the ownership handles that move them between the movers and the processor.
//!
//! A [`ChannelBuffer`] wraps a `'static` array and can only be in one place at a time. While the
//! acquisition movers are armed they hold both channel buffers as a [`ChannelPair`]; the only way
//! to get the pair back is [`AcquisitionChannel::halt`](crate::mover::AcquisitionChannel::halt),
//! so the processor can never read a buffer that a mover is still writing.

#[cfg(feature = "rp2040")]
use cortex_m::singleton;

use crate::config::BUFFER_LEN;

/// One acquisition cycle worth of samples for a single channel. 12-bit conversions widened to
/// 16 bits.
pub type Samples = [u16; BUFFER_LEN];

/// Exclusive handle on one of the three static sample buffers.
pub struct ChannelBuffer(&'static mut Samples);

impl ChannelBuffer {
    /// Wrap a static buffer
    pub fn new(samples: &'static mut Samples) -> Self {
        Self(samples)
    }

    /// Read access for whoever currently owns the handle
    pub fn samples(&self) -> &Samples {
        &*self.0
    }

    /// Write access for whoever currently owns the handle
    pub fn samples_mut(&mut self) -> &mut Samples {
        &mut *self.0
    }

    /// Address of the first sample, for programming a mover.
    pub fn as_ptr(&self) -> *const u16 {
        self.0.as_ptr()
    }

    /// Unwraps the static buffer
    pub fn into_inner(self) -> &'static mut Samples {
        self.0
    }
}

/// Both channel buffers. Handed to the acquisition movers as a unit and released as a unit.
pub struct ChannelPair {
    /// Channel A samples
    pub a: ChannelBuffer,
    /// Channel B samples
    pub b: ChannelBuffer,
}

/// The three buffers the controller works with.
pub struct SampleBuffers {
    /// Channel buffers, handed to the acquisition movers at startup
    pub channels: ChannelPair,
    /// Difference buffer, written by the processor and read by the transmitter
    pub result: ChannelBuffer,
}

impl SampleBuffers {
    /// Build from three distinct static arrays.
    pub fn new(
        a: &'static mut Samples,
        b: &'static mut Samples,
        result: &'static mut Samples,
    ) -> Self {
        Self {
            channels: ChannelPair {
                a: ChannelBuffer::new(a),
                b: ChannelBuffer::new(b),
            },
            result: ChannelBuffer::new(result),
        }
    }

    /// Creates the three static buffers. Returns `None` if they have already been taken.
    #[cfg(feature = "rp2040")]
    pub fn take() -> Option<Self> {
        let a = singleton!(: Samples = [0u16; BUFFER_LEN])?;
        let b = singleton!(: Samples = [0u16; BUFFER_LEN])?;
        let result = singleton!(: Samples = [0u16; BUFFER_LEN])?;
        Some(Self::new(a, b, result))
    }
}
