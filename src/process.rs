// SPDX-License-Identifier: Apache-2.0

//! DC-corrected difference of the two channels.

use crate::{
    buffer::{ChannelBuffer, ChannelPair},
    config::DEFAULT_OFFSET,
};

/// A pass over the released channel buffers.
pub trait SampleProcessor {
    /// Writes one full pass computed from `channels` into `result`.
    fn process(&mut self, channels: &ChannelPair, result: &mut ChannelBuffer);
}

/// Computes `a - b + offset` sample by sample.
///
/// Arithmetic stays in 16 bits and wraps, like the fixed-point DSP path this replaces. A
/// difference outside the word range folds around instead of saturating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifferenceProcessor {
    /// Calibration offset added after subtraction
    offset: u16,
    /// Completed passes since startup
    passes: u32,
}

impl Default for DifferenceProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_OFFSET)
    }
}

impl DifferenceProcessor {
    /// Processor with the given calibration offset.
    pub const fn new(offset: u16) -> Self {
        Self { offset, passes: 0 }
    }

    /// Calibration offset in use
    pub fn offset(&self) -> u16 {
        self.offset
    }

    /// Number of completed passes
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// One difference sample
    pub fn difference(&self, a: u16, b: u16) -> u16 {
        a.wrapping_sub(b).wrapping_add(self.offset)
    }

    /// Runs a full pass over both channels into `result`.
    ///
    /// Taking the [`ChannelPair`] by reference means the caller must already hold it, which is
    /// only possible once the acquisition movers have released it.
    pub fn process(&mut self, channels: &ChannelPair, result: &mut ChannelBuffer) {
        let channel_a = channels.a.samples();
        let channel_b = channels.b.samples();
        for ((out, &a), &b) in result.samples_mut().iter_mut().zip(channel_a).zip(channel_b) {
            *out = self.difference(a, b);
        }
        self.passes = self.passes.wrapping_add(1);
        debug!("difference pass {} complete", self.passes);

        #[cfg(feature = "trace_samples")]
        trace!("result head: {:?}", &result.samples()[..8]);
    }
}

impl SampleProcessor for DifferenceProcessor {
    fn process(&mut self, channels: &ChannelPair, result: &mut ChannelBuffer) {
        DifferenceProcessor::process(self, channels, result);
    }
}
