// SPDX-License-Identifier: Apache-2.0

//! Debounced reading of the two mode switches.
//!
//! Both switches are captured, the reader waits out the settle window, and both are captured
//! again. Only a pair of agreeing captures becomes a mode request. Bounce shorter than the window
//! makes the captures disagree and is dropped; the controller then keeps its current mode.
//!
//! An agreeing pair is always accepted, even if both switches bounced onto the same spurious
//! code. The reader only guards against disagreement inside the window.

use embedded_hal::{delay::DelayNs, digital::InputPin};

use crate::{
    config::SETTLE_MS,
    mode::Mode,
};

/// One capture of both switch levels (`true` = high)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SwitchLevels {
    /// Switch A
    pub a: bool,
    /// Switch B
    pub b: bool,
}

impl SwitchLevels {
    /// Every possible capture, in `(a, b)` binary order.
    pub const ALL: [SwitchLevels; 4] = [
        SwitchLevels { a: false, b: false },
        SwitchLevels { a: false, b: true },
        SwitchLevels { a: true, b: false },
        SwitchLevels { a: true, b: true },
    ];

    /// Shorthand constructor
    pub const fn new(a: bool, b: bool) -> Self {
        Self { a, b }
    }

    /// Decodes a settled capture into the mode it selects.
    pub const fn decode(self) -> Mode {
        match (self.a, self.b) {
            (true, false) => Mode::Acquire,
            (false, true) => Mode::Process,
            (true, true) => Mode::Transmit,
            (false, false) => Mode::Standby,
        }
    }
}

/// Compares two captures taken across the settle window. Returns the selected mode if they agree.
pub fn debounce(first: SwitchLevels, second: SwitchLevels) -> Option<Mode> {
    if first == second {
        Some(first.decode())
    } else {
        trace!("switch bounce rejected");
        None
    }
}

/// Anything that can be polled for a mode request once per control loop iteration.
pub trait ModeRequests {
    /// Returns the requested mode, or `None` to keep the current one.
    fn read_mode_request(&mut self) -> Option<Mode>;
}

/// Reads the mode switches through two GPIO inputs, waiting out the settle window with `D`.
pub struct SwitchReader<A, B, D> {
    /// Switch A input
    switch_a: A,
    /// Switch B input
    switch_b: B,
    /// Settle window wait
    delay: D,
    /// Settle window length
    settle_ms: u32,
}

impl<A, B, D> SwitchReader<A, B, D>
where
    A: InputPin,
    B: InputPin,
    D: DelayNs,
{
    /// Reader with the default [`SETTLE_MS`] window.
    pub fn new(switch_a: A, switch_b: B, delay: D) -> Self {
        Self::with_settle_ms(switch_a, switch_b, delay, SETTLE_MS)
    }

    /// Reader with a custom settle window.
    pub fn with_settle_ms(switch_a: A, switch_b: B, delay: D, settle_ms: u32) -> Self {
        Self {
            switch_a,
            switch_b,
            delay,
            settle_ms,
        }
    }

    /// Captures both switches. A failed pin read yields no capture.
    fn capture(&mut self) -> Option<SwitchLevels> {
        match (self.switch_a.is_high(), self.switch_b.is_high()) {
            (Ok(a), Ok(b)) => Some(SwitchLevels { a, b }),
            _ => {
                warn!("Unable to read mode switch inputs");
                None
            }
        }
    }

    /// Capture, wait out the settle window, capture again, and decode if both captures agree.
    ///
    /// Blocks for the whole settle window on every call.
    pub fn read_mode_request(&mut self) -> Option<Mode> {
        let first = self.capture();
        self.delay.delay_ms(self.settle_ms);
        let second = self.capture();

        debounce(first?, second?)
    }

    /// Returns the pins and delay.
    pub fn release(self) -> (A, B, D) {
        (self.switch_a, self.switch_b, self.delay)
    }
}

impl<A, B, D> ModeRequests for SwitchReader<A, B, D>
where
    A: InputPin,
    B: InputPin,
    D: DelayNs,
{
    fn read_mode_request(&mut self) -> Option<Mode> {
        SwitchReader::read_mode_request(self)
    }
}
