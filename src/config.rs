// SPDX-License-Identifier: Apache-2.0

//! Compile-time configuration. Nothing here changes at runtime.

/// Number of samples held by each channel buffer and by the result buffer.
pub const BUFFER_LEN: usize = 1280;

/// Calibration offset added after subtracting channel B from channel A.
///
/// Re-centres the difference on the same idle level as the raw channels. Found on the bench, not
/// derived from the signal: re-measure it when the front end changes.
pub const DEFAULT_OFFSET: u16 = 2100;

/// Time a switch reading must hold before it is accepted as a mode request.
pub const SETTLE_MS: u32 = 50;

/// Conversions per second across both converter channels, paced by the ADC clock divider.
///
/// Each channel is sampled at half this rate.
pub const ADC_RATE_HZ: u32 = 125_000;

/// Serial link speed to the host
pub const SERIAL_BAUD: u32 = 115_200;

/// External high-speed crystal on the pico board is 12Mhz
pub const XOSC_FREQ_HZ: u32 = 12_000_000;

/// Counter top of the monitor PWM slice. Matches the 12-bit converter range so a sample can be
/// written to the compare register unchanged.
pub const MONITOR_PWM_TOP: u16 = 4095;
