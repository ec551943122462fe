// SPDX-License-Identifier: Apache-2.0

//! RP2040 implementations of the capability traits.
//!
//! The RP2040 has a single ADC with one FIFO, so both channels are converted round-robin and a
//! single DMA channel streams the interleaved pairs into a staging buffer. Halting the
//! acquisition waits for the pass in flight and splits it into the two channel buffers. Arming it
//! again pauses the converter, drains the FIFO and points the round-robin back at channel A, so
//! channel A always lands on the even staging slots.
//!
//! There is no DAC either: the monitor output is PWM slice 2 (GPIO20/GPIO21) with its top set
//! to the converter range, and a second DMA channel paced by the slice wrap writes samples
//! straight into the compare register.

use core::{hint::spin_loop, marker::PhantomData};

use defmt::Format;
use embedded_hal::{
    digital::{OutputPin, PinState},
    pwm::SetDutyCycle,
};
use rp2040_hal::{
    adc::{AdcFifo, DmaReadTarget},
    dma::{single_buffer, Channel, ReadTarget, SingleChannel, WriteTarget, CH0, CH1},
    gpio::{DynPinId, FunctionSio, Pin, PullDown, SioOutput},
    pac,
    pwm::{FreeRunning, Pwm2, Slice},
    uart::{Enabled, UartDevice, UartPeripheral, ValidUartPinout},
};

use crate::{
    buffer::ChannelPair,
    config::BUFFER_LEN,
    interrupt::{
        settle, MonitorTransfer, ADC_STREAMING, ADC_TRANSFER, MONITOR_STREAMING, MONITOR_TRANSFER,
    },
    mode::Mode,
    mover::{AcquisitionChannel, ModeIndicator, MonitorOutput, MonitorSource},
    serial::ByteTransport,
};

/// Interleaved channel A/B conversions, A first
pub const STAGING_LEN: usize = 2 * BUFFER_LEN;

/// DMA target for the converter FIFO
pub type Staging = [u16; STAGING_LEN];

/// PWM slice driving the monitor outputs
pub const MONITOR_SLICE: usize = 2;

/// DREQ raised on every wrap of [`MONITOR_SLICE`]. PWM wrap requests start at DREQ 24.
const DREQ_PWM_WRAP: u8 = 24 + MONITOR_SLICE as u8;

/// ADC input of channel A (GPIO26). Channel B is the next input in the round-robin.
const CHANNEL_A_INPUT: u8 = 0;

/// Status LED output
pub type LedPin = Pin<DynPinId, FunctionSio<SioOutput>, PullDown>;

/// Board-level failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum BoardError {
    /// The UART refused a byte it had reported room for
    UartBusy,
}

/// Staging buffer as 32-bit words: channel A in the low half, channel B in the high half.
///
/// That is the layout of the PWM compare register, so one word drives both monitor outputs.
pub struct ReplayWords {
    /// Address of the staging buffer
    address: u32,
}

// SAFETY: the address points at a `'static` staging buffer of `BUFFER_LEN` words. The buffer is
// only ever written by the acquisition DMA channel.
unsafe impl ReadTarget for ReplayWords {
    type ReceivedWord = u32;

    fn rx_treq() -> Option<u8> {
        None
    }

    fn rx_address_count(&self) -> (u32, u32) {
        (self.address, BUFFER_LEN as u32)
    }

    fn rx_increment(&self) -> bool {
        true
    }
}

/// Result buffer as seen by the monitor mover
pub struct ResultWords {
    /// Address of the result buffer
    address: u32,
}

// SAFETY: the address points at the `'static` result buffer. The controller halts the monitor
// before every write to it.
unsafe impl ReadTarget for ResultWords {
    type ReceivedWord = u16;

    fn rx_treq() -> Option<u8> {
        None
    }

    fn rx_address_count(&self) -> (u32, u32) {
        (self.address, BUFFER_LEN as u32)
    }

    fn rx_increment(&self) -> bool {
        true
    }
}

/// Compare register of [`MONITOR_SLICE`], paced by its wrap.
///
/// A 16-bit write is replicated to both halves of the register, so a result sample drives both
/// outputs.
pub struct PwmCompare<W> {
    /// Word size of the writes
    _word: PhantomData<W>,
}

impl<W> PwmCompare<W> {
    /// Compare register target
    fn new() -> Self {
        Self { _word: PhantomData }
    }

    /// Address of the compare register
    fn address() -> u32 {
        // SAFETY: only the address is taken; the register block is always mapped.
        unsafe { (*pac::PWM::ptr()).ch(MONITOR_SLICE).cc().as_ptr() as u32 }
    }
}

// SAFETY: the compare register accepts any value and is written at a fixed address.
unsafe impl WriteTarget for PwmCompare<u32> {
    type TransmittedWord = u32;

    fn tx_treq() -> Option<u8> {
        Some(DREQ_PWM_WRAP)
    }

    fn tx_address_count(&mut self) -> (u32, u32) {
        (Self::address(), u32::MAX)
    }

    fn tx_increment(&self) -> bool {
        false
    }
}

// SAFETY: as above, with replicated halfword writes.
unsafe impl WriteTarget for PwmCompare<u16> {
    type TransmittedWord = u16;

    fn tx_treq() -> Option<u8> {
        Some(DREQ_PWM_WRAP)
    }

    fn tx_address_count(&mut self) -> (u32, u32) {
        (Self::address(), u32::MAX)
    }

    fn tx_increment(&self) -> bool {
        false
    }
}

/// Splits a settled staging pass into the two channel buffers.
fn deinterleave(staging: &Staging, channels: &mut ChannelPair) {
    let a = channels.a.samples_mut();
    let b = channels.b.samples_mut();
    for (i, pair) in staging.chunks_exact(2).enumerate() {
        a[i] = pair[0];
        b[i] = pair[1];
    }
}

/// Converter FIFO plus DMA channel 0, streaming both channels round-robin.
pub struct Acquisition {
    /// Converter FIFO, paused while conversion is disabled
    fifo: AdcFifo<'static, u16>,
    /// DMA parts while no transfer is in flight
    idle: Option<(Channel<CH0>, DmaReadTarget<u16>, &'static mut Staging)>,
    /// Channel buffers while the movers are armed
    channels: Option<ChannelPair>,
    /// Conversion enabled by the controller
    converting: bool,
}

impl Acquisition {
    /// Takes the paused converter FIFO, DMA channel 0 and the staging buffer.
    pub fn new(fifo: AdcFifo<'static, u16>, mut ch: Channel<CH0>, staging: &'static mut Staging) -> Self {
        ch.enable_irq0();
        let target = fifo.dma_read_target();
        Self {
            fifo,
            idle: Some((ch, target, staging)),
            channels: None,
            converting: false,
        }
    }

    /// Pauses conversion, drains the FIFO and selects channel A for the next conversion.
    fn realign(&mut self) {
        self.fifo.pause();

        // SAFETY: conversion is paused, and nothing else touches the ADC registers
        let adc = unsafe { &*pac::ADC::ptr() };
        while adc.cs().read().ready().bit_is_clear() {
            spin_loop();
        }
        while self.fifo.len() > 0 {
            self.fifo.read();
        }
        adc.cs()
            .modify(|_, w| unsafe { w.ainsel().bits(CHANNEL_A_INPUT) });
    }
}

impl AcquisitionChannel for Acquisition {
    fn start(&mut self, channels: ChannelPair) {
        self.channels = Some(channels);
        let Some((ch, from, to)) = self.idle.take() else {
            error!("acquisition started while a transfer is in flight");
            return;
        };

        self.realign();
        let transfer = single_buffer::Config::new(ch, from, to).start();
        debug!("critical_section: arm acquisition transfer");
        critical_section::with(|cs| {
            ADC_TRANSFER.replace(cs, Some(transfer));
            ADC_STREAMING.borrow(cs).set(true);
        });
        if self.converting {
            self.fifo.resume();
        }
    }

    /// Waits for the pass in flight, so conversion must be running.
    fn halt(&mut self) -> Option<ChannelPair> {
        let mut channels = self.channels.take()?;

        debug!("halt acquisition transfer");
        let parts = settle(&ADC_TRANSFER, &ADC_STREAMING).map(|transfer| transfer.wait());

        match parts {
            Some((ch, from, staging)) => {
                deinterleave(staging, &mut channels);
                self.idle = Some((ch, from, staging));
            }
            None => warn!("acquisition halted with no transfer in flight"),
        }
        Some(channels)
    }

    fn is_active(&self) -> bool {
        self.channels.is_some()
    }

    fn set_converting(&mut self, enabled: bool) {
        self.converting = enabled;
        if enabled {
            self.fifo.resume();
        } else {
            self.fifo.pause();
        }
    }
}

/// PWM slice 2 plus DMA channel 1, replaying samples into the compare register.
pub struct Monitor {
    /// DMA channel while no replay is in flight
    channel: Option<Channel<CH1>>,
    /// Output slice
    pwm: Slice<Pwm2, FreeRunning>,
    /// Address of the staging buffer
    staging: u32,
    /// Address of the result buffer
    result: u32,
    /// Current replay
    source: Option<MonitorSource>,
}

impl Monitor {
    /// Takes DMA channel 1 and the configured output slice.
    ///
    /// # Safety
    ///
    /// `staging` and `result` must point at `'static` buffers of the staging and result size,
    /// and `result` must only be written while the monitor is halted.
    pub unsafe fn new(
        mut channel: Channel<CH1>,
        pwm: Slice<Pwm2, FreeRunning>,
        staging: *const Staging,
        result: *const u16,
    ) -> Self {
        channel.enable_irq0();
        Self {
            channel: Some(channel),
            pwm,
            staging: staging as u32,
            result: result as u32,
            source: None,
        }
    }
}

impl MonitorOutput for Monitor {
    fn arm(&mut self, source: MonitorSource) {
        let Some(ch) = self.channel.take() else {
            warn!("monitor armed while a replay is in flight");
            return;
        };

        let transfer = match source {
            MonitorSource::ChannelA => MonitorTransfer::Channels(
                single_buffer::Config::new(
                    ch,
                    ReplayWords {
                        address: self.staging,
                    },
                    PwmCompare::new(),
                )
                .start(),
            ),
            MonitorSource::Result => MonitorTransfer::Result(
                single_buffer::Config::new(
                    ch,
                    ResultWords {
                        address: self.result,
                    },
                    PwmCompare::new(),
                )
                .start(),
            ),
        };
        debug!("critical_section: arm monitor transfer");
        critical_section::with(|cs| {
            MONITOR_TRANSFER.replace(cs, Some(transfer));
            MONITOR_STREAMING.borrow(cs).set(true);
        });
        self.source = Some(source);
    }

    fn halt(&mut self) {
        if self.source.take().is_none() {
            return;
        }

        debug!("halt monitor transfer");
        self.channel =
            settle(&MONITOR_TRANSFER, &MONITOR_STREAMING).map(|transfer| match transfer {
                MonitorTransfer::Channels(transfer) => transfer.wait().0,
                MonitorTransfer::Result(transfer) => transfer.wait().0,
            });
    }

    fn source(&self) -> Option<MonitorSource> {
        self.source
    }

    fn zero_outputs(&mut self) {
        self.pwm
            .channel_a
            .set_duty_cycle(0)
            .unwrap_or_else(|never| match never {});
        self.pwm
            .channel_b
            .set_duty_cycle(0)
            .unwrap_or_else(|never| match never {});
    }
}

/// UART transmit path to the host
pub struct SerialPort<D: UartDevice, P: ValidUartPinout<D>> {
    /// Enabled UART
    uart: UartPeripheral<Enabled, D, P>,
}

impl<D: UartDevice, P: ValidUartPinout<D>> SerialPort<D, P> {
    /// Wraps an enabled UART
    pub fn new(uart: UartPeripheral<Enabled, D, P>) -> Self {
        Self { uart }
    }
}

impl<D: UartDevice, P: ValidUartPinout<D>> ByteTransport for SerialPort<D, P> {
    type Error = BoardError;

    fn is_ready(&mut self) -> bool {
        self.uart.uart_is_writable()
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), BoardError> {
        match self.uart.write_raw(&[byte]) {
            Ok(rest) if rest.is_empty() => Ok(()),
            _ => Err(BoardError::UartBusy),
        }
    }
}

/// One LED per mode, in [`Mode::index`] order
pub struct StatusLeds {
    /// Standby, acquire, process, transmit
    leds: [LedPin; 4],
    /// Mode currently lit
    shown: Option<Mode>,
}

impl StatusLeds {
    /// Takes the four LED outputs
    pub fn new(leds: [LedPin; 4]) -> Self {
        Self { leds, shown: None }
    }
}

impl ModeIndicator for StatusLeds {
    fn show(&mut self, mode: Mode) {
        if self.shown == Some(mode) {
            return;
        }
        for (i, led) in self.leds.iter_mut().enumerate() {
            led.set_state(PinState::from(i == mode.index()))
                .unwrap_or_else(|never| match never {});
        }
        self.shown = Some(mode);
    }
}
