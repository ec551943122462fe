// SPDX-License-Identifier: Apache-2.0

//! The mode state machine and its per-mode side effects.
//!
//! [`Controller`] is the context the control loop owns: the current mode, the hardware
//! capabilities and the sample buffers. Each iteration applies at most one debounced mode
//! request, then runs the side effects of the resident mode:
//!
//! | Mode     | Side effects                                                                  |
//! |----------|-------------------------------------------------------------------------------|
//! | Standby  | conversion off, monitor halted, outputs zeroed                                |
//! | Acquire  | conversion on, acquisition re-armed if released, monitor replays channel A    |
//! | Process  | conversion on, acquisition and monitor halted, difference pass, monitor replays the result |
//! | Transmit | conversion on, result buffer streamed to the host                             |
//!
//! The channel buffers are only ever readable here after
//! [`AcquisitionChannel::halt`] handed them back, and the result buffer is only written while the
//! monitor is halted.

use crate::{
    buffer::{ChannelBuffer, ChannelPair, SampleBuffers},
    mode::Mode,
    mover::{AcquisitionChannel, ModeIndicator, MonitorOutput, MonitorSource},
    process::{DifferenceProcessor, SampleProcessor},
    serial::{ByteTransport, SerialTransmitter},
    switch::ModeRequests,
};

/// Owns the current mode and everything the modes act on.
pub struct Controller<A, M, T, I, P = DifferenceProcessor> {
    /// Current operating mode
    mode: Mode,
    /// Channel movers
    acquisition: A,
    /// Monitor output mover
    monitor: M,
    /// Host link
    transmitter: SerialTransmitter<T>,
    /// Mode display
    indicator: I,
    /// Difference calculation
    processor: P,
    /// Channel buffers while the acquisition movers are halted
    released: Option<ChannelPair>,
    /// Difference output
    result: ChannelBuffer,
    /// A full pass has been written to `result`
    result_ready: bool,
}

impl<A, M, T, I, P> Controller<A, M, T, I, P>
where
    A: AcquisitionChannel,
    M: MonitorOutput,
    T: ByteTransport,
    I: ModeIndicator,
    P: SampleProcessor,
{
    /// Takes ownership of the hardware and buffers and arms the acquisition movers. Starts in
    /// [`Mode::Standby`] with conversion disabled.
    pub fn new(
        mut acquisition: A,
        monitor: M,
        transmitter: SerialTransmitter<T>,
        indicator: I,
        processor: P,
        buffers: SampleBuffers,
    ) -> Self {
        acquisition.set_converting(false);
        acquisition.start(buffers.channels);
        debug!("acquisition movers armed");

        Self {
            mode: Mode::Standby,
            acquisition,
            monitor,
            transmitter,
            indicator,
            processor,
            released: None,
            result: buffers.result,
            result_ready: false,
        }
    }

    /// Current operating mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Result of the last processing pass, if there has been one
    pub fn result(&self) -> Option<&ChannelBuffer> {
        self.result_ready.then_some(&self.result)
    }

    /// Sample processor, for its pass counter
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Applies a mode request. Returns `true` if the mode changed.
    fn apply(&mut self, request: Option<Mode>) -> bool {
        match request {
            Some(next) if next != self.mode => {
                info!("mode change: {} -> {}", self.mode, next);
                self.mode = next;
                true
            }
            _ => false,
        }
    }

    /// One control loop iteration: apply `request`, then run the resident mode's side effects.
    ///
    /// Only a failed serial write is reported; the mode is still updated.
    pub fn step(&mut self, request: Option<Mode>) -> Result<(), T::Error> {
        self.apply(request);
        self.indicator.show(self.mode);

        match self.mode {
            Mode::Standby => {
                self.standby();
                Ok(())
            }
            Mode::Acquire => {
                self.acquire();
                Ok(())
            }
            Mode::Process => {
                self.process();
                Ok(())
            }
            Mode::Transmit => self.transmit(),
        }
    }

    /// Polls `requests` once and steps. Transmit errors are logged and dropped.
    pub fn poll<R: ModeRequests>(&mut self, requests: &mut R) {
        let request = requests.read_mode_request();
        if self.step(request).is_err() {
            warn!("serial transmission aborted in {} mode", self.mode);
        }
    }

    /// Runs the control loop forever.
    pub fn run<R: ModeRequests>(mut self, requests: &mut R) -> ! {
        info!("control loop running in {} mode", self.mode);
        loop {
            self.poll(requests);
        }
    }

    /// Conversion off, monitor halted and outputs at zero.
    fn standby(&mut self) {
        self.acquisition.set_converting(false);
        self.monitor.halt();
        self.monitor.zero_outputs();
    }

    /// Conversion on; re-arms the channel movers after a processing pass and points the monitor
    /// at channel A. The monitor is halted before the channel movers are re-armed.
    fn acquire(&mut self) {
        self.acquisition.set_converting(true);

        let retarget = self.monitor.source() != Some(MonitorSource::ChannelA);
        if retarget {
            self.monitor.halt();
        }

        if let Some(channels) = self.released.take() {
            self.acquisition.start(channels);
            debug!("acquisition movers re-armed");
        }

        if retarget {
            self.monitor.arm(MonitorSource::ChannelA);
            debug!("monitor replaying channel A");
        }
    }

    /// Halts every mover touching the buffers, runs a difference pass and replays the result.
    fn process(&mut self) {
        self.acquisition.set_converting(true);

        if let Some(channels) = self.acquisition.halt() {
            debug!("acquisition movers halted");
            self.released = Some(channels);
        }
        self.monitor.halt();

        let Some(channels) = self.released.as_ref() else {
            error!("channel buffers were not released by the acquisition movers");
            return;
        };
        if self.acquisition.is_active() {
            error!("acquisition movers still active after halt, skipping pass");
            return;
        }

        self.processor.process(channels, &mut self.result);
        self.result_ready = true;
        self.acquisition.set_converting(true);

        self.monitor.arm(MonitorSource::Result);
    }

    /// Conversion on; streams the last result to the host.
    fn transmit(&mut self) -> Result<(), T::Error> {
        self.acquisition.set_converting(true);

        if !self.result_ready {
            debug!("nothing processed yet, skipping transmission");
            return Ok(());
        }
        self.transmitter.transmit(self.result.samples())
    }
}
