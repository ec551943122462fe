// SPDX-License-Identifier: Apache-2.0

//! Drives the full controller against in-memory movers, monitor and serial port.

use std::{cell::RefCell, rc::Rc};

use diffmon::{
    buffer::{ChannelBuffer, ChannelPair, SampleBuffers, Samples},
    config::BUFFER_LEN,
    controller::Controller,
    mode::Mode,
    mover::{AcquisitionChannel, ModeIndicator, MonitorOutput, MonitorSource},
    process::{DifferenceProcessor, SampleProcessor},
    serial::{ByteTransport, SerialTransmitter, LINE_END},
    switch::{ModeRequests, SwitchReader},
};
use embedded_hal::delay::DelayNs;
use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    AcquisitionStarted,
    AcquisitionHalted,
    MonitorArmed(MonitorSource),
    MonitorHalted,
    OutputsZeroed,
    PassStarted,
}

/// Shared view of every double, with explicit "active" flags
#[derive(Default)]
struct Model {
    acquisition_active: bool,
    monitor_source: Option<MonitorSource>,
    converting: bool,
    events: Vec<Event>,
    shown: Vec<Mode>,
    sent: Vec<u8>,
    /// Acquisition passes settled so far; seeds the next pass
    generation: u16,
}

type Shared = Rc<RefCell<Model>>;

/// Channel samples the fake converter produces on pass `generation`
fn channel_samples(generation: u16, i: usize) -> (u16, u16) {
    let ramp = 2 * i as u16 + generation;
    (2148 + ramp, 2100 + ramp)
}

struct FakeAcquisition {
    model: Shared,
    channels: Option<ChannelPair>,
}

impl AcquisitionChannel for FakeAcquisition {
    fn start(&mut self, channels: ChannelPair) {
        let mut model = self.model.borrow_mut();
        assert!(!model.acquisition_active, "acquisition re-armed while active");
        assert_eq!(model.monitor_source, None, "acquisition re-armed under an active monitor");
        assert!(self.channels.is_none());
        model.acquisition_active = true;
        model.events.push(Event::AcquisitionStarted);
        self.channels = Some(channels);
    }

    fn halt(&mut self) -> Option<ChannelPair> {
        let mut channels = self.channels.take()?;
        let mut model = self.model.borrow_mut();

        // The last pass settles into the buffers before they are handed back
        model.generation += 1;
        for i in 0..BUFFER_LEN {
            let (a, b) = channel_samples(model.generation, i);
            channels.a.samples_mut()[i] = a;
            channels.b.samples_mut()[i] = b;
        }

        model.acquisition_active = false;
        model.events.push(Event::AcquisitionHalted);
        Some(channels)
    }

    fn is_active(&self) -> bool {
        self.model.borrow().acquisition_active
    }

    fn set_converting(&mut self, enabled: bool) {
        self.model.borrow_mut().converting = enabled;
    }
}

struct FakeMonitor {
    model: Shared,
}

impl MonitorOutput for FakeMonitor {
    fn arm(&mut self, source: MonitorSource) {
        let mut model = self.model.borrow_mut();
        assert_eq!(model.monitor_source, None, "monitor re-armed while active");
        if source == MonitorSource::Result {
            // A pass has just written the result buffer
            assert!(!model.acquisition_active, "processed while movers active");
        }
        model.monitor_source = Some(source);
        model.events.push(Event::MonitorArmed(source));
    }

    fn halt(&mut self) {
        let mut model = self.model.borrow_mut();
        if model.monitor_source.take().is_some() {
            model.events.push(Event::MonitorHalted);
        }
    }

    fn source(&self) -> Option<MonitorSource> {
        self.model.borrow().monitor_source
    }

    fn zero_outputs(&mut self) {
        let mut model = self.model.borrow_mut();
        assert_eq!(model.monitor_source, None, "outputs zeroed under an active monitor");
        model.events.push(Event::OutputsZeroed);
    }
}

struct FakeIndicator {
    model: Shared,
}

impl ModeIndicator for FakeIndicator {
    fn show(&mut self, mode: Mode) {
        self.model.borrow_mut().shown.push(mode);
    }
}

/// Difference processor that checks no mover is active when a pass starts
struct WatchedProcessor {
    model: Shared,
    inner: DifferenceProcessor,
}

impl WatchedProcessor {
    fn passes(&self) -> u32 {
        self.inner.passes()
    }
}

impl SampleProcessor for WatchedProcessor {
    fn process(&mut self, channels: &ChannelPair, result: &mut ChannelBuffer) {
        {
            let mut model = self.model.borrow_mut();
            assert!(!model.acquisition_active, "pass started while acquisition active");
            assert_eq!(model.monitor_source, None, "pass started while monitor active");
            model.events.push(Event::PassStarted);
        }
        self.inner.process(channels, result);
    }
}

/// Line fault reported by [`FakePort`]
#[derive(Debug, PartialEq, Eq)]
struct PortFault;

/// Ready on every other poll. Fails once when `fail_at` bytes have been sent.
struct FakePort {
    model: Shared,
    ready: bool,
    fail_at: Option<usize>,
}

impl ByteTransport for FakePort {
    type Error = PortFault;

    fn is_ready(&mut self) -> bool {
        self.ready = !self.ready;
        self.ready
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        assert!(self.ready, "byte written before port was ready");
        self.ready = false;
        let mut model = self.model.borrow_mut();
        if self.fail_at == Some(model.sent.len()) {
            self.fail_at = None;
            return Err(PortFault);
        }
        model.sent.push(byte);
        Ok(())
    }
}

type TestController =
    Controller<FakeAcquisition, FakeMonitor, FakePort, FakeIndicator, WatchedProcessor>;

fn leak() -> &'static mut Samples {
    Box::leak(Box::new([0u16; BUFFER_LEN]))
}

fn controller(offset: u16) -> (TestController, Shared) {
    controller_with_port(offset, None)
}

fn controller_with_port(offset: u16, fail_at: Option<usize>) -> (TestController, Shared) {
    let model = Shared::default();
    let controller = Controller::new(
        FakeAcquisition {
            model: model.clone(),
            channels: None,
        },
        FakeMonitor {
            model: model.clone(),
        },
        SerialTransmitter::new(FakePort {
            model: model.clone(),
            ready: false,
            fail_at,
        }),
        FakeIndicator {
            model: model.clone(),
        },
        WatchedProcessor {
            model: model.clone(),
            inner: DifferenceProcessor::new(offset),
        },
        SampleBuffers::new(leak(), leak(), leak()),
    );
    (controller, model)
}

fn decode(sent: &[u8]) -> Vec<u16> {
    std::str::from_utf8(sent)
        .unwrap()
        .split_terminator(LINE_END)
        .map(|line| line.parse().unwrap())
        .collect()
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fn level(high: bool) -> State {
    if high {
        State::High
    } else {
        State::Low
    }
}

/// Switch pins that report each `(first, second)` capture pair in turn
fn switches(
    captures: &[((bool, bool), (bool, bool))],
) -> SwitchReader<PinMock, PinMock, NoDelay> {
    let mut a = Vec::new();
    let mut b = Vec::new();
    for &(first, second) in captures {
        a.push(Transaction::get(level(first.0)));
        a.push(Transaction::get(level(second.0)));
        b.push(Transaction::get(level(first.1)));
        b.push(Transaction::get(level(second.1)));
    }
    SwitchReader::new(PinMock::new(&a), PinMock::new(&b), NoDelay)
}

#[test]
fn test_starts_in_standby_with_movers_armed() {
    let (controller, model) = controller(2100);
    assert_eq!(controller.mode(), Mode::Standby);
    assert!(controller.result().is_none());

    let model = model.borrow();
    assert!(model.acquisition_active);
    assert!(!model.converting);
    assert_eq!(model.events, [Event::AcquisitionStarted]);
}

#[test]
fn test_switch_sequence_walks_every_mode() {
    let (mut controller, model) = controller(2100);
    let mut reader = switches(&[
        ((true, false), (true, false)),
        ((false, true), (false, true)),
        ((true, true), (true, true)),
    ]);

    let mut visited = vec![controller.mode()];
    for _ in 0..3 {
        controller.poll(&mut reader);
        visited.push(controller.mode());
    }
    assert_eq!(
        visited,
        [Mode::Standby, Mode::Acquire, Mode::Process, Mode::Transmit]
    );
    assert_eq!(
        model.borrow().shown,
        [Mode::Acquire, Mode::Process, Mode::Transmit]
    );

    let (mut a, mut b, _) = reader.release();
    a.done();
    b.done();
}

#[test]
fn test_bounce_keeps_previous_mode() {
    let (mut controller, _model) = controller(2100);
    let mut reader = switches(&[
        ((true, false), (true, false)),
        ((true, false), (false, false)),
    ]);

    controller.poll(&mut reader);
    assert_eq!(controller.mode(), Mode::Acquire);
    controller.poll(&mut reader);
    assert_eq!(controller.mode(), Mode::Acquire);

    let (mut a, mut b, _) = reader.release();
    a.done();
    b.done();
}

#[test]
fn test_standby_stops_conversion_and_zeroes_outputs() {
    let (mut controller, model) = controller(2100);
    controller.step(Some(Mode::Acquire)).unwrap();
    assert!(model.borrow().converting);
    assert_eq!(
        model.borrow().monitor_source,
        Some(MonitorSource::ChannelA)
    );

    controller.step(Some(Mode::Standby)).unwrap();
    let model = model.borrow();
    assert!(!model.converting);
    assert_eq!(model.monitor_source, None);
    assert_eq!(
        &model.events[model.events.len() - 2..],
        [Event::MonitorHalted, Event::OutputsZeroed]
    );
}

#[test]
fn test_process_computes_offset_difference() {
    let (mut controller, model) = controller(2100);
    controller.step(Some(Mode::Acquire)).unwrap();
    controller.step(Some(Mode::Process)).unwrap();

    let result = controller.result().expect("pass completed");
    assert_eq!(result.samples()[0], 2148);
    assert!(result.samples().iter().all(|&s| s == 2148));

    let model = model.borrow();
    assert!(model.converting);
    assert!(!model.acquisition_active);
    assert_eq!(model.monitor_source, Some(MonitorSource::Result));
    assert_eq!(
        model.events[1..],
        [
            Event::MonitorArmed(MonitorSource::ChannelA),
            Event::AcquisitionHalted,
            Event::MonitorHalted,
            Event::PassStarted,
            Event::MonitorArmed(MonitorSource::Result),
        ]
    );
}

#[test]
fn test_transmit_sends_result_lines() {
    let (mut controller, model) = controller(2100);
    controller.step(Some(Mode::Acquire)).unwrap();
    controller.step(Some(Mode::Process)).unwrap();
    controller.step(Some(Mode::Transmit)).unwrap();

    let sent = decode(&model.borrow().sent);
    assert_eq!(sent.len(), BUFFER_LEN);
    assert_eq!(&sent[..], &controller.result().unwrap().samples()[..]);
}

#[test]
fn test_failed_transmit_keeps_mode_and_retries() {
    const FAIL_AT: usize = 10;
    let (mut controller, model) = controller_with_port(2100, Some(FAIL_AT));
    controller.step(Some(Mode::Acquire)).unwrap();
    controller.step(Some(Mode::Process)).unwrap();

    let mut script = Script(vec![Some(Mode::Transmit), None].into_iter());
    controller.poll(&mut script);
    assert_eq!(controller.mode(), Mode::Transmit);
    assert_eq!(model.borrow().sent.len(), FAIL_AT);

    controller.poll(&mut script);
    assert_eq!(controller.mode(), Mode::Transmit);
    let resent = decode(&model.borrow().sent[FAIL_AT..]);
    assert_eq!(resent.len(), BUFFER_LEN);
    assert_eq!(&resent[..], &controller.result().unwrap().samples()[..]);
}

#[test]
fn test_step_reports_failed_transmit() {
    let (mut controller, _model) = controller_with_port(2100, Some(0));
    controller.step(Some(Mode::Process)).unwrap();
    assert_eq!(controller.step(Some(Mode::Transmit)), Err(PortFault));
    assert_eq!(controller.mode(), Mode::Transmit);
    assert_eq!(controller.step(None), Ok(()));
}

#[test]
fn test_transmit_before_any_pass_sends_nothing() {
    let (mut controller, model) = controller(2100);
    controller.step(Some(Mode::Transmit)).unwrap();
    assert!(model.borrow().sent.is_empty());
    assert!(model.borrow().converting);
}

#[test]
fn test_reacquire_sees_fresh_samples() {
    let (mut controller, model) = controller(0);
    controller.step(Some(Mode::Process)).unwrap();
    let first = *controller.result().unwrap().samples();

    let events = model.borrow().events.len();
    controller.step(Some(Mode::Acquire)).unwrap();
    assert!(model.borrow().acquisition_active);
    // The result replay stops before the channel movers restart
    assert_eq!(
        model.borrow().events[events..],
        [
            Event::MonitorHalted,
            Event::AcquisitionStarted,
            Event::MonitorArmed(MonitorSource::ChannelA),
        ]
    );
    controller.step(Some(Mode::Process)).unwrap();
    let second = *controller.result().unwrap().samples();

    // Channel A leads B by 48 on every pass, so the difference is stable...
    assert_eq!(first, second);
    // ...but the processor did read the buffers of the second pass
    assert_eq!(model.borrow().generation, 2);
    assert_eq!(controller.processor().passes(), 2);
}

#[test]
fn test_repeated_process_is_idempotent() {
    let (mut controller, model) = controller(2100);
    controller.step(Some(Mode::Process)).unwrap();
    let first = *controller.result().unwrap().samples();
    controller.step(None).unwrap();
    controller.step(None).unwrap();

    assert_eq!(&first, controller.result().unwrap().samples());
    // Movers stay halted, so the same settled buffers were processed each time
    assert_eq!(model.borrow().generation, 1);
    assert_eq!(controller.processor().passes(), 3);
}

/// Scripted requests, one per poll
struct Script(std::vec::IntoIter<Option<Mode>>);

impl ModeRequests for Script {
    fn read_mode_request(&mut self) -> Option<Mode> {
        self.0.next().flatten()
    }
}

#[test]
fn test_no_pass_while_movers_active_in_any_sequence() {
    const DEPTH: u32 = 5;
    let choices = Mode::ALL.len();

    for seed in 0..choices.pow(DEPTH) {
        let mut code = seed;
        let sequence: Vec<Mode> = (0..DEPTH)
            .map(|_| {
                let mode = Mode::ALL[code % choices];
                code /= choices;
                mode
            })
            .collect();

        let (mut controller, model) = controller(2100);
        let mut script = Script(
            sequence
                .iter()
                .map(|&mode| Some(mode))
                .collect::<Vec<_>>()
                .into_iter(),
        );

        for &expected in &sequence {
            let passes = controller.processor().passes();
            let events = model.borrow().events.len();

            controller.poll(&mut script);
            assert_eq!(controller.mode(), expected, "{sequence:?}");

            let model = model.borrow();
            let step_events = &model.events[events..];
            let started = step_events
                .iter()
                .filter(|&&e| e == Event::PassStarted)
                .count() as u32;
            assert_eq!(controller.processor().passes() - passes, started);

            // Movers halt before the pass, and the result replay only starts after it
            if let Some(at) = step_events.iter().position(|&e| e == Event::PassStarted) {
                assert!(
                    step_events[..at].iter().all(|e| matches!(
                        e,
                        Event::AcquisitionHalted | Event::MonitorHalted
                    )),
                    "{sequence:?}"
                );
                assert_eq!(
                    step_events[at + 1..],
                    [Event::MonitorArmed(MonitorSource::Result)],
                    "{sequence:?}"
                );
            }

            if expected == Mode::Process {
                assert!(!model.acquisition_active, "{sequence:?}");
                assert_eq!(started, 1);
                if let Some(pass) = controller.result() {
                    let (a, b) = channel_samples(model.generation, 0);
                    assert_eq!(pass.samples()[0], a.wrapping_sub(b).wrapping_add(2100));
                }
            }
            if expected == Mode::Acquire {
                assert!(model.acquisition_active, "{sequence:?}");
                assert_eq!(model.monitor_source, Some(MonitorSource::ChannelA));
            }
        }
    }
}
