//! Firmware for the two-channel difference monitor.
#![no_std]
#![no_main]
#![doc(html_playground_url = "https://play.rust-lang.org/")]
#![warn(missing_docs)]

use cortex_m::singleton;
use defmt::{debug, info};
#[allow(unused_imports)]
use defmt_rtt as _;
use embedded_hal::digital::PinState;
#[allow(unused_imports)]
use panic_probe as _;
use rp2040_hal::{
    adc::AdcPin,
    clocks::init_clocks_and_plls,
    dma::DMAExt,
    entry,
    fugit::RateExtU32,
    gpio::{FunctionUart, Pins},
    pac,
    pac::interrupt,
    pwm::Slices,
    uart::{DataBits, StopBits, UartConfig, UartPeripheral},
    Adc, Clock, Sio, Timer, Watchdog,
};

use diffmon::{
    board::{Acquisition, Monitor, SerialPort, Staging, StatusLeds, STAGING_LEN},
    buffer::SampleBuffers,
    config::{ADC_RATE_HZ, DEFAULT_OFFSET, MONITOR_PWM_TOP, SERIAL_BAUD, XOSC_FREQ_HZ},
    controller::Controller,
    process::DifferenceProcessor,
    serial::SerialTransmitter,
    switch::SwitchReader,
};

/// Second-stage bootloader, from [rp2040-boot2](https://docs.rs/rp2040-boot2)
#[link_section = ".boot2"]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

/// Main operation loop
#[entry]
fn main() -> ! {
    info!("Difference monitor startup");
    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = Watchdog::new(pac.WATCHDOG);
    let sio = Sio::new(pac.SIO);

    let clocks = init_clocks_and_plls(
        XOSC_FREQ_HZ,
        pac.XOSC,
        pac.CLOCKS,
        pac.PLL_SYS,
        pac.PLL_USB,
        &mut pac.RESETS,
        &mut watchdog,
    )
    .ok()
    .unwrap();
    let pins = Pins::new(
        pac.IO_BANK0,
        pac.PADS_BANK0,
        sio.gpio_bank0,
        &mut pac.RESETS,
    );
    let timer = Timer::new(pac.TIMER, &mut pac.RESETS, &clocks);

    // Status LEDs, one per mode
    let status_leds = StatusLeds::new([
        pins.gpio6.into_push_pull_output_in_state(PinState::High).into_dyn_pin(),
        pins.gpio7.into_push_pull_output_in_state(PinState::Low).into_dyn_pin(),
        pins.gpio8.into_push_pull_output_in_state(PinState::Low).into_dyn_pin(),
        pins.gpio9.into_push_pull_output_in_state(PinState::Low).into_dyn_pin(),
    ]);

    // Mode switches, debounced in software against the timer
    let mut switches = SwitchReader::new(
        pins.gpio14.into_pull_down_input(),
        pins.gpio15.into_pull_down_input(),
        timer,
    );

    // Host link on UART0, TX on GPIO0
    let uart = UartPeripheral::new(
        pac.UART0,
        (
            pins.gpio0.into_function::<FunctionUart>(),
            pins.gpio1.into_function::<FunctionUart>(),
        ),
        &mut pac.RESETS,
    )
    .enable(
        UartConfig::new(SERIAL_BAUD.Hz(), DataBits::Eight, None, StopBits::One),
        clocks.peripheral_clock.freq(),
    )
    .unwrap();

    // Monitor outputs: 12-bit PWM on GPIO20 (A) and GPIO21 (B), low-pass filtered off board
    let mut pwm_slices = Slices::new(pac.PWM, &mut pac.RESETS);
    pwm_slices.pwm2.set_top(MONITOR_PWM_TOP);
    pwm_slices.pwm2.enable();
    let mut pwm = pwm_slices.pwm2;
    pwm.channel_a.output_to(pins.gpio20);
    pwm.channel_b.output_to(pins.gpio21);

    // Converter: GPIO26 (channel A) and GPIO27 (channel B), round-robin
    let adc = singleton!(: Adc = Adc::new(pac.ADC, &mut pac.RESETS)).unwrap();
    let mut adc_pin_a = AdcPin::new(pins.gpio26.into_floating_input()).unwrap();
    let adc_pin_b = AdcPin::new(pins.gpio27.into_floating_input()).unwrap();
    let readings_fifo = adc
        .build_fifo()
        // Ex. 48 MHz ADC clock at 125 ksamples/s -> conversion every 384 clk cycles
        .clock_divider(
            ((clocks.adc_clock.freq().to_Hz() / ADC_RATE_HZ) - 1) as u16,
            0,
        )
        .set_channel(&mut adc_pin_a)
        .round_robin((&adc_pin_a, &adc_pin_b))
        .enable_dma()
        .start_paused();

    // Buffers and movers
    let dma = pac.DMA.split(&mut pac.RESETS);
    let buffers = SampleBuffers::take().unwrap();
    let staging = singleton!(: Staging = [0u16; STAGING_LEN]).unwrap();
    let staging_ptr: *const Staging = staging;
    // SAFETY: both buffers are static singletons, and the controller halts the monitor before
    // every write to the result buffer.
    let monitor = unsafe { Monitor::new(dma.ch1, pwm, staging_ptr, buffers.result.as_ptr()) };
    let acquisition = Acquisition::new(readings_fifo, dma.ch0, staging);

    debug!("handing peripherals to the controller");
    let controller = Controller::new(
        acquisition,
        monitor,
        SerialTransmitter::new(SerialPort::new(uart)),
        status_leds,
        DifferenceProcessor::new(DEFAULT_OFFSET),
        buffers,
    );

    // SAFETY: the handler only touches the transfer mutexes
    unsafe { pac::NVIC::unmask(pac::Interrupt::DMA_IRQ_0) }
    info!("System initialization complete");
    controller.run(&mut switches)
}

/// Restarts the acquisition and monitor transfers as they complete
#[interrupt]
fn DMA_IRQ_0() {
    diffmon::interrupt::on_dma_irq0();
}
