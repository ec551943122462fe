// SPDX-License-Identifier: Apache-2.0

//! DMA completion handling, plus the static [`Mutex`]es the in-flight transfers live in.
//!
//! Both movers are single-buffer DMA transfers that the `DMA_IRQ_0` handler restarts each time
//! they complete, for as long as their streaming flag is set. Halting clears the flag, so the
//! handler leaves the finished transfer in place for the foreground to collect with [`settle`].

use core::{
    cell::{Cell, RefCell},
    hint::spin_loop,
};

use critical_section::Mutex;
use rp2040_hal::{
    adc::DmaReadTarget,
    dma::{single_buffer, Channel, CH0, CH1},
};

use crate::board::{PwmCompare, ReplayWords, ResultWords, Staging};

/// Converter FIFO to staging buffer
pub type AdcTransfer =
    single_buffer::Transfer<Channel<CH0>, DmaReadTarget<u16>, &'static mut Staging>;

/// Monitor replay of the interleaved staging buffer, one channel pair per word
pub type ChannelReplay = single_buffer::Transfer<Channel<CH1>, ReplayWords, PwmCompare<u32>>;

/// Monitor replay of the result buffer
pub type ResultReplay = single_buffer::Transfer<Channel<CH1>, ResultWords, PwmCompare<u16>>;

/// In-flight monitor transfer
pub enum MonitorTransfer {
    /// Replaying the acquired channels
    Channels(ChannelReplay),
    /// Replaying the result buffer
    Result(ResultReplay),
}

/// A transfer parked in one of the statics below
pub trait Parked {
    /// Whether the transfer has completed
    fn settled(&self) -> bool;

    /// Clears the completion interrupt
    fn acknowledge(&mut self);
}

impl Parked for AdcTransfer {
    fn settled(&self) -> bool {
        self.is_done()
    }

    fn acknowledge(&mut self) {
        self.check_irq0();
    }
}

impl Parked for MonitorTransfer {
    fn settled(&self) -> bool {
        match self {
            MonitorTransfer::Channels(transfer) => transfer.is_done(),
            MonitorTransfer::Result(transfer) => transfer.is_done(),
        }
    }

    fn acknowledge(&mut self) {
        match self {
            MonitorTransfer::Channels(transfer) => transfer.check_irq0(),
            MonitorTransfer::Result(transfer) => transfer.check_irq0(),
        };
    }
}

/// Acquisition transfer, while armed
pub static ADC_TRANSFER: Mutex<RefCell<Option<AdcTransfer>>> = Mutex::new(RefCell::new(None));
/// Restart the acquisition transfer on completion
pub static ADC_STREAMING: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Monitor transfer, while armed
pub static MONITOR_TRANSFER: Mutex<RefCell<Option<MonitorTransfer>>> =
    Mutex::new(RefCell::new(None));
/// Restart the monitor transfer on completion
pub static MONITOR_STREAMING: Mutex<Cell<bool>> = Mutex::new(Cell::new(false));

/// Services `DMA_IRQ_0`. Call from the interrupt handler.
pub fn on_dma_irq0() {
    critical_section::with(|cs| {
        let mut adc = ADC_TRANSFER.borrow_ref_mut(cs);
        if let Some(mut transfer) = adc.take() {
            *adc = Some(if transfer.check_irq0() && ADC_STREAMING.borrow(cs).get() {
                let (ch, from, to) = transfer.wait();
                single_buffer::Config::new(ch, from, to).start()
            } else {
                transfer
            });
        }

        let mut monitor = MONITOR_TRANSFER.borrow_ref_mut(cs);
        let streaming = MONITOR_STREAMING.borrow(cs).get();
        *monitor = match monitor.take() {
            Some(MonitorTransfer::Channels(mut transfer)) => {
                Some(MonitorTransfer::Channels(if transfer.check_irq0() && streaming {
                    let (ch, from, to) = transfer.wait();
                    single_buffer::Config::new(ch, from, to).start()
                } else {
                    transfer
                }))
            }
            Some(MonitorTransfer::Result(mut transfer)) => {
                Some(MonitorTransfer::Result(if transfer.check_irq0() && streaming {
                    let (ch, from, to) = transfer.wait();
                    single_buffer::Config::new(ch, from, to).start()
                } else {
                    transfer
                }))
            }
            None => None,
        };
    });
}

/// Stops restarting the transfer in `slot`, waits for it to complete and takes it out.
///
/// Interrupts stay enabled while waiting, so the other transfer keeps streaming. The completion
/// flag is cleared in the same critical section that takes the transfer.
pub fn settle<T: Parked>(
    slot: &'static Mutex<RefCell<Option<T>>>,
    streaming: &'static Mutex<Cell<bool>>,
) -> Option<T> {
    critical_section::with(|cs| streaming.borrow(cs).set(false));
    loop {
        let settled = critical_section::with(|cs| {
            let mut slot = slot.borrow_ref_mut(cs);
            if slot.as_ref().is_some_and(|transfer| !transfer.settled()) {
                return None;
            }
            let mut transfer = slot.take();
            if let Some(transfer) = transfer.as_mut() {
                transfer.acknowledge();
            }
            Some(transfer)
        });

        match settled {
            Some(transfer) => return transfer,
            None => spin_loop(),
        }
    }
}
