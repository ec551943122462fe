//! This [RP2040](https://docs.rs/rp2040-hal) project acquires two analog channels side by side,
//! subtracts one from the other with a fixed DC correction, and either replays the signals to an
//! analog output for live monitoring or streams the difference to a host over a serial link for
//! offline plotting.
//!
//! The operating [`Mode`](mode::Mode) is picked with two switches and runs through a fixed
//! sequence: standby, acquire, process, transmit.
//!
//! ## Layout
//!
//! - [`switch`]: debounced reading of the two mode switches.
//! - [`controller`]: the mode state machine and its per-mode side effects.
//! - [`mover`]: capability traits for the acquisition movers, the monitor output path and the
//!   mode indicator.
//! - [`buffer`]: the three sample buffers and the ownership handles that move them between the
//!   movers and the processor.
//! - [`process`]: the DC-corrected difference.
//! - [`serial`]: text serialization of the result over a byte transport.
//! - `board` and `interrupt` (feature `rp2040`): the RP2040 implementations of the traits above.
//!
//! ## Crate features
//!
//! - `rp2040`: Enables the board bindings and the firmware binary. Implies `defmt`.
//! - `defmt`: Routes log output through [defmt](https://docs.rs/defmt). Without it, the crate
//!   logs through the [`log`] facade, which is what the host tests use.
//! - `trace_samples`: Logs the head of the result buffer after every processing pass. See
//!   [`process::DifferenceProcessor::process`].
//!
//! ## Demo
//!
//! The control loop is the same on hardware and in tests; only the trait implementations change.
//!
//! ```ignore
//! let mut controller = Controller::new(
//!     acquisition,
//!     monitor,
//!     SerialTransmitter::new(uart),
//!     status_leds,
//!     DifferenceProcessor::new(DEFAULT_OFFSET),
//!     SampleBuffers::take().unwrap(),
//! );
//! let mut switches = SwitchReader::new(switch_a, switch_b, timer);
//! controller.run(&mut switches)
//! ```

// Copyright 2026 diffmon developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), feature(doc_auto_cfg), feature(doc_cfg_hide))]

#[macro_use]
mod fmt;

pub mod buffer;
pub mod config;
pub mod controller;
pub mod mode;
pub mod mover;
pub mod process;
pub mod serial;
pub mod switch;

#[cfg(feature = "rp2040")]
pub mod board;
#[cfg(feature = "rp2040")]
pub mod interrupt;
