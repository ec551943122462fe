// SPDX-License-Identifier: Apache-2.0

//! Text serialization of the result buffer for the host plotting tool.
//!
//! The wire format is one unsigned decimal sample per line, CRLF terminated, with no framing or
//! checksum. Bytes go out one at a time, each after the transport reports it can take another.

use core::{fmt::Write, hint::spin_loop};

use heapless::String;

/// Line terminator after every sample
pub const LINE_END: &str = "\r\n";

/// Longest line: five digits for [`u16::MAX`] plus CRLF.
pub const MAX_LINE_LEN: usize = 7;

/// A byte-oriented transmit path with explicit readiness.
pub trait ByteTransport {
    /// Error raised by a byte write
    type Error;

    /// Whether the transport can take another byte right now
    fn is_ready(&mut self) -> bool;

    /// Writes one byte. Only called after [`is_ready`](Self::is_ready) returned `true`.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;
}

/// Formats one sample as a CRLF terminated decimal line.
pub fn format_sample(sample: u16) -> String<MAX_LINE_LEN> {
    let mut line = String::new();
    // Cannot overflow: MAX_LINE_LEN fits u16::MAX and the terminator
    let _ = write!(line, "{}{}", sample, LINE_END);
    line
}

/// Blocking transmitter with a single byte in flight.
pub struct SerialTransmitter<T> {
    /// Underlying byte path
    transport: T,
}

impl<T: ByteTransport> SerialTransmitter<T> {
    /// Wraps a transport
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Spins until the transport is ready, then writes `byte`.
    fn write_byte(&mut self, byte: u8) -> Result<(), T::Error> {
        while !self.transport.is_ready() {
            spin_loop();
        }
        self.transport.write_byte(byte)
    }

    /// Writes one sample line.
    pub fn write_sample(&mut self, sample: u16) -> Result<(), T::Error> {
        for byte in format_sample(sample).bytes() {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Streams every sample in order. Blocks until the last byte has been handed over.
    ///
    /// Stops at the first failed byte write.
    pub fn transmit(&mut self, samples: &[u16]) -> Result<(), T::Error> {
        debug!("transmitting {} samples", samples.len());
        for &sample in samples {
            self.write_sample(sample)?;
        }
        debug!("transmission complete");
        Ok(())
    }

    /// Shared access to the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Unwraps the transport
    pub fn into_inner(self) -> T {
        self.transport
    }
}
