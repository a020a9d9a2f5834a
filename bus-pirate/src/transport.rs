use std::io::{self, Read, Write};

use serialport::{ClearBuffer, SerialPort};

/// Byte stream to the Bus Pirate terminal.
///
/// Reads are expected to return `TimedOut` or `WouldBlock` when nothing is
/// pending rather than block indefinitely.
pub trait Transport: Read + Write {
    /// Drop anything received but not yet read, so the next reply starts clean.
    fn discard_input(&mut self) -> io::Result<()>;
}

impl Transport for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}
