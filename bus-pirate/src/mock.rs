//! Scripted stand-in for the serial port.
//!
//! Each expected command line is paired with the text the terminal would
//! print back. Writing a line that differs from the next expectation panics,
//! and once the script is used up the port stays silent so callers time out.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct ScriptedPort {
    script: VecDeque<(String, String)>,
    pending: VecDeque<u8>,
    line: Vec<u8>,
    commands: Vec<String>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` when `command` (without line ending) is written.
    pub fn expect(mut self, command: &str, reply: &str) -> Self {
        self.script.push_back((command.to_string(), reply.to_string()));
        self
    }

    /// Every command line written so far.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }

    fn complete_line(&mut self) {
        let command = String::from_utf8_lossy(&self.line)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.line.clear();
        if let Some((expected, reply)) = self.script.pop_front() {
            assert_eq!(command, expected, "unexpected command to Bus Pirate");
            self.pending.extend(reply.into_bytes());
        }
        self.commands.push(command);
    }
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            self.line.push(byte);
            if byte == b'\n' {
                self.complete_line();
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for ScriptedPort {
    fn discard_input(&mut self) -> io::Result<()> {
        self.pending.clear();
        Ok(())
    }
}
