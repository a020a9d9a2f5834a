use std::time::Duration;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use thiserror::Error;

use crate::mode::BusPirateMode;

/// Errors raised while talking to the Bus Pirate.
#[derive(Error, Debug)]
pub enum Error {
    /// The serial device is missing or could not be opened.
    #[error("cannot open serial port {path}")]
    Connection {
        path: String,
        #[source]
        source: serialport::Error,
    },

    /// Nothing recognizable arrived before the configured timeout.
    #[error("no response to `{command}` within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// A response arrived but did not contain what the command requires.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Register access was attempted before the terminal reported `I2C>`.
    #[error("Bus Pirate is not in I2C mode")]
    NotInI2cMode,

    /// The serial stream itself failed.
    #[error("serial I/O error")]
    Io(#[from] std::io::Error),
}

/// The reply was present but did not match the expected acknowledgement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("device 0x{address:02X} did not acknowledge {stage} byte 0x{byte:02X}")]
    Nack {
        address: u8,
        byte: u8,
        stage: NackStage,
    },

    #[error("expected {expected} bytes from device 0x{address:02X}, received {received}")]
    ShortRead {
        address: u8,
        expected: usize,
        received: usize,
    },

    #[error("reply to `{command}` is missing `{expected}`")]
    UnexpectedResponse { command: String, expected: String },

    #[error("mode switch finished in {0} mode instead of I2C")]
    ModeSwitchFailed(BusPirateMode),

    #[error("power supply did not report enabled")]
    PowerNotEnabled,
}

/// Which part of a transfer the target refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackStage {
    Address,
    Data,
}

impl std::fmt::Display for NackStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NackStage::Address => f.write_str("address"),
            NackStage::Data => f.write_str("data"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Protocol(ProtocolError::Nack { stage, .. }) => {
                ErrorKind::NoAcknowledge(match stage {
                    NackStage::Address => NoAcknowledgeSource::Address,
                    NackStage::Data => NoAcknowledgeSource::Data,
                })
            }
            _ => ErrorKind::Other,
        }
    }
}

/// Result type alias for Bus Pirate operations
pub type Result<T> = std::result::Result<T, Error>;
