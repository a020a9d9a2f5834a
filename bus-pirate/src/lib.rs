//! Host-side driver for the Bus Pirate 5 text terminal.
//!
//! The Bus Pirate exposes a human oriented command line over USB CDC serial.
//! [`BusPirate`] owns that serial session, switches the terminal into I2C
//! mode, enables the on-board power supply and issues I2C transactions as
//! command strings such as `[0xEE 0xD0 [0xEF r:1]`. Every reply is run
//! through the line parser in [`response`] before anything looks at it.
//!
//! [`BusPirate`] also implements [`embedded_hal::i2c::I2c`], so a blocking
//! embedded-hal sensor driver can run unchanged on a workstation with the
//! Bus Pirate wired in as the bus master.
//!
//! ```no_run
//! use bus_pirate::{BusPirate, BusPirateConfig};
//!
//! let mut bp = BusPirate::connect(BusPirateConfig::new("/dev/ttyACM0"))?;
//! bp.detect_mode()?;
//! bp.enter_i2c_mode()?;
//! bp.enable_power_supply()?;
//! let chip_id = bp.read_registers(0x77, 0xD0, 1)?;
//! # Ok::<(), bus_pirate::Error>(())
//! ```

mod bus_pirate;
mod command;
mod config;
mod error;
mod i2c;
mod mode;
pub mod response;
mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use bus_pirate::{list_ports, BusPirate, BUS_PIRATE_PID, BUS_PIRATE_VID};
pub use config::{BusPirateConfig, DEFAULT_BAUD, DEFAULT_PORT};
pub use error::{Error, NackStage, ProtocolError, Result};
pub use mode::BusPirateMode;
pub use transport::Transport;

// Port enumeration results are handed straight to callers.
pub use serialport::{SerialPortInfo, SerialPortType};
