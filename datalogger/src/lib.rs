//! Read a BME280 through a Bus Pirate 5 from a workstation.
//!
//! [`bme280`] is a blocking driver generic over `embedded_hal::i2c::I2c`;
//! [`session`] walks the Bus Pirate from power-up to polling with it, and
//! [`config`] loads the settings both need.

pub mod bme280;
pub mod config;
pub mod session;
