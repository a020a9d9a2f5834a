#[allow(clippy::module_inception)]
pub mod bme280;
pub mod calibration;
pub(crate) mod raw_temp;
pub mod reading;

// Re-export the public API things
// This avoids having to do datalogger::bme280::bme280::Bme280, etc
pub use self::bme280::{
    Bme280, Bme280Error, Overscan, OverscanSettings, BME280_ADDRESS, BME280_ALTERNATE_ADDRESS,
    BME280_CHIPID,
};
pub use calibration::{
    compensate_humidity, compensate_pressure, compensate_temperature, fine_temperature,
    CalibrationSet,
};
pub use raw_temp::{RawHumidity, RawSample};
pub use reading::Reading;
