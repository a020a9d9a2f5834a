use std::fmt;
use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

use embedded_hal::i2c::I2c;
use log::{debug, error, trace};
use serde::Deserialize;
use thiserror::Error;

use super::calibration::{
    compensate_humidity, compensate_pressure, compensate_temperature, fine_temperature,
    CalibrationSet, CALIB_LOWER_LEN, CALIB_LOWER_REGISTER, CALIB_UPPER_LEN, CALIB_UPPER_REGISTER,
};
use super::raw_temp::{RawHumidity, RawSample};
use super::reading::Reading;

// BME280
// SDO tied high selects 0x77, tied low 0x76
pub const BME280_ADDRESS: u8 = 0x77;
pub const BME280_ALTERNATE_ADDRESS: u8 = 0x76;
pub const BME280_CHIPID: u8 = 0x60;

const BME280_REGISTER_CHIPID: u8 = 0xD0;
const BME280_REGISTER_SOFTRESET: u8 = 0xE0;
const BME280_REGISTER_CTRL_HUM: u8 = 0xF2;
const BME280_REGISTER_STATUS: u8 = 0xF3;
const BME280_REGISTER_CTRL_MEAS: u8 = 0xF4;
const BME280_REGISTER_CONFIG: u8 = 0xF5;
const BME280_REGISTER_PRESSDATA: u8 = 0xF7;
const BME280_REGISTER_TEMPDATA: u8 = 0xFA;
const BME280_REGISTER_HUMIDDATA: u8 = 0xFD;

const BME280_SOFTRESET_COMMAND: u8 = 0xB6;
const STATUS_MEASURING: u8 = 0x08;
const MODE_FORCE: u8 = 0b01;
const IIR_FILTER_DISABLE: u8 = 0;
// t_sb 010, only relevant in normal mode
const STANDBY_TC_125: u8 = 0x02;

const BME280_RESET_SLEEP_TIME: Duration = Duration::from_millis(2);
const CONVERSION_POLL_TIME: Duration = Duration::from_millis(2);
const MAX_STATUS_POLLS: u32 = 50;

/// Oversampling ("overscan") setting of one measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overscan {
    /// Channel not measured.
    Skip = 0b000,
    #[default]
    X1 = 0b001,
    X2 = 0b010,
    X4 = 0b011,
    X8 = 0b100,
    X16 = 0b101,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverscanSettings {
    /// Temperature feeds every compensation formula; `Skip` is measured as `X1`.
    pub temperature: Overscan,
    pub pressure: Overscan,
    pub humidity: Overscan,
}

impl OverscanSettings {
    pub const TEMPERATURE_ONLY: Self = Self {
        temperature: Overscan::X2,
        pressure: Overscan::Skip,
        humidity: Overscan::Skip,
    };

    fn ctrl_meas(&self, mode: u8) -> u8 {
        let temperature = match self.temperature {
            Overscan::Skip => Overscan::X1,
            other => other,
        };
        ((temperature as u8) << 5) | ((self.pressure as u8) << 2) | mode
    }
}

impl Default for OverscanSettings {
    /// Temperature ×2, pressure ×16, humidity ×1.
    fn default() -> Self {
        Self {
            temperature: Overscan::X2,
            pressure: Overscan::X16,
            humidity: Overscan::X1,
        }
    }
}

#[derive(Debug, Error)]
pub enum Bme280Error<E: fmt::Debug> {
    #[error("I2C bus error: {0:?}")]
    Bus(E),

    #[error("BME280 chip id mismatch: expected 0x{expected:02X}, found 0x{found:02X}", expected = BME280_CHIPID)]
    DeviceMismatch { found: u8 },

    #[error("calibration coefficients have not been read")]
    NotCalibrated,

    #[error("conversion still running after {polls} status polls")]
    MeasurementTimeout { polls: u32 },
}

type Result<T, E> = std::result::Result<T, Bme280Error<E>>;

/// BME280 on any blocking embedded-hal I2C bus.
pub struct Bme280<I2C> {
    i2c: I2C,
    address: u8,
    overscan: OverscanSettings,
    calibration: Option<CalibrationSet>,
}

impl<I2C: I2c> Bme280<I2C> {
    pub fn new(i2c: I2C, address: u8, overscan: OverscanSettings) -> Self {
        Self {
            i2c,
            address,
            overscan,
            calibration: None,
        }
    }

    /// Identify, reset, calibrate and configure the sensor.
    pub fn init(&mut self) -> Result<&mut Self, I2C::Error> {
        self.verify_chip_id()?;
        self.soft_reset()?;
        self.read_calibration()?;
        self.configure()?;
        Ok(self)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn calibration(&self) -> Option<&CalibrationSet> {
        self.calibration.as_ref()
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn verify_chip_id(&mut self) -> Result<u8, I2C::Error> {
        let [chipid] = self.read_block::<1>(BME280_REGISTER_CHIPID)?;
        if chipid != BME280_CHIPID {
            error!("BME280 chipid mismatch: 0x{:02X}", chipid);
            return Err(Bme280Error::DeviceMismatch { found: chipid });
        }
        Ok(chipid)
    }

    pub fn soft_reset(&mut self) -> Result<(), I2C::Error> {
        self.write_register(BME280_REGISTER_SOFTRESET, BME280_SOFTRESET_COMMAND)?;
        thread::sleep(BME280_RESET_SLEEP_TIME);
        Ok(())
    }

    /// Read both calibration blocks. The set is kept for every later reading.
    pub fn read_calibration(&mut self) -> Result<CalibrationSet, I2C::Error> {
        let lower = self.read_block::<CALIB_LOWER_LEN>(CALIB_LOWER_REGISTER)?;
        let upper = self.read_block::<CALIB_UPPER_LEN>(CALIB_UPPER_REGISTER)?;
        let values = CalibrationSet::from_registers(&lower, &upper);
        debug!("Calibration Coefficients: {:#?}", values);
        self.calibration = Some(values);
        Ok(values)
    }

    /// Humidity oversampling and the filter/standby config. `ctrl_hum` only
    /// takes effect on the next `ctrl_meas` write, which every measurement does.
    pub fn configure(&mut self) -> Result<(), I2C::Error> {
        self.write_register(BME280_REGISTER_CTRL_HUM, self.overscan.humidity as u8)?;
        self.write_register(
            BME280_REGISTER_CONFIG,
            (STANDBY_TC_125 << 5) | (IIR_FILTER_DISABLE << 2),
        )?;
        Ok(())
    }

    fn start_forced_measurement(&mut self) -> Result<(), I2C::Error> {
        let ctrl_meas = self.overscan.ctrl_meas(MODE_FORCE);
        self.write_register(BME280_REGISTER_CTRL_MEAS, ctrl_meas)
    }

    fn get_status(&mut self) -> Result<u8, I2C::Error> {
        let [status] = self.read_block::<1>(BME280_REGISTER_STATUS)?;
        Ok(status)
    }

    fn wait_for_conversion(&mut self) -> Result<(), I2C::Error> {
        for _ in 0..MAX_STATUS_POLLS {
            if self.get_status()? & STATUS_MEASURING == 0 {
                trace!("Conversion complete");
                return Ok(());
            }
            // The datasheet says to wait 2ms
            thread::sleep(CONVERSION_POLL_TIME);
        }
        Err(Bme280Error::MeasurementTimeout {
            polls: MAX_STATUS_POLLS,
        })
    }

    /// The latched temperature conversion from 0xFA..=0xFC.
    pub fn read_raw_temperature(&mut self) -> Result<RawSample, I2C::Error> {
        let raw = RawSample::from_bytes(self.read_block::<3>(BME280_REGISTER_TEMPDATA)?);
        trace!("Temp raw {}", raw);
        Ok(raw)
    }

    pub fn read_raw_pressure(&mut self) -> Result<RawSample, I2C::Error> {
        Ok(RawSample::from_bytes(
            self.read_block::<3>(BME280_REGISTER_PRESSDATA)?,
        ))
    }

    pub fn read_raw_humidity(&mut self) -> Result<RawHumidity, I2C::Error> {
        Ok(RawHumidity::from_bytes(
            self.read_block::<2>(BME280_REGISTER_HUMIDDATA)?,
        ))
    }

    /// Run one forced conversion and return just the temperature.
    pub fn read_temperature(&mut self) -> Result<Reading, I2C::Error> {
        let calib = self.calibration.ok_or(Bme280Error::NotCalibrated)?;
        self.start_forced_measurement()?;
        self.wait_for_conversion()?;
        let raw = self.read_raw_temperature()?;
        Ok(compensate_temperature(raw, &calib))
    }

    /// Run one forced conversion and compensate every enabled channel.
    pub fn measure(&mut self) -> Result<Reading, I2C::Error> {
        let calib = self.calibration.ok_or(Bme280Error::NotCalibrated)?;
        self.start_forced_measurement()?;
        self.wait_for_conversion()?;

        let raw_temp = self.read_raw_temperature()?;
        let t_fine = fine_temperature(raw_temp, &calib);
        let mut reading = compensate_temperature(raw_temp, &calib);
        if self.overscan.pressure != Overscan::Skip {
            let raw = self.read_raw_pressure()?;
            reading = reading.with_pressure(compensate_pressure(raw, t_fine, &calib));
        }
        if self.overscan.humidity != Overscan::Skip {
            let raw = self.read_raw_humidity()?;
            reading = reading.with_humidity(compensate_humidity(raw, t_fine, &calib));
        }
        Ok(reading)
    }

    /// Measure, hand the reading to `on_reading`, sleep `interval`, repeat.
    ///
    /// Returns when `on_reading` breaks or a measurement fails; otherwise runs
    /// until the process is interrupted.
    pub fn poll_loop<F>(&mut self, interval: Duration, mut on_reading: F) -> Result<(), I2C::Error>
    where
        F: FnMut(&Reading) -> ControlFlow<()>,
    {
        loop {
            let reading = self.measure()?;
            if on_reading(&reading).is_break() {
                return Ok(());
            }
            thread::sleep(interval);
        }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), I2C::Error> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Bme280Error::Bus)
    }

    fn read_block<const N: usize>(&mut self, register: u8) -> Result<[u8; N], I2C::Error> {
        let mut data = [0u8; N];
        self.i2c
            .write_read(self.address, &[register], &mut data)
            .map_err(Bme280Error::Bus)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    use super::*;
    use crate::bme280::calibration::tests::{LOWER, UPPER};

    #[derive(Debug)]
    struct FakeError;

    impl embedded_hal::i2c::Error for FakeError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Register file with an auto-incrementing pointer, like the real part.
    struct FakeBme280 {
        registers: [u8; 256],
        writes: Vec<(u8, u8)>,
    }

    impl FakeBme280 {
        fn new(chip_id: u8) -> Self {
            let mut registers = [0u8; 256];
            registers[BME280_REGISTER_CHIPID as usize] = chip_id;
            registers[0x88..0x88 + LOWER.len()].copy_from_slice(&LOWER);
            registers[0xE1..0xE1 + UPPER.len()].copy_from_slice(&UPPER);
            // raw temperature 524968
            registers[0xFA..0xFD].copy_from_slice(&[0x80, 0x2A, 0x80]);
            // raw humidity 30000
            registers[0xFD..0xFF].copy_from_slice(&[0x75, 0x30]);
            Self {
                registers,
                writes: Vec::new(),
            }
        }
    }

    impl ErrorType for FakeBme280 {
        type Error = FakeError;
    }

    impl I2c for FakeBme280 {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> std::result::Result<(), FakeError> {
            if address != BME280_ADDRESS {
                return Err(FakeError);
            }
            let mut pointer = 0usize;
            for operation in operations {
                match operation {
                    Operation::Write(bytes) => {
                        pointer = bytes[0] as usize;
                        for &value in &bytes[1..] {
                            self.writes.push((pointer as u8, value));
                            if pointer != BME280_REGISTER_SOFTRESET as usize {
                                self.registers[pointer] = value;
                            }
                            pointer += 1;
                        }
                    }
                    Operation::Read(buf) => {
                        for slot in buf.iter_mut() {
                            *slot = self.registers[pointer];
                            pointer += 1;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn chip_id_must_be_0x60() {
        for id in 0..=u8::MAX {
            let mut sensor = Bme280::new(FakeBme280::new(id), BME280_ADDRESS, Default::default());
            match sensor.verify_chip_id() {
                Ok(found) => assert_eq!(found, BME280_CHIPID),
                Err(Bme280Error::DeviceMismatch { found }) => {
                    assert_ne!(id, BME280_CHIPID);
                    assert_eq!(found, id);
                }
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn wrong_address_is_a_bus_error() {
        let mut sensor = Bme280::new(FakeBme280::new(0x60), 0x76, Default::default());
        assert!(matches!(sensor.verify_chip_id(), Err(Bme280Error::Bus(FakeError))));
    }

    #[test]
    fn readings_need_calibration() {
        let mut sensor = Bme280::new(FakeBme280::new(0x60), BME280_ADDRESS, Default::default());
        assert!(matches!(sensor.read_temperature(), Err(Bme280Error::NotCalibrated)));
        assert!(matches!(sensor.measure(), Err(Bme280Error::NotCalibrated)));
        assert!(sensor.release().writes.is_empty());
    }

    #[test]
    fn init_resets_and_configures() {
        let mut sensor = Bme280::new(FakeBme280::new(0x60), BME280_ADDRESS, Default::default());
        sensor.init().unwrap();
        assert_eq!(sensor.calibration().unwrap().dig_t3, -1000);
        let fake = sensor.release();
        assert_eq!(
            fake.writes,
            vec![(0xE0, 0xB6), (0xF2, 0x01), (0xF5, 0x40)]
        );
    }

    #[test]
    fn forced_measurement_uses_configured_overscan() {
        let mut sensor = Bme280::new(FakeBme280::new(0x60), BME280_ADDRESS, Default::default());
        sensor.read_calibration().unwrap();
        let reading = sensor.read_temperature().unwrap();
        assert_eq!(reading.centi_celsius(), 2336);
        // osrs_t x2, osrs_p x16, forced
        assert_eq!(sensor.release().registers[0xF4], 0x55);
    }

    #[test]
    fn measure_reports_enabled_channels() {
        let overscan = OverscanSettings {
            pressure: Overscan::Skip,
            ..OverscanSettings::default()
        };
        let mut sensor = Bme280::new(FakeBme280::new(0x60), BME280_ADDRESS, overscan);
        sensor.read_calibration().unwrap();
        let reading = sensor.measure().unwrap();
        assert_eq!(reading.centi_celsius(), 2336);
        assert_eq!(reading.pressure_pa(), None);
        assert!(reading.humidity_percent().is_some());
    }

    #[test]
    fn stuck_conversion_times_out() {
        let mut fake = FakeBme280::new(0x60);
        fake.registers[BME280_REGISTER_STATUS as usize] = STATUS_MEASURING;
        let mut sensor = Bme280::new(fake, BME280_ADDRESS, Default::default());
        sensor.read_calibration().unwrap();
        assert!(matches!(
            sensor.read_temperature(),
            Err(Bme280Error::MeasurementTimeout { .. })
        ));
    }

    #[test]
    fn poll_loop_stops_when_told() {
        let mut sensor = Bme280::new(
            FakeBme280::new(0x60),
            BME280_ADDRESS,
            OverscanSettings::TEMPERATURE_ONLY,
        );
        sensor.read_calibration().unwrap();
        let mut readings = Vec::new();
        sensor
            .poll_loop(Duration::ZERO, |reading| {
                readings.push(reading.to_string());
                if readings.len() == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();
        assert_eq!(readings, vec!["Temperature: 23.36°C"; 3]);
    }

    #[test]
    #[allow(clippy::unusual_byte_groupings)]
    fn skipped_temperature_still_measures() {
        let overscan = OverscanSettings {
            temperature: Overscan::Skip,
            pressure: Overscan::X1,
            humidity: Overscan::X1,
        };
        assert_eq!(overscan.ctrl_meas(MODE_FORCE), 0b001_001_01);
    }
}
