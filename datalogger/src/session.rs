//! One logging session, from the first prompt to the last reading.
//!
//! The stages run in a fixed order and any failure stops the session with
//! the stage it happened in.

use std::fmt;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::time::Duration;

use bus_pirate::{BusPirate, Transport};
use log::{info, warn};
use thiserror::Error;

use crate::bme280::{
    Bme280, Bme280Error, OverscanSettings, Reading, BME280_ADDRESS, BME280_ALTERNATE_ADDRESS,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DetectMode,
    EnterI2c,
    EnablePower,
    ScanBus,
    VerifyChip,
    LoadCalibration,
    Poll,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DetectMode => "detecting the Bus Pirate mode",
            Stage::EnterI2c => "switching to I2C mode",
            Stage::EnablePower => "enabling the power supply",
            Stage::ScanBus => "scanning the I2C bus",
            Stage::VerifyChip => "verifying the BME280 chip id",
            Stage::LoadCalibration => "loading calibration",
            Stage::Poll => "polling",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Bus Pirate failed while {stage}")]
    BusPirate {
        stage: Stage,
        #[source]
        source: bus_pirate::Error,
    },

    #[error("BME280 failed while {stage}")]
    Sensor {
        stage: Stage,
        #[source]
        source: Bme280Error<bus_pirate::Error>,
    },

    #[error("cannot write reading")]
    Output(#[from] io::Error),
}

impl SessionError {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SessionError::BusPirate { stage, .. } | SessionError::Sensor { stage, .. } => {
                Some(*stage)
            }
            SessionError::Output(_) => None,
        }
    }
}

trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, SessionError>;
}

impl<T> AtStage<T> for bus_pirate::Result<T> {
    fn at(self, stage: Stage) -> Result<T, SessionError> {
        self.map_err(|source| SessionError::BusPirate { stage, source })
    }
}

impl<T> AtStage<T> for Result<T, Bme280Error<bus_pirate::Error>> {
    fn at(self, stage: Stage) -> Result<T, SessionError> {
        self.map_err(|err| match err {
            // bus faults stay Bus Pirate errors whichever layer saw them
            Bme280Error::Bus(source) => SessionError::BusPirate { stage, source },
            source => SessionError::Sensor { stage, source },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub address: u8,
    pub overscan: OverscanSettings,
    pub interval: Duration,
    /// `None` polls until the process is interrupted.
    pub count: Option<usize>,
    pub timestamps: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            address: BME280_ADDRESS,
            overscan: OverscanSettings::default(),
            interval: Duration::from_secs(1),
            count: None,
            timestamps: false,
        }
    }
}

/// Bring the Bus Pirate and sensor up, then write one line per reading to `out`.
pub fn run<T, W>(
    pirate: &mut BusPirate<T>,
    settings: &SessionSettings,
    out: &mut W,
) -> Result<(), SessionError>
where
    T: Transport,
    W: Write,
{
    info!("session on {}", pirate.config().port);
    writeln!(out, "[*] Detecting Bus Pirate mode...")?;
    let mode = pirate.detect_mode().at(Stage::DetectMode)?;
    writeln!(out, "[*] Bus Pirate is in {} mode", mode)?;

    writeln!(out, "[*] Entering I2C mode...")?;
    pirate.enter_i2c_mode().at(Stage::EnterI2c)?;

    writeln!(out, "[*] Enabling power supply...")?;
    pirate.enable_power_supply().at(Stage::EnablePower)?;

    writeln!(out, "[*] Scanning I2C bus...")?;
    let found = pirate.scan_bus().at(Stage::ScanBus)?;
    let listed: Vec<String> = found.iter().map(|a| format!("0x{a:02X}")).collect();
    writeln!(out, "[*] Found devices: {}", listed.join(", "))?;
    let address = sensor_address(settings.address, &found);
    if address != settings.address {
        writeln!(
            out,
            "[*] Nothing at 0x{:02X}, using 0x{address:02X}",
            settings.address
        )?;
    } else if !found.contains(&address) {
        warn!("0x{:02X} did not answer the scan", address);
    }

    let mut sensor = Bme280::new(&mut *pirate, address, settings.overscan);

    let chipid = sensor.verify_chip_id().at(Stage::VerifyChip)?;
    writeln!(out, "[*] BME280 chip id 0x{chipid:02X} at 0x{address:02X}")?;

    sensor.soft_reset().at(Stage::LoadCalibration)?;
    sensor.read_calibration().at(Stage::LoadCalibration)?;
    sensor.configure().at(Stage::LoadCalibration)?;
    writeln!(out, "[*] Calibration loaded")?;

    info!("polling every {:?}", settings.interval);
    writeln!(out, "[*] Reading temperature...")?;
    let mut taken = 0usize;
    let mut output_error = None;
    let polled = sensor.poll_loop(settings.interval, |reading| {
        if let Err(e) = write_reading(out, reading, settings.timestamps) {
            output_error = Some(e);
            return ControlFlow::Break(());
        }
        taken += 1;
        match settings.count {
            Some(count) if taken >= count => ControlFlow::Break(()),
            _ => ControlFlow::Continue(()),
        }
    });
    if let Some(e) = output_error {
        return Err(e.into());
    }
    polled.at(Stage::Poll)
}

/// The configured address, or the other SDO strapping of a BME280 when only
/// that one answered the scan.
fn sensor_address(configured: u8, found: &[u8]) -> u8 {
    let other = match configured {
        BME280_ADDRESS => BME280_ALTERNATE_ADDRESS,
        BME280_ALTERNATE_ADDRESS => BME280_ADDRESS,
        _ => return configured,
    };
    if !found.contains(&configured) && found.contains(&other) {
        other
    } else {
        configured
    }
}

fn write_reading<W: Write>(out: &mut W, reading: &Reading, timestamps: bool) -> io::Result<()> {
    if timestamps {
        let now = chrono::Local::now();
        writeln!(out, "{}  {}", now.format(TIMESTAMP_FORMAT), reading)?;
    } else {
        writeln!(out, "{}", reading)?;
    }
    out.flush()
}
