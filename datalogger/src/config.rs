//! File configuration for the `bme280` binary.
//!
//! ```toml
//! [bus_pirate]
//! port = "/dev/ttyACM0"
//! baud = 115200
//! timeout_seconds = 3.0
//!
//! [sensor]
//! address = 0x77
//!
//! [sensor.overscan]
//! temperature = "x2"
//! pressure = "x16"
//! humidity = "x1"
//!
//! [poll]
//! interval_seconds = 1.0
//! count = 10
//! timestamps = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bus_pirate::BusPirateConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::bme280::{OverscanSettings, BME280_ADDRESS};
use crate::session::SessionSettings;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file")]
    Parse(#[from] toml::de::Error),

    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bus_pirate: BusPirateConfig,
    pub sensor: SensorConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// 7-bit I2C address.
    pub address: u8,
    pub overscan: OverscanSettings,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: BME280_ADDRESS,
            overscan: OverscanSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub interval_seconds: f64,
    /// Stop after this many readings; `None` polls until interrupted.
    pub count: Option<usize>,
    /// Prefix each reading with the local time.
    pub timestamps: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 1.0,
            count: None,
            timestamps: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let timeout = self.bus_pirate.timeout_seconds;
        if !timeout.is_finite() || timeout <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "timeout_seconds must be positive, got {timeout}"
            )));
        }
        if self.bus_pirate.baud == 0 {
            return Err(ConfigError::Invalid("baud must be non-zero".into()));
        }
        if self.sensor.address > 0x7F {
            return Err(ConfigError::Invalid(format!(
                "address 0x{:02X} is not a 7-bit I2C address",
                self.sensor.address
            )));
        }
        let interval = self.poll.interval_seconds;
        if !interval.is_finite() || interval < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "interval_seconds must not be negative, got {interval}"
            )));
        }
        if self.poll.count == Some(0) {
            return Err(ConfigError::Invalid("count must be at least 1".into()));
        }
        Ok(())
    }

    /// Call after [`validate`](Self::validate).
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            address: self.sensor.address,
            overscan: self.sensor.overscan,
            interval: Duration::try_from_secs_f64(self.poll.interval_seconds)
                .unwrap_or(Duration::from_secs(1)),
            count: self.poll.count,
            timestamps: self.poll.timestamps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bme280::Overscan;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bus_pirate.port, "/dev/ttyACM0");
        assert_eq!(config.bus_pirate.baud, 115_200);
        assert_eq!(config.sensor.address, 0x77);
        config.validate().unwrap();
    }

    #[test]
    fn parses_every_table() {
        let config = Config::from_toml(
            r#"
            [bus_pirate]
            port = "COM4"
            timeout_seconds = 5.0
            i2c_speed_khz = 100

            [sensor]
            address = 0x76

            [sensor.overscan]
            pressure = "skip"
            humidity = "x4"

            [poll]
            interval_seconds = 0.5
            count = 3
            timestamps = true
            "#,
        )
        .unwrap();
        assert_eq!(config.bus_pirate.port, "COM4");
        assert_eq!(config.bus_pirate.timeout(), Duration::from_secs(5));
        assert_eq!(config.bus_pirate.i2c_speed_khz, 100);
        assert_eq!(config.sensor.address, 0x76);
        assert_eq!(config.sensor.overscan.temperature, Overscan::X2);
        assert_eq!(config.sensor.overscan.pressure, Overscan::Skip);
        assert_eq!(config.sensor.overscan.humidity, Overscan::X4);

        let settings = config.session_settings();
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert_eq!(settings.count, Some(3));
        assert!(settings.timestamps);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Config::from_toml("[bus_pirate]\nspeed = 9600\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = Config::default();
        config.bus_pirate.timeout_seconds = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.sensor.address = 0xEE;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.poll.count = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
