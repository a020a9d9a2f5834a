use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_PORT: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD: u32 = 115_200;
const DEFAULT_TIMEOUT_SECONDS: f64 = 3.0;

/// Serial and bring-up settings handed to [`BusPirate::connect`](crate::BusPirate::connect).
///
/// All fields have defaults, so a TOML table only needs the keys that differ:
///
/// ```toml
/// port = "/dev/ttyACM1"
/// timeout_seconds = 5.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BusPirateConfig {
    /// Serial device path (`/dev/ttyACM0`, `COM3`, ...).
    pub port: String,

    pub baud: u32,

    /// Upper bound on the wait for any single reply.
    pub timeout_seconds: f64,

    /// Answer to the `I2C speed` question of the mode menu.
    pub i2c_speed_khz: u16,

    /// Answer to the `Clock stretching` question of the mode menu.
    pub clock_stretching: bool,

    /// Answer to the `Volts` question of the `W` power supply command.
    pub supply_volts: f32,

    /// Answer to `Maximum current`; `None` accepts the firmware default.
    pub current_limit_ma: Option<f32>,
}

impl BusPirateConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    /// Reply timeout as a [`Duration`]. Non-positive or non-finite values
    /// fall back to the default.
    pub fn timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.timeout_seconds) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

impl Default for BusPirateConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: DEFAULT_BAUD,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            i2c_speed_khz: 400,
            clock_stretching: false,
            supply_volts: 3.3,
            current_limit_ma: None,
        }
    }
}
