use std::fmt;

/// Bus modes whose prompt is `NAME>`, as printed by Bus Pirate 5 firmware.
const BUS_MODE_PROMPTS: &[&str] = &[
    "1-WIRE", "UART", "HDUART", "SPI", "2WIRE", "3WIRE", "DIO", "LED", "INFRARED", "JTAG",
];

/// Terminal mode, derived from the prompt the Bus Pirate prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusPirateMode {
    /// `HiZ>`: every pin high impedance, only the mode menu is useful.
    Menu,
    /// `I2C>`
    I2c,
    /// Any other bus mode, e.g. `SPI>`.
    Other(String),
}

impl BusPirateMode {
    /// Classify a prompt name, the text in front of `>`.
    pub fn from_prompt(name: &str) -> Option<Self> {
        match name {
            "HiZ" => Some(BusPirateMode::Menu),
            "I2C" => Some(BusPirateMode::I2c),
            other if BUS_MODE_PROMPTS.contains(&other) => {
                Some(BusPirateMode::Other(other.to_string()))
            }
            _ => None,
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            BusPirateMode::Menu => "HiZ",
            BusPirateMode::I2c => "I2C",
            BusPirateMode::Other(name) => name,
        }
    }
}

impl fmt::Display for BusPirateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prompt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_map_to_modes() {
        assert_eq!(BusPirateMode::from_prompt("HiZ"), Some(BusPirateMode::Menu));
        assert_eq!(BusPirateMode::from_prompt("I2C"), Some(BusPirateMode::I2c));
        assert_eq!(
            BusPirateMode::from_prompt("SPI"),
            Some(BusPirateMode::Other("SPI".into()))
        );
        assert_eq!(BusPirateMode::from_prompt("Mode "), None);
        assert_eq!(BusPirateMode::from_prompt("x to exit (3.30) "), None);
    }
}
