/// A 20-bit ADC conversion as latched in the sensor's msb/lsb/xlsb registers.
///
/// Temperature (0xFA..=0xFC) and pressure (0xF7..=0xF9) share this layout.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawSample(pub u32);

impl RawSample {
    /// Assemble `[msb, lsb, xlsb]`. The low four bits live in the upper
    /// nibble of xlsb, so the 24-bit fold is divided by 16.
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        let folded = bytes.iter().fold(0_u32, |acc, e| acc * 256 + (*e as u32));
        // Divide by 16 by shifting
        Self(folded >> 4)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub(crate) fn as_i32(self) -> i32 {
        self.0 as i32
    }
}

impl std::fmt::Display for RawSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#07x}", self.0)
    }
}

/// The 16-bit humidity conversion from 0xFD..=0xFE, big endian.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RawHumidity(pub u16);

impl RawHumidity {
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_twenty_bits() {
        assert_eq!(RawSample::from_bytes([0x80, 0x2A, 0x80]).value(), 524_968);
        assert_eq!(RawSample::from_bytes([0xFF, 0xFF, 0xF0]).value(), 0xF_FFFF);
        // the low nibble of xlsb is not part of the reading
        assert_eq!(
            RawSample::from_bytes([0x80, 0x00, 0x0F]),
            RawSample::from_bytes([0x80, 0x00, 0x00])
        );
    }

    #[test]
    fn humidity_is_big_endian() {
        assert_eq!(RawHumidity::from_bytes([0x75, 0x30]).0, 30_000);
    }
}
