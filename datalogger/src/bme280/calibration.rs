//! Factory calibration of the BME280 and the datasheet compensation formulas.
//!
//! The trimming coefficients live in two blocks: 0x88..=0xA1 (temperature,
//! pressure and `dig_H1`) and 0xE1..=0xE7 (the rest of humidity). All
//! arithmetic below is the fixed-point integer code from the Bosch BME280
//! datasheet, section 4.2.3.

use super::raw_temp::{RawHumidity, RawSample};
use super::reading::Reading;

pub(crate) const CALIB_LOWER_REGISTER: u8 = 0x88;
pub(crate) const CALIB_LOWER_LEN: usize = 26;
pub(crate) const CALIB_UPPER_REGISTER: u8 = 0xE1;
pub(crate) const CALIB_UPPER_LEN: usize = 7;

/// Humidity output is clamped to 100 %RH in Q22.10.
const HUMIDITY_MAX_Q22_10: i64 = 419_430_400;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSet {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    /// 12-bit signed, split across 0xE4 and the low nibble of 0xE5.
    pub dig_h4: i16,
    /// 12-bit signed, split across the high nibble of 0xE5 and 0xE6.
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationSet {
    /// Decode both calibration blocks; words are little endian.
    pub fn from_registers(lower: &[u8; CALIB_LOWER_LEN], upper: &[u8; CALIB_UPPER_LEN]) -> Self {
        let unsigned = |i: usize| u16::from_le_bytes([lower[i], lower[i + 1]]);
        let signed = |i: usize| i16::from_le_bytes([lower[i], lower[i + 1]]);
        Self {
            dig_t1: unsigned(0),
            dig_t2: signed(2),
            dig_t3: signed(4),
            dig_p1: unsigned(6),
            dig_p2: signed(8),
            dig_p3: signed(10),
            dig_p4: signed(12),
            dig_p5: signed(14),
            dig_p6: signed(16),
            dig_p7: signed(18),
            dig_p8: signed(20),
            dig_p9: signed(22),
            // 0xA0 is unused
            dig_h1: lower[25],
            dig_h2: i16::from_le_bytes([upper[0], upper[1]]),
            dig_h3: upper[2],
            dig_h4: ((upper[3] as i8 as i16) << 4) | (upper[4] & 0x0F) as i16,
            dig_h5: ((upper[5] as i8 as i16) << 4) | (upper[4] >> 4) as i16,
            dig_h6: upper[6] as i8,
        }
    }
}

/// `t_fine`, the fine resolution temperature shared by all three formulas.
pub fn fine_temperature(raw: RawSample, calib: &CalibrationSet) -> i32 {
    let adc_t = raw.as_i32();
    let dig_t1 = calib.dig_t1 as i32;
    let var1 = (((adc_t >> 3) - (dig_t1 << 1)) * (calib.dig_t2 as i32)) >> 11;
    let var2 = (((((adc_t >> 4) - dig_t1) * ((adc_t >> 4) - dig_t1)) >> 12)
        * (calib.dig_t3 as i32))
        >> 14;
    var1 + var2
}

/// Temperature with a resolution of 0.01 °C.
pub fn compensate_temperature(raw: RawSample, calib: &CalibrationSet) -> Reading {
    let t_fine = fine_temperature(raw, calib);
    Reading::from_centi_celsius((t_fine * 5 + 128) >> 8)
}

/// Pressure in Pa from the 64-bit formula, which yields Q24.8.
pub fn compensate_pressure(raw: RawSample, t_fine: i32, calib: &CalibrationSet) -> f64 {
    let adc_p = raw.as_i32() as i64;
    let mut var1 = t_fine as i64 - 128_000;
    let mut var2 = var1 * var1 * calib.dig_p6 as i64;
    var2 += (var1 * calib.dig_p5 as i64) << 17;
    var2 += (calib.dig_p4 as i64) << 35;
    var1 = ((var1 * var1 * calib.dig_p3 as i64) >> 8) + ((var1 * calib.dig_p2 as i64) << 12);
    var1 = (((1_i64 << 47) + var1) * calib.dig_p1 as i64) >> 33;
    if var1 == 0 {
        // avoid division by zero
        return 0.0;
    }
    let mut p = 1_048_576 - adc_p;
    p = (((p << 31) - var2) * 3125) / var1;
    var1 = (calib.dig_p9 as i64 * (p >> 13) * (p >> 13)) >> 25;
    var2 = (calib.dig_p8 as i64 * p) >> 19;
    p = ((p + var1 + var2) >> 8) + ((calib.dig_p7 as i64) << 4);
    p as f64 / 256.0
}

/// Relative humidity in %RH; the formula yields Q22.10.
///
/// Evaluated in 64 bits, which matches the 32-bit reference for every input
/// where the reference does not overflow.
pub fn compensate_humidity(raw: RawHumidity, t_fine: i32, calib: &CalibrationSet) -> f64 {
    let adc_h = raw.0 as i64;
    let h1 = calib.dig_h1 as i64;
    let h2 = calib.dig_h2 as i64;
    let h3 = calib.dig_h3 as i64;
    let h4 = calib.dig_h4 as i64;
    let h5 = calib.dig_h5 as i64;
    let h6 = calib.dig_h6 as i64;

    let v = t_fine as i64 - 76_800;
    let scaled = (((adc_h << 14) - (h4 << 20) - (h5 * v)) + 16_384) >> 15;
    let gain = ((((((v * h6) >> 10) * (((v * h3) >> 11) + 32_768)) >> 10) + 2_097_152) * h2
        + 8192)
        >> 14;
    let mut v = scaled * gain;
    v -= ((((v >> 15) * (v >> 15)) >> 7) * h1) >> 4;
    let v = v.clamp(0, HUMIDITY_MAX_Q22_10);
    (v >> 12) as f64 / 1024.0
}
