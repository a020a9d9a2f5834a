use std::fmt;

/// A compensated measurement.
///
/// Temperature is always present; pressure and humidity only when their
/// oversampling is enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    centi_celsius: i32,
    pressure_pa: Option<f64>,
    humidity_percent: Option<f64>,
}

impl Reading {
    /// Build from a temperature in 100ths of a degree Celsius.
    ///
    /// For example, a value of 2336 is 23.36 degrees Celsius.
    pub fn from_centi_celsius(centi_celsius: i32) -> Self {
        Self {
            centi_celsius,
            pressure_pa: None,
            humidity_percent: None,
        }
    }

    pub(crate) fn with_pressure(mut self, pressure_pa: f64) -> Self {
        self.pressure_pa = Some(pressure_pa);
        self
    }

    pub(crate) fn with_humidity(mut self, humidity_percent: f64) -> Self {
        self.humidity_percent = Some(humidity_percent);
        self
    }

    pub fn centi_celsius(&self) -> i32 {
        self.centi_celsius
    }

    pub fn celsius(&self) -> f32 {
        (self.centi_celsius as f32) * 0.01
    }

    /// `F = C * 1.8 + 32`
    pub fn fahrenheit(&self) -> f32 {
        self.celsius() * 1.8 + 32.0
    }

    pub fn pressure_pa(&self) -> Option<f64> {
        self.pressure_pa
    }

    pub fn pressure_hpa(&self) -> Option<f64> {
        self.pressure_pa.map(|pa| pa / 100.0)
    }

    pub fn humidity_percent(&self) -> Option<f64> {
        self.humidity_percent
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // integer formatting keeps the two decimals exact
        let sign = if self.centi_celsius < 0 { "-" } else { "" };
        let magnitude = self.centi_celsius.unsigned_abs();
        write!(
            f,
            "Temperature: {sign}{}.{:02}°C",
            magnitude / 100,
            magnitude % 100
        )?;
        if let Some(hpa) = self.pressure_hpa() {
            write!(f, "  Pressure: {hpa:.2} hPa")?;
        }
        if let Some(humidity) = self.humidity_percent {
            write!(f, "  Humidity: {humidity:.2} %RH")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_two_decimals() {
        assert_eq!(
            Reading::from_centi_celsius(2336).to_string(),
            "Temperature: 23.36°C"
        );
        assert_eq!(
            Reading::from_centi_celsius(-5).to_string(),
            "Temperature: -0.05°C"
        );
        assert_eq!(
            Reading::from_centi_celsius(2000).to_string(),
            "Temperature: 20.00°C"
        );
    }

    #[test]
    fn displays_optional_quantities() {
        let reading = Reading::from_centi_celsius(2508)
            .with_pressure(100_653.25)
            .with_humidity(54.997);
        assert_eq!(
            reading.to_string(),
            "Temperature: 25.08°C  Pressure: 1006.53 hPa  Humidity: 55.00 %RH"
        );
    }

    #[test]
    fn fahrenheit_conversion() {
        let reading = Reading::from_centi_celsius(2000);
        assert!((reading.fahrenheit() - 68.0).abs() < 0.001);
    }
}
