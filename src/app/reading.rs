//! The per-tick measurement.

use chrono::{DateTime, Utc};

/// A timestamped, possibly partial measurement.
///
/// Each field is independent: distinct physical sensors may be wired and
/// any one of them may fail on a given tick. A reading with every field
/// `None` means "no data this tick" and is not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    /// Relative humidity, percent.
    pub humidity: Option<f64>,
    /// Gas concentration, ppm.
    pub gas_ppm: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl SensorReading {
    /// A reading with no fields populated.
    pub fn empty(captured_at: DateTime<Utc>) -> Self {
        Self {
            temperature: None,
            humidity: None,
            gas_ppm: None,
            captured_at,
        }
    }

    /// True if at least one numeric field is present.
    pub fn has_data(&self) -> bool {
        self.temperature.is_some() || self.humidity.is_some() || self.gas_ppm.is_some()
    }
}
