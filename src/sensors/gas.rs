//! MQ-2 combustible gas sensor behind an ADC.
//!
//! The MQ-2 analog output goes through an ADC that the kernel already
//! drives (PCF8591 via the `pcf8591` hwmon driver, MCP3008 via the
//! `mcp320x` IIO driver). Both expose one integer attribute per channel:
//!
//! ```text
//! /sys/bus/i2c/devices/1-0048/in0_input                 (PCF8591, mV)
//! /sys/bus/iio/devices/iio:device1/in_voltage0_raw      (MCP3008, 0-1023)
//! ```
//!
//! A two-point linear calibration maps the raw value to ppm. It is a
//! coarse approximation of the sensor's log-log curve and is meant for
//! thresholding, not metrology.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::app::ports::GasSource;
use crate::error::{ReadError, SensorError};

/// Raw-to-ppm calibration points.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GasCalibration {
    /// Raw ADC value in clean air.
    pub zero_raw: u32,
    /// Raw ADC value at the span concentration.
    pub span_raw: u32,
    /// Concentration at `span_raw`, ppm.
    pub span_ppm: f64,
}

impl Default for GasCalibration {
    fn default() -> Self {
        Self {
            zero_raw: 20,
            span_raw: 255,
            span_ppm: 10_000.0,
        }
    }
}

pub struct AdcGasSensor {
    channel_path: PathBuf,
    cal: GasCalibration,
}

impl AdcGasSensor {
    pub fn open(channel_path: impl AsRef<Path>, cal: GasCalibration) -> Result<Self, SensorError> {
        let path = channel_path.as_ref();
        if !path.is_file() {
            return Err(SensorError::NotFound(path.to_path_buf()));
        }
        info!("MQ-2 ADC channel bound at {}", path.display());
        Ok(Self {
            channel_path: path.to_path_buf(),
            cal,
        })
    }

    fn raw_to_ppm(&self, raw: u32) -> f64 {
        if raw <= self.cal.zero_raw || self.cal.span_raw <= self.cal.zero_raw {
            return 0.0;
        }
        let range = (self.cal.span_raw - self.cal.zero_raw) as f64;
        let normalised = (raw - self.cal.zero_raw) as f64 / range;
        (normalised * self.cal.span_ppm).max(0.0)
    }
}

impl GasSource for AdcGasSensor {
    fn read_gas_ppm(&mut self) -> Result<f64, ReadError> {
        let text = fs::read_to_string(&self.channel_path).map_err(|e| ReadError::from_io(&e))?;
        let raw: u32 = text
            .trim()
            .parse()
            .map_err(|_| ReadError::Failed(format!("unparseable ADC value {:?}", text.trim())))?;
        Ok(self.raw_to_ppm(raw))
    }
}
