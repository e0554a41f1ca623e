//! DS18B20 one-wire thermometer via the kernel w1 subsystem.
//!
//! With `dtoverlay=w1-gpio` loaded the kernel enumerates each probe under
//! `/sys/bus/w1/devices/28-xxxxxxxxxxxx/` and every read of `w1_slave`
//! triggers a conversion:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! A `NO` on the CRC line means the scratchpad was corrupted on the wire
//! and the read is worth repeating.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::TemperatureSource;
use crate::error::{ReadError, SensorError};

/// Default w1 bus location on Raspberry Pi OS.
pub const W1_DEVICES: &str = "/sys/bus/w1/devices";

/// DS18B20 family code.
const FAMILY_PREFIX: &str = "28-";

/// Scratchpad power-on value, reported when a conversion never ran.
const POWER_ON_RESET_MILLI_C: i64 = 85_000;

pub struct W1Thermometer {
    slave_path: PathBuf,
}

impl W1Thermometer {
    /// Bind to a specific probe directory (`.../28-0316a2791bff`).
    pub fn open(device_dir: impl AsRef<Path>) -> Result<Self, SensorError> {
        let dir = device_dir.as_ref();
        let slave_path = dir.join("w1_slave");
        if !slave_path.is_file() {
            return Err(SensorError::NotFound(dir.to_path_buf()));
        }
        info!("DS18B20 bound at {}", dir.display());
        Ok(Self { slave_path })
    }

    /// Bind to the first DS18B20 found under `bus_dir`.
    pub fn discover(bus_dir: impl AsRef<Path>) -> Result<Self, SensorError> {
        let bus = bus_dir.as_ref();
        let entries = fs::read_dir(bus).map_err(|source| SensorError::Open {
            path: bus.to_path_buf(),
            source,
        })?;

        let mut probes: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(FAMILY_PREFIX))
            .map(|e| e.path())
            .collect();
        probes.sort();

        match probes.first() {
            Some(dir) => Self::open(dir),
            None => Err(SensorError::NotFound(bus.to_path_buf())),
        }
    }
}

impl TemperatureSource for W1Thermometer {
    fn read_temperature(&mut self) -> Result<f64, ReadError> {
        let raw = fs::read_to_string(&self.slave_path).map_err(|e| ReadError::from_io(&e))?;
        parse_w1_slave(&raw)
    }
}

/// Parse the two-line `w1_slave` format into degrees Celsius.
pub(crate) fn parse_w1_slave(raw: &str) -> Result<f64, ReadError> {
    let mut lines = raw.lines();
    let crc_line = lines
        .next()
        .ok_or_else(|| ReadError::Transient("empty w1_slave".into()))?;
    if !crc_line.trim_end().ends_with("YES") {
        return Err(ReadError::Transient("CRC mismatch".into()));
    }

    let data_line = lines
        .next()
        .ok_or_else(|| ReadError::Transient("truncated w1_slave".into()))?;
    let milli = data_line
        .rsplit_once("t=")
        .and_then(|(_, t)| t.trim().parse::<i64>().ok())
        .ok_or_else(|| ReadError::Failed(format!("unparseable w1_slave line {data_line:?}")))?;

    if milli == POWER_ON_RESET_MILLI_C {
        return Err(ReadError::Transient("conversion not ready".into()));
    }
    Ok(milli as f64 / 1000.0)
}
