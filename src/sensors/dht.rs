//! DHT11 / DHT22 temperature + humidity sensor via the kernel IIO driver.
//!
//! The `dht11` overlay (`dtoverlay=dht11,gpiopin=14`) does the single-wire
//! timing in the kernel and exposes two attributes in milli-units:
//!
//! ```text
//! /sys/bus/iio/devices/iio:device0/in_temp_input              23000
//! /sys/bus/iio/devices/iio:device0/in_humidityrelative_input  61000
//! ```
//!
//! The driver answers a checksum or timing error with `EIO` /
//! `ETIMEDOUT`, which [`ReadError::from_io`] classifies as transient.

use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::TemperatureHumiditySource;
use crate::error::{ReadError, SensorError, Transient};

use super::read_milli_units;

const TEMP_ATTR: &str = "in_temp_input";
const HUMIDITY_ATTR: &str = "in_humidityrelative_input";

pub struct IioHumiture {
    temp_path: PathBuf,
    humidity_path: PathBuf,
}

impl IioHumiture {
    /// Bind to an IIO device directory. Fails if the attributes are missing
    /// (overlay not loaded, wrong device index).
    pub fn open(device_dir: impl AsRef<Path>) -> Result<Self, SensorError> {
        let dir = device_dir.as_ref();
        let temp_path = dir.join(TEMP_ATTR);
        let humidity_path = dir.join(HUMIDITY_ATTR);
        if !temp_path.is_file() || !humidity_path.is_file() {
            return Err(SensorError::NotFound(dir.to_path_buf()));
        }
        info!("DHT sensor bound at {}", dir.display());
        Ok(Self {
            temp_path,
            humidity_path,
        })
    }
}

impl TemperatureHumiditySource for IioHumiture {
    fn read(&mut self) -> Result<(Option<f64>, Option<f64>), ReadError> {
        let temp = read_milli_units(&self.temp_path);
        let humidity = read_milli_units(&self.humidity_path);
        match (temp, humidity) {
            (Ok(t), Ok(h)) => Ok((Some(t), Some(h))),
            // A hard failure on either half ends the read; the reader does
            // not retry it.
            (Err(e), _) | (_, Err(e)) if !e.is_transient() => Err(e),
            (Ok(t), Err(_)) => Ok((Some(t), None)),
            (Err(_), Ok(h)) => Ok((None, Some(h))),
            (Err(e), Err(_)) => Err(e),
        }
    }
}
