//! Sensor subsystem — sysfs drivers and the aggregating [`RetryingReader`].
//!
//! The reader owns every attached sensor and produces one
//! [`SensorReading`] per tick. Transient read failures are retried under
//! the reader's [`RetryPolicy`]; whatever is still missing afterwards is
//! reported as `None`. A single flaky sensor must not crash the control
//! loop.

pub mod dht;
pub mod ds18b20;
pub mod gas;

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::app::ports::{GasSource, SharedClock, TemperatureHumiditySource, TemperatureSource};
use crate::app::reading::SensorReading;
use crate::error::{ReadError, SensorError};
use crate::retry::RetryPolicy;

/// Aggregates all sensor drivers behind bounded retry.
pub struct RetryingReader {
    policy: RetryPolicy,
    clock: SharedClock,
    humiture: Option<Box<dyn TemperatureHumiditySource + Send>>,
    thermometer: Option<Box<dyn TemperatureSource + Send>>,
    gas: Option<Box<dyn GasSource + Send>>,
    last_captured: Option<chrono::DateTime<chrono::Utc>>,
}

/// Builder for [`RetryingReader`]. Attach the sensors that are wired,
/// then [`build`](Self::build).
pub struct RetryingReaderBuilder {
    policy: RetryPolicy,
    clock: SharedClock,
    humiture: Option<Box<dyn TemperatureHumiditySource + Send>>,
    thermometer: Option<Box<dyn TemperatureSource + Send>>,
    gas: Option<Box<dyn GasSource + Send>>,
}

impl RetryingReaderBuilder {
    pub fn humiture(mut self, source: impl TemperatureHumiditySource + Send + 'static) -> Self {
        self.humiture = Some(Box::new(source));
        self
    }

    pub fn thermometer(mut self, source: impl TemperatureSource + Send + 'static) -> Self {
        self.thermometer = Some(Box::new(source));
        self
    }

    pub fn gas(mut self, source: impl GasSource + Send + 'static) -> Self {
        self.gas = Some(Box::new(source));
        self
    }

    /// Fails with [`SensorError::NoSources`] if nothing was attached.
    pub fn build(self) -> Result<RetryingReader, SensorError> {
        if self.humiture.is_none() && self.thermometer.is_none() && self.gas.is_none() {
            return Err(SensorError::NoSources);
        }
        Ok(RetryingReader {
            policy: self.policy,
            clock: self.clock,
            humiture: self.humiture,
            thermometer: self.thermometer,
            gas: self.gas,
            last_captured: None,
        })
    }
}

impl RetryingReader {
    pub fn builder(policy: RetryPolicy, clock: SharedClock) -> RetryingReaderBuilder {
        RetryingReaderBuilder {
            policy,
            clock,
            humiture: None,
            thermometer: None,
            gas: None,
        }
    }

    /// Read every attached sensor. Never fails.
    ///
    /// Each sensor is retried on its own, so a checksum error on the
    /// humiture line does not cost the thermometer an extra conversion.
    pub fn read(&mut self) -> SensorReading {
        let (ht_temp, humidity) = match self.humiture.as_mut() {
            Some(src) => read_humiture(&self.policy, &self.clock, &mut **src),
            None => (None, None),
        };

        let probe_temp = self.thermometer.as_mut().and_then(|src| {
            read_single(&self.policy, &self.clock, "thermometer", || {
                src.read_temperature()
            })
        });

        let gas_ppm = self
            .gas
            .as_mut()
            .and_then(|src| read_single(&self.policy, &self.clock, "gas", || src.read_gas_ppm()));

        SensorReading {
            // The dedicated probe is the more accurate of the two.
            temperature: probe_temp.or(ht_temp),
            humidity,
            gas_ppm,
            captured_at: self.next_timestamp(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Wall time, clamped so it never goes backwards across reads.
    fn next_timestamp(&mut self) -> chrono::DateTime<chrono::Utc> {
        let now = self.clock.now();
        let ts = match self.last_captured {
            Some(last) if now < last => {
                debug!("clock stepped back by {}, clamping", last - now);
                last
            }
            _ => now,
        };
        self.last_captured = Some(ts);
        ts
    }
}

/// Retry a combined temperature/humidity sensor until both halves are in.
///
/// A partial frame counts as a transient failure, but the half that did
/// arrive is kept in case later attempts come back worse.
fn read_humiture(
    policy: &RetryPolicy,
    clock: &SharedClock,
    src: &mut (dyn TemperatureHumiditySource + Send),
) -> (Option<f64>, Option<f64>) {
    let mut best: (Option<f64>, Option<f64>) = (None, None);

    let outcome = policy.run(&**clock, "humiture", |_| {
        let (t, h) = src.read()?;
        best = (t.or(best.0), h.or(best.1));
        match best {
            (Some(t), Some(h)) => Ok((t, h)),
            _ => Err(ReadError::Transient("partial frame".into())),
        }
    });

    match outcome.result {
        Ok((t, h)) => (Some(t), Some(h)),
        Err(e) => {
            if matches!(e, ReadError::Failed(_)) {
                warn!("humiture read failed: {}", e);
            } else {
                warn!(
                    "humiture still incomplete after {} attempts: {}",
                    outcome.attempts, e
                );
            }
            best
        }
    }
}

fn read_single(
    policy: &RetryPolicy,
    clock: &SharedClock,
    label: &str,
    mut raw: impl FnMut() -> Result<f64, ReadError>,
) -> Option<f64> {
    let outcome = policy.run(&**clock, label, |_| raw());
    match outcome.result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("{} unavailable after {} attempt(s): {}", label, outcome.attempts, e);
            None
        }
    }
}

/// Read an integer sysfs attribute expressed in milli-units.
pub(crate) fn read_milli_units(path: &Path) -> Result<f64, ReadError> {
    let text = fs::read_to_string(path).map_err(|e| ReadError::from_io(&e))?;
    let value = text.trim();
    value.parse::<i64>().map(|v| v as f64 / 1000.0).map_err(|_| {
        ReadError::Failed(format!("unparseable value {:?} in {}", value, path.display()))
    })
}
