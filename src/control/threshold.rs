//! Threshold controller for the relay.
//!
//! Two states, `Off` and `On`. The controller is a pure function of the
//! latest reading and the state the actuator reports:
//!
//! ```text
//!          trigger-high
//!   Off ───────────────▶ On
//!    ▲                    │
//!    └──── all-clear ─────┘
//! ```
//!
//! A command is only produced when it would change the state, which is
//! what keeps the relay from chattering on repeated identical readings.
//!
//! Missing fields are conservative: a `None` never triggers, and a `None`
//! also withholds the all-clear for its clause.

use serde::Deserialize;

use crate::app::reading::SensorReading;
use crate::error::ConfigError;

/// What the loop should do with the actuator this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    TurnOn,
    TurnOff,
    NoChange,
}

/// The controller's view of the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Off,
    On,
}

impl ControlState {
    pub fn from_is_on(is_on: bool) -> Self {
        if is_on { Self::On } else { Self::Off }
    }
}

/// Thresholds the controller compares against.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Turn on at or above this temperature (°C).
    pub temperature_high: f64,
    /// Turn on at or above this relative humidity (%).
    pub humidity_high: f64,
    /// Turn on at or above this gas concentration (ppm). `None` leaves gas
    /// out of the decision entirely.
    pub gas_high: Option<f64>,
    /// Width of the dead band below each threshold. The all-clear needs
    /// every value below `threshold - hysteresis`. Zero gives a single
    /// switching point.
    pub hysteresis: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            temperature_high: 30.0,
            humidity_high: 80.0,
            gas_high: None,
            hysteresis: 0.0,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = |v: f64| v.is_finite();
        if !finite(self.temperature_high) {
            return Err(ConfigError::invalid("control.temperature_high", "must be finite"));
        }
        if !finite(self.humidity_high) || !(0.0..=100.0).contains(&self.humidity_high) {
            return Err(ConfigError::invalid(
                "control.humidity_high",
                "must be a percentage between 0 and 100",
            ));
        }
        if let Some(g) = self.gas_high {
            if !finite(g) || g <= 0.0 {
                return Err(ConfigError::invalid("control.gas_high", "must be positive"));
            }
        }
        if !finite(self.hysteresis) || self.hysteresis < 0.0 {
            return Err(ConfigError::invalid("control.hysteresis", "must be zero or positive"));
        }
        // A zero gap is valid for any threshold, including ones at or below zero.
        if self.hysteresis > 0.0
            && (self.hysteresis >= self.temperature_high
                || self.hysteresis >= self.humidity_high
                || self.gas_high.is_some_and(|g| self.hysteresis >= g))
        {
            return Err(ConfigError::invalid(
                "control.hysteresis",
                "must be smaller than every threshold",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Display for Thresholds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T>={}\u{00b0}C RH>={}%", self.temperature_high, self.humidity_high)?;
        if let Some(g) = self.gas_high {
            write!(f, " gas>={g}ppm")?;
        }
        if self.hysteresis > 0.0 {
            write!(f, " gap={}", self.hysteresis)?;
        }
        Ok(())
    }
}

/// Maps readings to relay commands.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdController {
    limits: Thresholds,
}

impl ThresholdController {
    pub fn new(limits: Thresholds) -> Self {
        Self { limits }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.limits
    }

    /// Decide the command for this tick.
    pub fn decide(&self, reading: &SensorReading, state: ControlState) -> ActuatorCommand {
        match state {
            ControlState::Off if self.triggered(reading) => ActuatorCommand::TurnOn,
            ControlState::On if self.all_clear(reading) => ActuatorCommand::TurnOff,
            _ => ActuatorCommand::NoChange,
        }
    }

    /// Any present field at or above its threshold.
    pub fn triggered(&self, reading: &SensorReading) -> bool {
        let l = &self.limits;
        let at_or_above = |value: Option<f64>, limit: f64| value.is_some_and(|v| v >= limit);

        at_or_above(reading.temperature, l.temperature_high)
            || at_or_above(reading.humidity, l.humidity_high)
            || l.gas_high.is_some_and(|g| at_or_above(reading.gas_ppm, g))
    }

    /// Every participating field present and below its threshold minus the
    /// hysteresis band.
    pub fn all_clear(&self, reading: &SensorReading) -> bool {
        let l = &self.limits;
        let below = |value: Option<f64>, limit: f64| value.is_some_and(|v| v < limit - l.hysteresis);

        below(reading.temperature, l.temperature_high)
            && below(reading.humidity, l.humidity_high)
            && l.gas_high.is_none_or(|g| below(reading.gas_ppm, g))
    }
}
