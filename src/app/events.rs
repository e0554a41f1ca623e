//! Outbound application events.
//!
//! The [`MonitorLoop`](super::service::MonitorLoop) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them.

use crate::app::reading::SensorReading;
use crate::control::ActuatorCommand;

/// Structured events emitted by the monitor loop.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The loop is about to run its first tick.
    Started { relay_on: bool },

    /// One per tick.
    Telemetry(TelemetryData),

    /// The relay was switched by a controller command.
    RelaySwitched { on: bool },

    /// Applying a controller command failed. The loop carries on.
    ActuatorFault { command: ActuatorCommand, error: String },

    /// A reading could not be persisted.
    PersistFailed { error: String, consecutive: u32 },

    /// Persistence works again after `after` failed ticks.
    PersistRecovered { after: u32 },

    /// `streak` consecutive ticks produced no data at all.
    NoData { streak: u32 },

    /// The loop left after `ticks` ticks.
    Stopped { ticks: u64 },
}

/// A point-in-time snapshot of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub tick: u64,
    pub reading: SensorReading,
    pub command: ActuatorCommand,
    pub relay_on: bool,
}
