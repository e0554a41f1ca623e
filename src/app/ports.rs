//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MonitorLoop (domain)
//! ```
//!
//! Driven adapters (sensors, relay, store, clock, event sinks) implement
//! these traits. The [`MonitorLoop`](super::service::MonitorLoop) consumes
//! them as trait objects chosen at construction, so the domain core never
//! branches on device type and never touches hardware directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::app::reading::SensorReading;
use crate::error::{ActuatorError, ReadError, StoreError};
use crate::store::sql::Statement;

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapters: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A combined temperature / relative-humidity sensor (DHT11, DHT22, ...).
///
/// One call is one raw bus transaction. Either field may come back `None`
/// when the device only delivered half a frame.
pub trait TemperatureHumiditySource {
    /// Returns `(temperature °C, humidity %RH)`.
    fn read(&mut self) -> Result<(Option<f64>, Option<f64>), ReadError>;
}

/// A dedicated thermometer (DS18B20 and friends).
pub trait TemperatureSource {
    fn read_temperature(&mut self) -> Result<f64, ReadError>;
}

/// A gas concentration sensor behind an ADC (MQ-2 and friends).
pub trait GasSource {
    fn read_gas_ppm(&mut self) -> Result<f64, ReadError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// A binary output such as a relay.
///
/// Implementations must be idempotent: `turn_on` while already on has no
/// observable effect. The controller avoids redundant commands, but an
/// external reset can still race it.
pub trait Actuator {
    fn turn_on(&mut self) -> Result<(), ActuatorError>;

    fn turn_off(&mut self) -> Result<(), ActuatorError>;

    /// Current output state as the hardware reports it.
    fn is_on(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Persistence ports
// ───────────────────────────────────────────────────────────────

/// Where readings go.
pub trait PersistenceBackend {
    /// Create the namespace and table if absent. Safe to call repeatedly
    /// and concurrently with other processes doing the same.
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Append one row. Rows land in call order.
    fn insert(&mut self, reading: &SensorReading) -> Result<(), StoreError>;
}

/// Which scope a new connection should open in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectScope<'a> {
    /// Server level, no default database (for `CREATE DATABASE`).
    Server,
    /// Inside the named database.
    Database(&'a str),
}

/// Opens connections for the [`ResilientStore`](crate::store::ResilientStore).
pub trait Connector {
    type Conn: Connection;

    fn connect(&self, scope: ConnectScope<'_>) -> Result<Self::Conn, StoreError>;
}

/// One open connection. Dropping it releases the underlying socket.
pub trait Connection {
    /// Execute a parameterized statement, returning the affected row count.
    fn execute(&mut self, stmt: &Statement) -> Result<u64, StoreError>;

    /// Orderly shutdown. The default just drops the connection.
    fn close(self) -> Result<(), StoreError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Wall time and blocking sleep.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn sleep(&self, duration: Duration);
}

/// Clock handle shared between the reader, the store and the store's
/// background worker.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The loop emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// The store is picked at startup (inline or queued), so the loop may
// hold it boxed.
impl<T: PersistenceBackend + ?Sized> PersistenceBackend for Box<T> {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        (**self).ensure_schema()
    }

    fn insert(&mut self, reading: &SensorReading) -> Result<(), StoreError> {
        (**self).insert(reading)
    }
}
