//! Error types for the environment monitor.
//!
//! One enum per concern, split by how the control loop treats them:
//!
//! | Type            | Raised by                 | Loop behaviour                  |
//! |-----------------|---------------------------|---------------------------------|
//! | [`ReadError`]   | one raw sensor read       | retried, then degraded to `None`|
//! | [`SensorError`] | sensor adapter `new()`    | fatal at startup                |
//! | [`ActuatorError`]| relay / GPIO             | fatal at startup, logged later  |
//! | [`StoreError`]  | persistence backend       | retried, then logged            |
//! | [`ConfigError`] | `MonitorConfig::validate` | fatal at startup                |

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Implemented by errors that a [`RetryPolicy`](crate::retry::RetryPolicy)
/// may retry.
pub trait Transient {
    /// `true` if the same operation is expected to succeed when repeated.
    fn is_transient(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Sensor read errors
// ---------------------------------------------------------------------------

/// Failure of a single raw sensor read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Busy bus, checksum or timing mismatch, conversion not ready.
    #[error("transient read failure: {0}")]
    Transient(String),
    /// Anything else. Not retried.
    #[error("read failed: {0}")]
    Failed(String),
}

impl ReadError {
    /// Classify an I/O error coming back from a sysfs / IIO attribute read.
    ///
    /// The kernel DHT and w1 drivers report a bad checksum as `EIO` and a
    /// missed edge as `ETIMEDOUT`; both clear on the next attempt.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
                Self::Transient(err.to_string())
            }
            _ if matches!(err.raw_os_error(), Some(libc_errno::EIO | libc_errno::EBUSY)) => {
                Self::Transient(err.to_string())
            }
            _ => Self::Failed(err.to_string()),
        }
    }
}

impl Transient for ReadError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Linux errno values the sysfs adapters care about.
mod libc_errno {
    pub const EIO: i32 = 5;
    pub const EBUSY: i32 = 16;
}

// ---------------------------------------------------------------------------
// Construction-time sensor errors
// ---------------------------------------------------------------------------

/// A sensor handle could not be created. Always fatal.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Nothing is attached where the device was expected.
    #[error("no sensor detected at {0}")]
    NotFound(PathBuf),
    /// The device node exists but cannot be opened.
    #[error("cannot open sensor at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The reader was built with no sources attached.
    #[error("no sensor sources configured")]
    NoSources,
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ActuatorError {
    /// The output line could not be claimed or configured.
    #[error("actuator init failed: {0}")]
    Init(String),
    /// Writing the output level failed.
    #[error("GPIO write failed: {0}")]
    GpioWriteFailed(String),
}

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

/// Errors surfaced by a [`PersistenceBackend`](crate::app::ports::PersistenceBackend).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The server could not be reached.
    #[error("cannot connect to store: {0}")]
    Connect(String),
    /// Connect or statement timed out.
    #[error("store operation timed out: {0}")]
    Timeout(String),
    /// The connection dropped mid-operation (server gone away, reset).
    #[error("store connection lost: {0}")]
    ConnectionLost(String),
    /// Credentials rejected. Not retried.
    #[error("store rejected credentials: {0}")]
    Auth(String),
    /// The statement itself failed. Not retried.
    #[error("store query failed: {0}")]
    Query(String),
    /// Background writer is gone.
    #[error("store writer stopped")]
    WriterStopped,
    /// Background queue had no room even after dropping the oldest entry.
    #[error("store queue full")]
    QueueFull,
    /// Every attempt failed with a transient error.
    #[error("store gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<StoreError>,
    },
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Timeout(_) | Self::ConnectionLost(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The config file is not valid TOML for [`MonitorConfig`](crate::config::MonitorConfig).
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// An environment override had the wrong shape.
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    /// A field failed range validation.
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
