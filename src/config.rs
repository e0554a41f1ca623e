//! Monitor configuration.
//!
//! Loaded from an optional TOML file, then overridden from the environment
//! (`DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`). Every field
//! has a default, so an empty file is a valid config.
//!
//! ```toml
//! tick_interval_ms = 1000
//!
//! [control]
//! temperature_high = 30.0
//! humidity_high = 80.0
//!
//! [store]
//! host = "192.168.1.20"
//! queue_capacity = 64
//!
//! [hardware]
//! relay_pin = 15
//! dht_device = "/sys/bus/iio/devices/iio:device0"
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::control::Thresholds;
use crate::error::ConfigError;
use crate::pins::{PinNumbering, RELAY_BCM};
use crate::retry::RetryPolicy;
use crate::sensors::gas::GasCalibration;
use crate::store::Schema;
use crate::store::sql::Identifier;

/// Config file used when `ENVMON_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "envmon.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Pause between the end of one tick and the start of the next (ms).
    pub tick_interval_ms: u64,
    /// Warn after this many consecutive ticks without any data.
    pub no_data_warn_ticks: u32,
    pub control: Thresholds,
    pub reader: ReaderConfig,
    pub store: StoreConfig,
    pub hardware: HardwareConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            no_data_warn_ticks: 10,
            control: Thresholds::default(),
            reader: ReaderConfig::default(),
            store: StoreConfig::default(),
            hardware: HardwareConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub retry: RetryPolicy,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            // The DHT11 needs about a second between conversions.
            retry: RetryPolicy::fixed(3, Duration::from_secs(1)),
        }
    }
}

/// Persistence settings. `Debug` never prints the password.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `false` runs the monitor without persistence.
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
    pub connect_timeout_ms: u64,
    /// Upper bound on one statement, including `SET time_zone`.
    pub statement_timeout_ms: u64,
    /// Session zone as `±HH:MM`.
    pub time_zone: String,
    /// 0 writes inline on the loop thread; otherwise the size of the
    /// background writer's queue.
    pub queue_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            database: "rpi_env_monitor".into(),
            table: "environment_data".into(),
            connect_timeout_ms: 5000,
            statement_timeout_ms: 5000,
            time_zone: "+00:00".into(),
            queue_capacity: 0,
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("table", &self.table)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .field("time_zone", &self.time_zone)
            .field("queue_capacity", &self.queue_capacity)
            .field("retry", &self.retry)
            .finish()
    }
}

impl StoreConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }

    /// The configured zone in the `±HH:MM` form MySQL accepts without
    /// loaded zone tables.
    pub fn session_time_zone(&self) -> Result<String, ConfigError> {
        parse_offset(&self.time_zone).map(format_offset)
    }

    /// Validated identifiers and zone.
    pub fn schema(&self) -> Result<Schema, ConfigError> {
        Ok(Schema {
            database: Identifier::new("store.database", &self.database)?,
            table: Identifier::new("store.table", &self.table)?,
            zone: parse_offset(&self.time_zone)?,
        })
    }
}

fn format_offset(zone: FixedOffset) -> String {
    let secs = zone.local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.unsigned_abs();
    format!("{sign}{:02}:{:02}", secs / 3600, secs % 3600 / 60)
}

/// Parse `+08:00` / `-05:30` / `Z`.
fn parse_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let bad = || ConfigError::invalid("store.time_zone", format!("{s:?} is not an offset like +08:00"));
    if s == "Z" || s == "UTC" {
        return FixedOffset::east_opt(0).ok_or_else(bad);
    }
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(bad()),
    };
    let (h, m) = rest.split_once(':').ok_or_else(bad)?;
    let h: i32 = h.parse().map_err(|_| bad())?;
    let m: i32 = m.parse().map_err(|_| bad())?;
    if h > 14 || m > 59 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (h * 3600 + m * 60)).ok_or_else(bad)
}

/// Where the sensors and the relay live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub numbering: PinNumbering,
    /// Relay input, in `numbering`.
    pub relay_pin: u8,
    pub relay_active_low: bool,
    pub gpio_root: PathBuf,
    /// Added to the BCM number to get the sysfs line (512 on 6.6+ kernels).
    pub gpio_base: u32,
    /// IIO directory of the `dht11` driver.
    pub dht_device: Option<PathBuf>,
    /// Explicit DS18B20 directory. Takes precedence over `w1_bus`.
    pub w1_device: Option<PathBuf>,
    /// Scan this bus for the first DS18B20.
    pub w1_bus: Option<PathBuf>,
    /// ADC channel attribute the MQ-2 is wired to.
    pub gas_channel: Option<PathBuf>,
    pub gas_calibration: GasCalibration,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            numbering: PinNumbering::Bcm,
            relay_pin: RELAY_BCM,
            relay_active_low: false,
            gpio_root: PathBuf::from(crate::drivers::sysfs_gpio::SYSFS_GPIO_ROOT),
            gpio_base: 0,
            dht_device: Some(PathBuf::from("/sys/bus/iio/devices/iio:device0")),
            w1_device: None,
            w1_bus: None,
            gas_channel: None,
            gas_calibration: GasCalibration::default(),
        }
    }
}

impl HardwareConfig {
    /// sysfs line number of the relay.
    pub fn relay_line(&self) -> Result<u32, ConfigError> {
        let bcm = self.numbering.to_bcm(self.relay_pin)?;
        Ok(self.gpio_base + u32::from(bcm))
    }

    fn has_sensor(&self) -> bool {
        self.dht_device.is_some()
            || self.w1_device.is_some()
            || self.w1_bus.is_some()
            || self.gas_channel.is_some()
    }
}

impl MonitorConfig {
    /// Load, apply environment overrides and validate.
    ///
    /// With `path == None` the default file is used if it exists, and
    /// built-in defaults otherwise. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                log::info!("no {} found, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `DB_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("DB_HOST") {
            self.store.host = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            self.store.port = v.trim().parse().map_err(|_| ConfigError::Env {
                var: "DB_PORT",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("DB_USER") {
            self.store.user = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            self.store.password = v;
        }
        if let Some(v) = lookup("DB_NAME") {
            self.store.database = v;
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::invalid("tick_interval_ms", "must be positive"));
        }
        if self.no_data_warn_ticks == 0 {
            return Err(ConfigError::invalid("no_data_warn_ticks", "must be positive"));
        }
        self.control.validate()?;
        self.reader.retry.validate("reader.retry")?;

        if self.store.enabled {
            self.store.retry.validate("store.retry")?;
            self.store.schema()?;
            if self.store.host.trim().is_empty() {
                return Err(ConfigError::invalid("store.host", "must not be empty"));
            }
            if self.store.connect_timeout_ms == 0 {
                return Err(ConfigError::invalid("store.connect_timeout_ms", "must be positive"));
            }
            if self.store.statement_timeout_ms == 0 {
                return Err(ConfigError::invalid("store.statement_timeout_ms", "must be positive"));
            }
        }

        self.hardware.relay_line()?;
        if !self.hardware.has_sensor() {
            return Err(ConfigError::invalid("hardware", "no sensor configured"));
        }
        if self.control.gas_high.is_some() && self.hardware.gas_channel.is_none() {
            return Err(ConfigError::invalid(
                "control.gas_high",
                "set, but hardware.gas_channel is not",
            ));
        }
        let cal = &self.hardware.gas_calibration;
        if cal.span_raw <= cal.zero_raw || cal.span_ppm.is_nan() || cal.span_ppm <= 0.0 {
            return Err(ConfigError::invalid(
                "hardware.gas_calibration",
                "span must lie above zero",
            ));
        }
        Ok(())
    }
}
