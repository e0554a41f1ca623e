//! envmon — environment monitor entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  IioHumiture  W1Thermometer  AdcGasSensor   Relay<SysfsPin>  │
//! │  MySqlConnector → ResilientStore (→ BackgroundStore)         │
//! │  SystemClock  LogEventSink  signal listener                  │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  MonitorLoop: RetryingReader · ThresholdController     │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use envmon::adapters::log_sink::LogEventSink;
use envmon::adapters::signal;
use envmon::adapters::time::SystemClock;
use envmon::app::ports::{PersistenceBackend, SharedClock};
use envmon::app::service::{LoopSettings, MonitorLoop};
use envmon::config::{HardwareConfig, MonitorConfig, StoreConfig};
use envmon::control::ThresholdController;
use envmon::drivers::relay::Relay;
use envmon::drivers::sysfs_gpio::SysfsPin;
use envmon::sensors::RetryingReader;
use envmon::sensors::dht::IioHumiture;
use envmon::sensors::ds18b20::W1Thermometer;
use envmon::sensors::gas::AdcGasSensor;
use envmon::shutdown;
use envmon::store::DiscardStore;

fn main() -> Result<()> {
    // ── 1. Environment + logging ──────────────────────────────
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("envmon v{}", env!("CARGO_PKG_VERSION"));
    if let Ok(path) = dotenv {
        info!("loaded environment from {}", path.display());
    }

    // ── 2. Configuration ──────────────────────────────────────
    let config_path = std::env::var_os("ENVMON_CONFIG").map(PathBuf::from);
    let config = MonitorConfig::load(config_path.as_deref()).context("loading configuration")?;
    info!("config: {:?}", config);

    let clock: SharedClock = Arc::new(SystemClock);

    // ── 3. Construct adapters ─────────────────────────────────
    let reader = build_reader(&config, clock.clone()).context("initialising sensors")?;
    let relay = build_relay(&config.hardware).context("initialising relay")?;
    let store = build_store(&config.store, clock).context("initialising store")?;

    // ── 4. Signals ────────────────────────────────────────────
    let (handle, shutdown) = shutdown::channel();
    signal::install(handle).context("installing signal handler")?;

    // ── 5. Run ────────────────────────────────────────────────
    let monitor = MonitorLoop::new(
        reader,
        store,
        relay,
        ThresholdController::new(config.control),
        LoopSettings {
            tick_interval: config.tick_interval(),
            no_data_warn_ticks: config.no_data_warn_ticks,
        },
    );
    let mut sink = LogEventSink::new();
    let (monitor, summary) = monitor.run(&shutdown, &mut sink);

    // ── 6. Release: relay first, then flush the store ─────────
    let (store, relay, reader) = monitor.into_parts();
    drop(relay);
    drop(store);
    drop(reader);

    info!(
        "stopped after {} tick(s), {} store failure(s), {} actuator failure(s)",
        summary.ticks, summary.store_failures, summary.actuator_failures
    );
    Ok(())
}

fn build_reader(config: &MonitorConfig, clock: SharedClock) -> Result<RetryingReader> {
    let hw = &config.hardware;
    let mut builder = RetryingReader::builder(config.reader.retry, clock);

    if let Some(dir) = &hw.dht_device {
        builder = builder.humiture(IioHumiture::open(dir)?);
    }
    if let Some(dir) = &hw.w1_device {
        builder = builder.thermometer(W1Thermometer::open(dir)?);
    } else if let Some(bus) = &hw.w1_bus {
        builder = builder.thermometer(W1Thermometer::discover(bus)?);
    }
    if let Some(channel) = &hw.gas_channel {
        builder = builder.gas(AdcGasSensor::open(channel, hw.gas_calibration)?);
    }
    Ok(builder.build()?)
}

fn build_relay(hw: &HardwareConfig) -> Result<Relay<SysfsPin>> {
    let line = hw.relay_line()?;
    // Start a freshly exported line at the inactive level.
    let pin = SysfsPin::output(&hw.gpio_root, line, hw.relay_active_low)?;
    Ok(Relay::new(pin, hw.relay_active_low)?)
}

fn build_store(config: &StoreConfig, clock: SharedClock) -> Result<Box<dyn PersistenceBackend>> {
    if !config.enabled {
        warn!("persistence disabled, readings are not stored");
        return Ok(Box::new(DiscardStore));
    }
    mysql_store(config, clock)
}

#[cfg(feature = "mysql")]
fn mysql_store(config: &StoreConfig, clock: SharedClock) -> Result<Box<dyn PersistenceBackend>> {
    use envmon::error::StoreError;
    use envmon::store::mysql::{MySqlConnector, MySqlSettings};
    use envmon::store::{BackgroundStore, ResilientStore};

    let connector = MySqlConnector::new(MySqlSettings {
        host: config.host.clone(),
        port: config.port,
        user: config.user.clone(),
        password: config.password.clone(),
        connect_timeout: config.connect_timeout(),
        statement_timeout: config.statement_timeout(),
        time_zone: config.session_time_zone()?,
    })?;
    let mut store = ResilientStore::new(connector, config.schema()?, config.retry, clock);

    match store.ensure_schema() {
        Ok(()) => {}
        Err(e @ StoreError::Auth(_)) => {
            return Err(anyhow::Error::new(e).context("database rejected the configured credentials"));
        }
        Err(e) => warn!("STORE | schema not ready ({}), retrying on first insert", e),
    }

    if config.queue_capacity > 0 {
        return Ok(Box::new(BackgroundStore::spawn(store, config.queue_capacity)?));
    }
    Ok(Box::new(store))
}

#[cfg(not(feature = "mysql"))]
fn mysql_store(_config: &StoreConfig, _clock: SharedClock) -> Result<Box<dyn PersistenceBackend>> {
    warn!("built without the `mysql` feature, readings are not stored");
    Ok(Box::new(DiscardStore))
}
