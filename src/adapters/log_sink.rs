//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`AppEvent`] as one line
//! through the `log` facade, prefixed by subsystem.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn field(v: Option<f64>, unit: &str) -> String {
    v.map_or_else(|| "--".to_owned(), |v| format!("{v:.1}{unit}"))
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TICK | #{} | T={} | RH={} | gas={} | relay={} | cmd={:?}",
                    t.tick,
                    field(t.reading.temperature, "\u{00b0}C"),
                    field(t.reading.humidity, "%"),
                    field(t.reading.gas_ppm, "ppm"),
                    if t.relay_on { "ON" } else { "OFF" },
                    t.command,
                );
            }
            AppEvent::RelaySwitched { on } => {
                info!("RELAY | switched {}", if *on { "ON" } else { "OFF" });
            }
            AppEvent::ActuatorFault { command, error } => {
                warn!("RELAY | {:?} failed: {}", command, error);
            }
            AppEvent::PersistFailed { error, consecutive } => {
                warn!("STORE | write failed ({} in a row): {}", consecutive, error);
            }
            AppEvent::PersistRecovered { after } => {
                info!("STORE | recovered after {} failed write(s)", after);
            }
            AppEvent::NoData { streak } => {
                warn!("TICK | no sensor data for {} consecutive ticks", streak);
            }
            AppEvent::Started { relay_on } => {
                info!("START | relay initially {}", if *relay_on { "ON" } else { "OFF" });
            }
            AppEvent::Stopped { ticks } => {
                info!("STOP | after {} tick(s)", ticks);
            }
        }
    }
}
