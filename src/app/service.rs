//! Monitor loop — the hexagonal core.
//!
//! [`MonitorLoop`] owns the reader, the store, the actuator and the
//! controller, and runs the read → persist → decide → actuate cycle.
//! Events go to an [`EventSink`] passed per call, so the same loop can
//! log to the console in production and record into a `Vec` in tests.
//!
//! ```text
//!  RetryingReader ──▶ ┌──────────────────────┐ ──▶ PersistenceBackend
//!                     │     MonitorLoop      │
//!       Actuator ◀──  │  ThresholdController │ ──▶ EventSink
//!                     └──────────────────────┘
//! ```

use std::time::Duration;

use log::{error, info, warn};

use crate::control::{ActuatorCommand, ControlState, ThresholdController};
use crate::sensors::RetryingReader;
use crate::shutdown::Shutdown;

use super::events::{AppEvent, TelemetryData};
use super::ports::{Actuator, EventSink, PersistenceBackend};
use super::reading::SensorReading;

/// What happened to the reading of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    Stored,
    /// Nothing to store: every field was `None`.
    Skipped,
    Failed,
}

/// Result of one [`MonitorLoop::tick`].
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub reading: SensorReading,
    pub command: ActuatorCommand,
    pub persisted: Persisted,
    /// `false` when the command could not be applied.
    pub actuated: bool,
}

/// Loop timing and alerting.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub tick_interval: Duration,
    /// Warn after this many consecutive empty ticks, then at every multiple.
    pub no_data_warn_ticks: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            no_data_warn_ticks: 10,
        }
    }
}

/// Totals handed back by [`MonitorLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub store_failures: u64,
    pub actuator_failures: u64,
}

pub struct MonitorLoop<A: Actuator, S: PersistenceBackend> {
    reader: RetryingReader,
    store: S,
    actuator: A,
    controller: ThresholdController,
    settings: LoopSettings,
    tick_count: u64,
    no_data_streak: u32,
    persist_streak: u32,
    summary: RunSummary,
}

impl<A: Actuator, S: PersistenceBackend> MonitorLoop<A, S> {
    pub fn new(
        reader: RetryingReader,
        store: S,
        actuator: A,
        controller: ThresholdController,
        settings: LoopSettings,
    ) -> Self {
        Self {
            reader,
            store,
            actuator,
            controller,
            settings,
            tick_count: 0,
            no_data_streak: 0,
            persist_streak: 0,
            summary: RunSummary::default(),
        }
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.tick_count,
            ..self.summary
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full cycle: read → persist → decide → actuate.
    ///
    /// Never fails. Store and actuator errors are logged, counted and
    /// emitted; the next tick runs as usual.
    pub fn tick(&mut self, sink: &mut impl EventSink) -> TickReport {
        self.tick_count += 1;

        // 1. Read every attached sensor
        let reading = self.reader.read();

        // 2. Persist before deciding so the row reflects the raw reading
        let persisted = if reading.has_data() {
            self.no_data_streak = 0;
            self.persist(&reading, sink)
        } else {
            self.no_data_streak += 1;
            let every = self.settings.no_data_warn_ticks.max(1);
            if self.no_data_streak % every == 0 {
                sink.emit(&AppEvent::NoData {
                    streak: self.no_data_streak,
                });
            }
            Persisted::Skipped
        };

        // 3. The relay is the source of truth, in case something else flipped it
        let state = ControlState::from_is_on(self.actuator.is_on());

        // 4. Decide and apply
        let command = self.controller.decide(&reading, state);
        let applied = match command {
            ActuatorCommand::TurnOn => self.actuator.turn_on(),
            ActuatorCommand::TurnOff => self.actuator.turn_off(),
            ActuatorCommand::NoChange => Ok(()),
        };
        let actuated = match applied {
            Ok(()) => {
                if command != ActuatorCommand::NoChange {
                    sink.emit(&AppEvent::RelaySwitched {
                        on: command == ActuatorCommand::TurnOn,
                    });
                }
                true
            }
            Err(e) => {
                self.summary.actuator_failures += 1;
                error!("{:?} failed: {}", command, e);
                sink.emit(&AppEvent::ActuatorFault {
                    command,
                    error: e.to_string(),
                });
                false
            }
        };

        // 5. Telemetry
        sink.emit(&AppEvent::Telemetry(TelemetryData {
            tick: self.tick_count,
            reading,
            command,
            relay_on: self.actuator.is_on(),
        }));

        TickReport {
            reading,
            command,
            persisted,
            actuated,
        }
    }

    fn persist(&mut self, reading: &SensorReading, sink: &mut impl EventSink) -> Persisted {
        match self.store.insert(reading) {
            Ok(()) => {
                if self.persist_streak > 0 {
                    sink.emit(&AppEvent::PersistRecovered {
                        after: self.persist_streak,
                    });
                    self.persist_streak = 0;
                }
                Persisted::Stored
            }
            Err(e) => {
                self.persist_streak += 1;
                self.summary.store_failures += 1;
                sink.emit(&AppEvent::PersistFailed {
                    error: e.to_string(),
                    consecutive: self.persist_streak,
                });
                Persisted::Failed
            }
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Tick until `shutdown` fires, then switch the actuator off.
    ///
    /// Shutdown is only observed between ticks. The loop is handed back so
    /// the caller decides when the hardware and store handles drop.
    pub fn run(mut self, shutdown: &Shutdown, sink: &mut impl EventSink) -> (Self, RunSummary) {
        let relay_on = self.actuator.is_on();
        sink.emit(&AppEvent::Started { relay_on });
        info!(
            "monitor loop running every {:?} ({})",
            self.settings.tick_interval,
            self.controller.thresholds()
        );

        loop {
            self.tick(sink);
            if shutdown.wait(self.settings.tick_interval) {
                break;
            }
        }

        if self.actuator.is_on() {
            if let Err(e) = self.actuator.turn_off() {
                warn!("could not switch relay off on shutdown: {}", e);
            } else {
                sink.emit(&AppEvent::RelaySwitched { on: false });
            }
        }
        let summary = self.summary();
        sink.emit(&AppEvent::Stopped {
            ticks: summary.ticks,
        });
        (self, summary)
    }

    /// Give back the owned parts, in the order they should be dropped.
    pub fn into_parts(self) -> (S, A, RetryingReader) {
        (self.store, self.actuator, self.reader)
    }
}
