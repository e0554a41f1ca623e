//! Integration tests for the reader → store → controller → relay pipeline.

use std::sync::Arc;
use std::time::Duration;

use envmon::adapters::time::ManualClock;
use envmon::app::events::AppEvent;
use envmon::app::ports::{PersistenceBackend, SharedClock};
use envmon::app::service::{LoopSettings, MonitorLoop, Persisted};
use envmon::control::{ActuatorCommand, ThresholdController, Thresholds};
use envmon::error::{ReadError, StoreError};
use envmon::retry::RetryPolicy;
use envmon::sensors::RetryingReader;
use envmon::shutdown;
use envmon::store::sql::Identifier;
use envmon::store::{ResilientStore, Schema};

use crate::mock_hw::{
    DeadStore, FakeConnector, MemoryStore, MockRelay, Recorder, RelayCall, ScriptedHumiture,
};

const SEQUENCE: [(f64, f64); 4] = [(28.0, 70.0), (31.0, 70.0), (31.0, 85.0), (24.0, 60.0)];

fn monitor<S: PersistenceBackend>(
    source: ScriptedHumiture,
    store: S,
    relay: MockRelay,
) -> MonitorLoop<MockRelay, S> {
    let clock: SharedClock = Arc::new(ManualClock::default());
    let reader = RetryingReader::builder(RetryPolicy::fixed(3, Duration::from_millis(10)), clock)
        .humiture(source)
        .build()
        .unwrap();
    MonitorLoop::new(
        reader,
        store,
        relay,
        ThresholdController::new(Thresholds::default()),
        LoopSettings {
            tick_interval: Duration::ZERO,
            no_data_warn_ticks: 10,
        },
    )
}

fn commands<S: PersistenceBackend>(m: &mut MonitorLoop<MockRelay, S>, sink: &mut Recorder, n: usize) -> Vec<ActuatorCommand> {
    (0..n).map(|_| m.tick(sink).command).collect()
}

// ── End-to-end threshold sequence ─────────────────────────────

#[test]
fn threshold_sequence_switches_on_then_off() {
    let mut m = monitor(
        ScriptedHumiture::frames(&SEQUENCE),
        MemoryStore::default(),
        MockRelay::default(),
    );
    let mut sink = Recorder::default();

    assert_eq!(
        commands(&mut m, &mut sink, 4),
        vec![
            ActuatorCommand::NoChange,
            ActuatorCommand::TurnOn,
            ActuatorCommand::NoChange,
            ActuatorCommand::TurnOff,
        ]
    );
    assert_eq!(m.actuator().calls, vec![RelayCall::On, RelayCall::Off]);
    assert_eq!(m.store().rows.len(), 4);
    assert_eq!(m.store().rows[2].humidity, Some(85.0));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::RelaySwitched { .. })),
        2
    );
}

#[test]
fn dead_store_does_not_change_decisions() {
    let mut m = monitor(
        ScriptedHumiture::frames(&SEQUENCE),
        DeadStore::default(),
        MockRelay::default(),
    );
    let mut sink = Recorder::default();

    let reports: Vec<_> = (0..4).map(|_| m.tick(&mut sink)).collect();
    let cmds: Vec<_> = reports.iter().map(|r| r.command).collect();
    assert_eq!(
        cmds,
        vec![
            ActuatorCommand::NoChange,
            ActuatorCommand::TurnOn,
            ActuatorCommand::NoChange,
            ActuatorCommand::TurnOff,
        ]
    );
    assert!(reports.iter().all(|r| r.persisted == Persisted::Failed));
    assert_eq!(m.store().attempts, 4);
    assert_eq!(m.summary().store_failures, 4);

    let consecutive: Vec<u32> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::PersistFailed { consecutive, .. } => Some(*consecutive),
            _ => None,
        })
        .collect();
    assert_eq!(consecutive, vec![1, 2, 3, 4]);
}

#[test]
fn timed_out_statements_do_not_hold_up_actuation() {
    let connector = FakeConnector::default();
    // Each tick spends its three attempts on statements that hit their deadline.
    connector.fail_executes((0..6).map(|_| StoreError::Timeout("statement exceeded 5s".into())));
    let store = ResilientStore::new(
        connector.clone(),
        Schema {
            database: Identifier::new("store.database", "rpi_env_monitor").unwrap(),
            table: Identifier::new("store.table", "environment_data").unwrap(),
            zone: chrono::FixedOffset::east_opt(0).unwrap(),
        },
        RetryPolicy::fixed(3, Duration::from_secs(1)),
        Arc::new(ManualClock::default()),
    );
    let mut m = monitor(
        ScriptedHumiture::frames(&SEQUENCE),
        store,
        MockRelay::default(),
    );
    let mut sink = Recorder::default();

    let reports: Vec<_> = (0..2).map(|_| m.tick(&mut sink)).collect();
    assert!(reports.iter().all(|r| r.persisted == Persisted::Failed));
    assert_eq!(reports[1].command, ActuatorCommand::TurnOn);
    assert_eq!(m.actuator().calls, vec![RelayCall::On]);
    assert_eq!(connector.server().live, 0);

    // The server answers again on the third tick.
    assert_eq!(m.tick(&mut sink).persisted, Persisted::Stored);
}

// ── Controller edge cases through the loop ────────────────────

#[test]
fn relay_on_with_all_clear_turns_off_once() {
    let mut m = monitor(
        ScriptedHumiture::frames(&[(25.0, 50.0)]),
        MemoryStore::default(),
        MockRelay::starting_on(),
    );
    let mut sink = Recorder::default();

    let cmds = commands(&mut m, &mut sink, 3);
    assert_eq!(cmds[0], ActuatorCommand::TurnOff);
    assert!(cmds[1..].iter().all(|c| *c == ActuatorCommand::NoChange));
    assert_eq!(m.actuator().calls, vec![RelayCall::Off]);
}

#[test]
fn sensor_outage_keeps_relay_where_it_is() {
    let source = ScriptedHumiture::new(vec![Err(ReadError::Failed("unplugged".into()))]);
    let mut m = monitor(source, MemoryStore::default(), MockRelay::starting_on());
    let mut sink = Recorder::default();

    let report = m.tick(&mut sink);
    assert_eq!(report.command, ActuatorCommand::NoChange);
    assert_eq!(report.persisted, Persisted::Skipped);
    assert!(m.actuator().on);
    assert!(m.store().rows.is_empty());
}

#[test]
fn external_reset_is_picked_up_from_the_relay() {
    let mut m = monitor(
        ScriptedHumiture::frames(&[(31.0, 70.0)]),
        MemoryStore::default(),
        MockRelay::default(),
    );
    let mut sink = Recorder::default();

    assert_eq!(m.tick(&mut sink).command, ActuatorCommand::TurnOn);
    // Something else switched the relay off behind the loop's back.
    m.actuator_mut().on = false;
    assert_eq!(m.tick(&mut sink).command, ActuatorCommand::TurnOn);
}

#[test]
fn partial_frame_is_persisted_with_missing_field() {
    let source = ScriptedHumiture::new(vec![Ok((Some(26.0), None))]);
    let mut m = monitor(source, MemoryStore::default(), MockRelay::default());
    let mut sink = Recorder::default();

    let report = m.tick(&mut sink);
    assert_eq!(report.persisted, Persisted::Stored);
    assert_eq!(m.store().rows[0].temperature, Some(26.0));
    assert_eq!(m.store().rows[0].humidity, None);
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn run_switches_relay_off_on_shutdown() {
    let m = monitor(
        ScriptedHumiture::frames(&[(35.0, 90.0)]),
        MemoryStore::default(),
        MockRelay::default(),
    );
    let (handle, shutdown) = shutdown::channel();
    handle.trigger();

    let mut sink = Recorder::default();
    let (m, summary) = m.run(&shutdown, &mut sink);
    assert_eq!(summary.ticks, 1);

    let (store, relay, _reader) = m.into_parts();
    assert_eq!(relay.calls, vec![RelayCall::On, RelayCall::Off]);
    assert!(!relay.on);
    assert_eq!(store.rows.len(), 1);
    assert!(matches!(sink.events.last(), Some(AppEvent::Stopped { ticks: 1 })));
}
