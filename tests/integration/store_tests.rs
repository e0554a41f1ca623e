//! `ResilientStore` against an in-memory fake server.

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, TimeZone, Utc};

use envmon::adapters::time::ManualClock;
use envmon::app::ports::PersistenceBackend;
use envmon::app::reading::SensorReading;
use envmon::error::StoreError;
use envmon::retry::RetryPolicy;
use envmon::store::sql::{Identifier, SqlValue};
use envmon::store::{ResilientStore, Schema};

use crate::mock_hw::FakeConnector;

fn schema() -> Schema {
    Schema {
        database: Identifier::new("store.database", "rpi_env_monitor").unwrap(),
        table: Identifier::new("store.table", "environment_data").unwrap(),
        zone: FixedOffset::east_opt(0).unwrap(),
    }
}

fn store(connector: &FakeConnector) -> (Arc<ManualClock>, ResilientStore<FakeConnector>) {
    let clock = Arc::new(ManualClock::default());
    let store = ResilientStore::new(
        connector.clone(),
        schema(),
        RetryPolicy::fixed(3, Duration::from_secs(2)),
        clock.clone(),
    );
    (clock, store)
}

fn reading(t: Option<f64>, h: Option<f64>) -> SensorReading {
    SensorReading {
        temperature: t,
        humidity: h,
        gas_ppm: None,
        captured_at: Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap(),
    }
}

#[test]
fn ensure_schema_twice_is_harmless() {
    let connector = FakeConnector::default();
    let (_clock, mut store) = store(&connector);

    store.ensure_schema().unwrap();
    store.ensure_schema().unwrap();

    let server = connector.server();
    assert_eq!(server.databases.len(), 1);
    assert_eq!(server.tables.len(), 1);
    assert!(server.tables.contains("rpi_env_monitor.environment_data"));
    assert!(server.rows.is_empty());
}

#[test]
fn insert_binds_values_and_nulls() {
    let connector = FakeConnector::default();
    let (_clock, mut store) = store(&connector);
    store.ensure_schema().unwrap();

    store.insert(&reading(Some(23.75), None)).unwrap();

    let server = connector.server();
    let insert = server.statements.last().unwrap();
    assert!(insert.sql().starts_with("INSERT INTO `environment_data`"));
    assert!(!insert.sql().contains("23.75"));
    assert!(!insert.sql().chars().any(|c| c.is_ascii_digit()));
    assert_eq!(insert.placeholder_count(), 4);
    assert_eq!(
        server.rows,
        vec![vec![
            SqlValue::DateTime(reading(None, None).captured_at.naive_utc()),
            SqlValue::Double(23.75),
            SqlValue::Null,
            SqlValue::Null,
        ]]
    );
}

#[test]
fn rows_land_in_call_order() {
    let connector = FakeConnector::default();
    let (_clock, mut store) = store(&connector);

    for t in [20.0, 21.0, 22.0] {
        store.insert(&reading(Some(t), Some(40.0))).unwrap();
    }
    let temps: Vec<_> = connector.server().rows.iter().map(|r| r[1]).collect();
    assert_eq!(
        temps,
        vec![SqlValue::Double(20.0), SqlValue::Double(21.0), SqlValue::Double(22.0)]
    );
}

#[test]
fn every_connection_is_released() {
    let connector = FakeConnector::default();
    let (_clock, mut store) = store(&connector);
    store.ensure_schema().unwrap();
    connector.fail_executes([StoreError::ConnectionLost("server has gone away".into())]);

    store.insert(&reading(Some(20.0), None)).unwrap();
    store.insert(&reading(Some(21.0), None)).unwrap();

    let server = connector.server();
    assert_eq!(server.live, 0);
    // Two schema connections, the failed attempt, its retry, one more insert.
    assert_eq!(server.connects, 5);
    assert_eq!(server.closes, 4);
    assert_eq!(server.rows.len(), 2);
}

#[test]
fn unreachable_server_gives_up_after_max_attempts() {
    let connector = FakeConnector::default();
    let (clock, mut store) = store(&connector);
    store.ensure_schema().unwrap();
    connector.fail_connects((0..3).map(|_| StoreError::Connect("refused".into())));

    let err = store.insert(&reading(Some(20.0), None)).unwrap_err();
    assert!(matches!(err, StoreError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 2]);
    assert_eq!(store.stats().failed, 1);

    // The next tick starts over.
    store.insert(&reading(Some(20.0), None)).unwrap();
    assert_eq!(store.stats().inserted, 1);
}

#[test]
fn bad_credentials_fail_fast() {
    let connector = FakeConnector::default();
    let (clock, mut store) = store(&connector);
    connector.fail_connects([StoreError::Auth("Access denied for user 'pi'".into())]);

    assert!(matches!(store.ensure_schema(), Err(StoreError::Auth(_))));
    assert_eq!(connector.server().connects, 1);
    assert!(clock.sleeps().is_empty());
}

#[test]
fn down_at_startup_recovers_on_first_insert() {
    let connector = FakeConnector::default();
    let (_clock, mut store) = store(&connector);
    connector.fail_connects((0..3).map(|_| StoreError::Timeout("5s".into())));

    assert!(store.ensure_schema().is_err());
    store.insert(&reading(Some(20.0), Some(30.0))).unwrap();
    assert_eq!(connector.server().rows.len(), 1);
}

#[test]
fn failed_lazy_schema_counts_as_failed_insert() {
    let connector = FakeConnector::default();
    let (_clock, mut store) = store(&connector);
    connector.fail_connects((0..3).map(|_| StoreError::Timeout("5s".into())));

    let err = store.insert(&reading(Some(20.0), None)).unwrap_err();
    assert!(matches!(err, StoreError::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(store.stats().failed, 1);
    assert_eq!(store.stats().inserted, 0);
}

#[test]
fn captured_at_is_bound_in_session_zone() {
    let connector = FakeConnector::default();
    let clock = Arc::new(ManualClock::default());
    let mut store = ResilientStore::new(
        connector.clone(),
        Schema {
            zone: FixedOffset::east_opt(8 * 3600).unwrap(),
            ..schema()
        },
        RetryPolicy::fixed(1, Duration::ZERO),
        clock,
    );
    store.insert(&reading(Some(20.0), None)).unwrap();

    let bound = connector.server().rows[0][0];
    let expected = Utc
        .with_ymd_and_hms(2026, 4, 2, 17, 30, 0)
        .unwrap()
        .naive_utc();
    assert_eq!(bound, SqlValue::DateTime(expected));
}
