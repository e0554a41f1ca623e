//! Mock adapters for integration tests.
//!
//! Record every call so tests can assert on the full history without
//! touching sysfs or a database.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use envmon::app::events::AppEvent;
use envmon::app::ports::{
    Actuator, ConnectScope, Connection, Connector, EventSink, PersistenceBackend,
    TemperatureHumiditySource,
};
use envmon::app::reading::SensorReading;
use envmon::error::{ActuatorError, ReadError, StoreError};
use envmon::store::sql::{SqlValue, Statement};

// ── Scripted humiture ─────────────────────────────────────────

/// Plays back a script of raw read results, repeating the last one.
/// Shares a read counter with the test.
pub struct ScriptedHumiture {
    script: VecDeque<Result<(Option<f64>, Option<f64>), ReadError>>,
    last: Result<(Option<f64>, Option<f64>), ReadError>,
    pub reads: Arc<Mutex<u32>>,
}

impl ScriptedHumiture {
    pub fn new(script: Vec<Result<(Option<f64>, Option<f64>), ReadError>>) -> Self {
        Self {
            script: script.into(),
            last: Err(ReadError::Failed("script exhausted".into())),
            reads: Arc::new(Mutex::new(0)),
        }
    }

    /// One clean `(t, h)` frame per tick.
    pub fn frames(frames: &[(f64, f64)]) -> Self {
        Self::new(frames.iter().map(|&(t, h)| Ok((Some(t), Some(h)))).collect())
    }

    pub fn counter(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.reads)
    }
}

impl TemperatureHumiditySource for ScriptedHumiture {
    fn read(&mut self) -> Result<(Option<f64>, Option<f64>), ReadError> {
        *self.reads.lock().unwrap() += 1;
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last.clone()
    }
}

// ── Relay ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCall {
    On,
    Off,
}

#[derive(Default)]
pub struct MockRelay {
    pub on: bool,
    pub calls: Vec<RelayCall>,
}

impl MockRelay {
    pub fn starting_on() -> Self {
        Self {
            on: true,
            calls: Vec::new(),
        }
    }
}

impl Actuator for MockRelay {
    fn turn_on(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(RelayCall::On);
        self.on = true;
        Ok(())
    }

    fn turn_off(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(RelayCall::Off);
        self.on = false;
        Ok(())
    }

    fn is_on(&mut self) -> bool {
        self.on
    }
}

// ── Stores ────────────────────────────────────────────────────

/// Always fails, as if the database were permanently unreachable.
#[derive(Default)]
pub struct DeadStore {
    pub attempts: u32,
}

impl PersistenceBackend for DeadStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        Err(StoreError::Connect("connection refused".into()))
    }

    fn insert(&mut self, _reading: &SensorReading) -> Result<(), StoreError> {
        self.attempts += 1;
        Err(StoreError::RetriesExhausted {
            attempts: 3,
            last: Box::new(StoreError::Connect("connection refused".into())),
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub rows: Vec<SensorReading>,
}

impl PersistenceBackend for MemoryStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn insert(&mut self, reading: &SensorReading) -> Result<(), StoreError> {
        self.rows.push(*reading);
        Ok(())
    }
}

// ── Fake MySQL server ─────────────────────────────────────────

/// In-memory stand-in for a MySQL server. Tracks which databases and
/// tables exist, every statement executed, and how connections were
/// opened and closed.
#[derive(Default)]
pub struct FakeServer {
    pub databases: BTreeSet<String>,
    pub tables: BTreeSet<String>,
    pub statements: Vec<Statement>,
    pub rows: Vec<Vec<SqlValue>>,
    pub connects: u32,
    pub closes: u32,
    pub live: i32,
    /// Errors returned by the next `connect` calls, in order.
    pub connect_failures: VecDeque<StoreError>,
    /// Errors returned by the next `execute` calls, in order.
    pub execute_failures: VecDeque<StoreError>,
}

#[derive(Clone, Default)]
pub struct FakeConnector(pub Rc<RefCell<FakeServer>>);

pub struct FakeConn {
    server: Rc<RefCell<FakeServer>>,
    database: Option<String>,
}

impl FakeConnector {
    pub fn server(&self) -> std::cell::Ref<'_, FakeServer> {
        self.0.borrow()
    }

    pub fn fail_connects(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.0.borrow_mut().connect_failures.extend(errors);
    }

    pub fn fail_executes(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.0.borrow_mut().execute_failures.extend(errors);
    }
}

impl Connector for FakeConnector {
    type Conn = FakeConn;

    fn connect(&self, scope: ConnectScope<'_>) -> Result<FakeConn, StoreError> {
        let mut server = self.0.borrow_mut();
        server.connects += 1;
        if let Some(e) = server.connect_failures.pop_front() {
            return Err(e);
        }
        let database = match scope {
            ConnectScope::Server => None,
            ConnectScope::Database(db) if server.databases.contains(db) => Some(db.to_owned()),
            ConnectScope::Database(db) => {
                return Err(StoreError::Query(format!("Unknown database '{db}'")));
            }
        };
        server.live += 1;
        Ok(FakeConn {
            server: Rc::clone(&self.0),
            database,
        })
    }
}

/// Strip backticks from a quoted identifier.
fn unquote(s: &str) -> String {
    s.trim_matches('`').to_owned()
}

impl Connection for FakeConn {
    fn execute(&mut self, stmt: &Statement) -> Result<u64, StoreError> {
        let mut server = self.server.borrow_mut();
        if let Some(e) = server.execute_failures.pop_front() {
            return Err(e);
        }
        assert_eq!(
            stmt.placeholder_count(),
            stmt.params().len(),
            "every placeholder must be bound: {}",
            stmt.sql()
        );
        server.statements.push(stmt.clone());

        let words: Vec<&str> = stmt.sql().split_whitespace().collect();
        match words.as_slice() {
            ["CREATE", "DATABASE", "IF", "NOT", "EXISTS", name, ..] => {
                server.databases.insert(unquote(name));
                Ok(1)
            }
            ["CREATE", "TABLE", "IF", "NOT", "EXISTS", name, ..] => {
                let db = self
                    .database
                    .clone()
                    .ok_or_else(|| StoreError::Query("No database selected".into()))?;
                server.tables.insert(format!("{db}.{}", unquote(name)));
                Ok(0)
            }
            ["INSERT", "INTO", name, ..] => {
                let db = self
                    .database
                    .clone()
                    .ok_or_else(|| StoreError::Query("No database selected".into()))?;
                if !server.tables.contains(&format!("{db}.{}", unquote(name))) {
                    return Err(StoreError::Query("Table doesn't exist".into()));
                }
                server.rows.push(stmt.params().to_vec());
                Ok(1)
            }
            _ => Err(StoreError::Query(format!("unsupported: {}", stmt.sql()))),
        }
    }

    fn close(self) -> Result<(), StoreError> {
        self.server.borrow_mut().closes += 1;
        Ok(())
    }
}

impl Drop for FakeConn {
    fn drop(&mut self) {
        self.server.borrow_mut().live -= 1;
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub events: Vec<AppEvent>,
}

impl Recorder {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for Recorder {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
