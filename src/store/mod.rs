//! Persistence: the retrying [`ResilientStore`] and its collaborators.
//!
//! ```text
//!   MonitorLoop ──insert──▶ BackgroundStore ──queue──▶ ResilientStore ──▶ Connector
//!                 (optional)                              │
//!                                                         └─ one connection per operation
//! ```

pub mod background;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod sql;

use chrono::FixedOffset;
use log::{debug, info, warn};

use crate::app::ports::{ConnectScope, Connection, Connector, PersistenceBackend, SharedClock};
use crate::app::reading::SensorReading;
use crate::error::{StoreError, Transient};
use crate::retry::RetryPolicy;

pub use background::BackgroundStore;
use sql::Identifier;

/// Where rows go and how timestamps are written.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub database: Identifier,
    pub table: Identifier,
    /// Session zone. `captured_at` is converted to it before binding.
    pub zone: FixedOffset,
}

/// Running totals, for the shutdown summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub inserted: u64,
    pub failed: u64,
}

/// Persistence with bounded retry and per-operation connections.
///
/// No connection is held between operations, so a server restart between
/// ticks costs nothing. Transient failures are retried under `policy`;
/// once exhausted the caller gets [`StoreError::RetriesExhausted`].
pub struct ResilientStore<C: Connector> {
    connector: C,
    schema: Schema,
    policy: RetryPolicy,
    clock: SharedClock,
    schema_ready: bool,
    stats: StoreStats,
}

impl<C: Connector> ResilientStore<C> {
    pub fn new(connector: C, schema: Schema, policy: RetryPolicy, clock: SharedClock) -> Self {
        Self {
            connector,
            schema,
            policy,
            clock,
            schema_ready: false,
            stats: StoreStats::default(),
        }
    }

    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Acquire a connection, run `op` on it, release it.
    ///
    /// A successful operation is followed by an explicit close. On any
    /// failure the connection is dropped instead, and the whole sequence
    /// is retried if the error is transient.
    fn with_connection<T>(
        &self,
        scope: ConnectScope<'_>,
        label: &str,
        mut op: impl FnMut(&mut C::Conn) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let outcome: crate::retry::Attempted<T, StoreError> = self.policy.run(&*self.clock, label, |_| {
            let mut conn = self.connector.connect(scope)?;
            let value = op(&mut conn)?;
            if let Err(e) = conn.close() {
                // The work is already committed; a failed goodbye is not worth a retry.
                debug!("{}: close failed: {}", label, e);
            }
            Ok(value)
        });

        match outcome.result {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() => Err(StoreError::RetriesExhausted {
                attempts: outcome.attempts,
                last: Box::new(e),
            }),
            Err(e) => Err(e),
        }
    }
}

impl<C: Connector> PersistenceBackend for ResilientStore<C> {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        let create_db = sql::create_database(&self.schema.database);
        self.with_connection(ConnectScope::Server, "create database", |conn| {
            conn.execute(&create_db)
        })?;

        let create_table = sql::create_table(&self.schema.table);
        self.with_connection(
            ConnectScope::Database(self.schema.database.as_str()),
            "create table",
            |conn| conn.execute(&create_table),
        )?;

        if !self.schema_ready {
            info!(
                "STORE | schema ready: {}.{}",
                self.schema.database, self.schema.table
            );
        }
        self.schema_ready = true;
        Ok(())
    }

    fn insert(&mut self, reading: &SensorReading) -> Result<(), StoreError> {
        // Startup may have run while the server was down.
        let ready = if self.schema_ready {
            Ok(())
        } else {
            self.ensure_schema()
        };

        let result = ready.and_then(|()| {
            let stmt = sql::insert_reading(&self.schema.table, reading, self.schema.zone);
            self.with_connection(
                ConnectScope::Database(self.schema.database.as_str()),
                "insert",
                |conn| conn.execute(&stmt),
            )
        });

        match result {
            Ok(rows) => {
                self.stats.inserted += 1;
                debug!("STORE | inserted {} row(s) at {}", rows, reading.captured_at);
                Ok(())
            }
            Err(e) => {
                self.stats.failed += 1;
                warn!("STORE | insert failed: {}", e);
                Err(e)
            }
        }
    }
}

/// Backend used when persistence is disabled. Accepts and discards.
#[derive(Debug, Default)]
pub struct DiscardStore;

impl PersistenceBackend for DiscardStore {
    fn ensure_schema(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn insert(&mut self, _reading: &SensorReading) -> Result<(), StoreError> {
        Ok(())
    }
}
