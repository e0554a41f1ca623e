//! MySQL connector built on `sqlx`.
//!
//! The monitor loop is synchronous, so each connector owns a small
//! current-thread tokio runtime and blocks on it. Connections are short
//! lived: one per [`ResilientStore`](super::ResilientStore) operation.
//! Every round trip carries a deadline, so a half-open socket costs the
//! caller at most one timeout per attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError};
use sqlx::{ConnectOptions, Connection as _};
use tokio::runtime::Runtime;

use crate::app::ports::{ConnectScope, Connection, Connector};
use crate::error::StoreError;
use crate::store::sql::{SqlValue, Statement};

/// Server error numbers that are worth another attempt.
const ER_CON_COUNT_ERROR: u16 = 1040;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;
const CR_SERVER_GONE_ERROR: u16 = 2006;
const CR_SERVER_LOST: u16 = 2013;

/// Credential / privilege rejections.
const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
const ER_ACCESS_DENIED_ERROR: u16 = 1045;
const ER_ACCESS_DENIED_NO_PASSWORD_ERROR: u16 = 1698;

#[derive(Clone)]
pub struct MySqlSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub statement_timeout: Duration,
    /// Applied with `SET time_zone` on every new session, e.g. `+00:00`.
    pub time_zone: String,
}

pub struct MySqlConnector {
    options: MySqlConnectOptions,
    connect_timeout: Duration,
    statement_timeout: Duration,
    time_zone: String,
    runtime: Arc<Runtime>,
}

impl MySqlConnector {
    pub fn new(settings: MySqlSettings) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StoreError::Connect(format!("cannot start I/O runtime: {e}")))?;

        let options = MySqlConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .disable_statement_logging();

        log::info!(
            "STORE | MySQL target {}@{}:{}",
            settings.user,
            settings.host,
            settings.port
        );
        Ok(Self {
            options,
            connect_timeout: settings.connect_timeout,
            statement_timeout: settings.statement_timeout,
            time_zone: settings.time_zone,
            runtime: Arc::new(runtime),
        })
    }
}

impl Connector for MySqlConnector {
    type Conn = MySqlConn;

    fn connect(&self, scope: ConnectScope<'_>) -> Result<MySqlConn, StoreError> {
        let options = match scope {
            ConnectScope::Server => self.options.clone(),
            ConnectScope::Database(db) => self.options.clone().database(db),
        };

        let mut conn = bounded(&self.runtime, self.connect_timeout, "connect", async {
            options.connect().await.map_err(classify)
        })?;

        let time_zone = self.time_zone.as_str();
        bounded(&self.runtime, self.statement_timeout, "SET time_zone", async {
            sqlx::query("SET time_zone = ?")
                .bind(time_zone)
                .execute(&mut conn)
                .await
                .map_err(classify)
        })?;

        Ok(MySqlConn {
            conn,
            statement_timeout: self.statement_timeout,
            runtime: Arc::clone(&self.runtime),
        })
    }
}

pub struct MySqlConn {
    conn: MySqlConnection,
    statement_timeout: Duration,
    runtime: Arc<Runtime>,
}

impl Connection for MySqlConn {
    fn execute(&mut self, stmt: &Statement) -> Result<u64, StoreError> {
        let mut query = sqlx::query(stmt.sql());
        for param in stmt.params() {
            query = match *param {
                SqlValue::Null => query.bind(None::<f64>),
                SqlValue::Double(v) => query.bind(v),
                SqlValue::DateTime(ts) => query.bind(ts),
            };
        }

        let conn = &mut self.conn;
        bounded(&self.runtime, self.statement_timeout, "statement", async {
            query
                .execute(conn)
                .await
                .map(|done| done.rows_affected())
                .map_err(classify)
        })
    }

    fn close(self) -> Result<(), StoreError> {
        let Self {
            conn,
            statement_timeout,
            runtime,
        } = self;
        bounded(&runtime, statement_timeout, "close", async {
            conn.close().await.map_err(classify)
        })
    }
}

/// Drive `fut` to completion on `runtime`, giving up after `limit`.
/// The abandoned future is dropped, which drops its socket with it.
fn bounded<T>(
    runtime: &Runtime,
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    runtime.block_on(async {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| StoreError::Timeout(format!("{what} exceeded {limit:?}")))?
    })
}

/// Map a driver error onto the retry taxonomy.
fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(MySqlDatabaseError::number);
            match number {
                Some(
                    ER_ACCESS_DENIED_ERROR
                    | ER_DBACCESS_DENIED_ERROR
                    | ER_ACCESS_DENIED_NO_PASSWORD_ERROR,
                ) => StoreError::Auth(err.to_string()),
                Some(
                    ER_CON_COUNT_ERROR
                    | ER_LOCK_WAIT_TIMEOUT
                    | ER_LOCK_DEADLOCK
                    | CR_SERVER_GONE_ERROR
                    | CR_SERVER_LOST,
                ) => StoreError::ConnectionLost(err.to_string()),
                _ => StoreError::Query(err.to_string()),
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) => StoreError::Connect(err.to_string()),
        sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed => {
            StoreError::ConnectionLost(err.to_string())
        }
        sqlx::Error::PoolTimedOut => StoreError::Timeout(err.to_string()),
        _ => StoreError::Query(err.to_string()),
    }
}
