//! Parameterized SQL for the readings table.
//!
//! Values always travel as bound parameters. The only text spliced into a
//! statement is an [`Identifier`], which is validated on construction
//! because MySQL cannot bind database or table names.

use std::fmt;

use chrono::NaiveDateTime;

use crate::app::reading::SensorReading;
use crate::error::ConfigError;

/// A validated SQL identifier: `[A-Za-z_][A-Za-z0-9_]{0,63}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(field: &'static str, name: &str) -> Result<Self, ConfigError> {
        let mut chars = name.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !head_ok || !tail_ok || name.len() > 64 {
            return Err(ConfigError::invalid(
                field,
                format!("{name:?} is not a plain SQL identifier"),
            ));
        }
        Ok(Self(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.0)
    }
}

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SqlValue {
    Null,
    Double(f64),
    DateTime(NaiveDateTime),
}

impl From<Option<f64>> for SqlValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(Self::Null, Self::Double)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

/// SQL text plus the values for its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }
}

pub fn create_database(database: &Identifier) -> Statement {
    Statement::new(format!("CREATE DATABASE IF NOT EXISTS {database}"))
}

pub fn create_table(table: &Identifier) -> Statement {
    Statement::new(format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
         `id` BIGINT AUTO_INCREMENT PRIMARY KEY, \
         `timestamp` DATETIME(3) NOT NULL DEFAULT CURRENT_TIMESTAMP(3), \
         `temperature` DOUBLE NULL, \
         `humidity` DOUBLE NULL, \
         `gas_ppm` DOUBLE NULL)"
    ))
}

/// One row per reading. `captured_at` is bound as local time in the
/// session zone so it lines up with `CURRENT_TIMESTAMP`.
pub fn insert_reading(
    table: &Identifier,
    reading: &SensorReading,
    zone: chrono::FixedOffset,
) -> Statement {
    Statement::new(format!(
        "INSERT INTO {table} (`timestamp`, `temperature`, `humidity`, `gas_ppm`) \
         VALUES (?, ?, ?, ?)"
    ))
    .bind(reading.captured_at.with_timezone(&zone).naive_local())
    .bind(reading.temperature)
    .bind(reading.humidity)
    .bind(reading.gas_ppm)
}
