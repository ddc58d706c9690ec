//! Dynamically-typed rows returned by the store.
//!
//! The polled table's shape is configuration, not schema, so a fetched
//! record is an ordered list of column name/value pairs. The typed
//! accessors are defensive: a missing column, a NULL or an unconvertible
//! value yields a defined default instead of an error, because the source
//! tables are populated by third-party systems the service does not control.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// One fetched record: columns in select order, matched case-insensitively
/// by name.
#[derive(Debug, Clone, Default)]
pub struct RecordRow {
    columns: Vec<(String, SqlValue)>,
}

impl RecordRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    /// Builder form of [`push`](Self::push), convenient in tests.
    #[cfg(test)]
    pub fn with(mut self, name: impl Into<String>, value: SqlValue) -> Self {
        self.push(name, value);
        self
    }

    fn find(&self, name: &str) -> Option<&SqlValue> {
        if name.trim().is_empty() {
            return None;
        }
        self.columns
            .iter()
            .find(|(column, _)| column.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// String rendition of a column; empty string when missing or NULL.
    pub fn get_string(&self, name: &str) -> String {
        match self.find(name) {
            Some(SqlValue::Text(text)) => text.clone(),
            Some(SqlValue::Int(n)) => n.to_string(),
            Some(SqlValue::Float(f)) => f.to_string(),
            Some(SqlValue::Decimal(d)) => d.to_string(),
            Some(SqlValue::Bool(b)) => b.to_string(),
            Some(SqlValue::Timestamp(ts)) => ts.to_rfc3339(),
            Some(SqlValue::Null) | None => String::new(),
        }
    }

    /// Monetary value of a column; zero when missing, NULL or unparsable.
    /// Textual values parse with a decimal point regardless of host locale.
    pub fn get_decimal(&self, name: &str) -> Decimal {
        match self.find(name) {
            Some(SqlValue::Decimal(d)) => *d,
            Some(SqlValue::Int(n)) => Decimal::from(*n),
            Some(SqlValue::Float(f)) => Decimal::from_f64_retain(*f).unwrap_or_default(),
            Some(SqlValue::Text(text)) => text.trim().parse().unwrap_or_default(),
            _ => Decimal::ZERO,
        }
    }

    /// Integer value of a column, if it can be read as one.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.find(name) {
            Some(SqlValue::Int(n)) => Some(*n),
            Some(SqlValue::Decimal(d)) => d.to_i64(),
            Some(SqlValue::Text(text)) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Timestamp value of a column; text columns are accepted in RFC 3339.
    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.find(name) {
            Some(SqlValue::Timestamp(ts)) => Some(*ts),
            Some(SqlValue::Text(text)) => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|ts| ts.with_timezone(&Utc)),
            _ => None,
        }
    }
}
