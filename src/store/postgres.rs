//! Postgres-backed record store.
//!
//! All SQL here is assembled from configuration: the table, the predicate
//! and every column are operator-supplied. Identifiers are quoted and
//! values ride bind parameters wherever the shape is static; the
//! eligibility predicate interpolates quoted literals because its column
//! set is itself dynamic.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};

use super::RecordStore;
use super::row::{RecordRow, SqlValue};
use crate::api::FiscalResponse;
use crate::config::ServiceConfig;
use crate::error::ServiceError;

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Build a lazy pool: connections open on first use, so the service
    /// starts (and keeps polling) even while the database is unreachable.
    pub fn connect(url: &str) -> Result<Self, ServiceError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_lazy(url)?;
        Ok(Self { pool })
    }
}

/// Double-quote an identifier so configured names survive interpolation.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// The predicate selecting records a cycle may process: status pending or
/// timed out, flagged for fiscalisation, and below the retry cap when
/// tracking is enabled. A non-blank `where_clause` in the configuration
/// replaces the built predicate wholesale.
pub fn eligibility_clause(config: &ServiceConfig) -> String {
    if !config.where_clause.trim().is_empty() {
        return config.where_clause.clone();
    }

    let status = quote_ident(&config.status_column);
    let flag = quote_ident(&config.to_fiscalise_column);
    let mut clause = format!(
        "({status} = {pending} OR {status} = {timeout}) AND {flag} = {selected}",
        pending = quote_literal(&config.pending_status_value),
        timeout = quote_literal(&config.timeout_status_value),
        selected = quote_literal(&config.to_fiscalise_value),
    );

    if config.retry_tracking_enabled() {
        let retry = quote_ident(&config.retry_count_column);
        clause.push_str(&format!(
            " AND ({retry} IS NULL OR {retry} < {max})",
            max = config.max_retries
        ));
    }

    clause
}

/// A value destined for a SET clause bind parameter.
enum Bind {
    Text(Option<String>),
    Int(i64),
    Timestamp(DateTime<Utc>),
}

/// Collect column/value pairs, silently dropping unconfigured (blank)
/// column names.
struct UpdateSet {
    sets: Vec<(String, Bind)>,
}

impl UpdateSet {
    fn new() -> Self {
        Self { sets: Vec::new() }
    }

    fn add(&mut self, column: &str, value: Bind) {
        if !column.trim().is_empty() {
            self.sets.push((column.to_string(), value));
        }
    }

    async fn execute(
        self,
        pool: &PgPool,
        config: &ServiceConfig,
        id: i64,
    ) -> Result<(), ServiceError> {
        if self.sets.is_empty() {
            return Ok(());
        }

        let assignments = self
            .sets
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ${}", quote_ident(column), i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {table} SET {assignments} WHERE {id_col} = ${id_param}",
            table = quote_ident(&config.table_name),
            id_col = quote_ident(&config.id_column),
            id_param = self.sets.len() + 1,
        );

        let mut query = sqlx::query(&sql);
        for (_, bind) in self.sets {
            query = match bind {
                Bind::Text(value) => query.bind(value),
                Bind::Int(value) => query.bind(value),
                Bind::Timestamp(value) => query.bind(value),
            };
        }
        query.bind(id).execute(pool).await?;
        Ok(())
    }
}

impl RecordStore for PgRecordStore {
    async fn fetch_pending(&self, config: &ServiceConfig) -> Result<Vec<RecordRow>, ServiceError> {
        let sql = format!(
            "SELECT * FROM {table} WHERE {filter} ORDER BY {id} ASC LIMIT $1",
            table = quote_ident(&config.table_name),
            filter = eligibility_clause(config),
            id = quote_ident(&config.id_column),
        );
        let rows = sqlx::query(&sql)
            .bind(config.batch_size)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(decode_row).collect())
    }

    async fn mark_in_progress(&self, config: &ServiceConfig, id: i64) -> Result<(), ServiceError> {
        let mut update = UpdateSet::new();
        update.add(
            &config.status_column,
            Bind::Text(Some(config.in_progress_status_value.clone())),
        );
        update.add(&config.last_attempt_at_column, Bind::Timestamp(Utc::now()));
        update.execute(&self.pool, config, id).await
    }

    async fn apply_success(
        &self,
        config: &ServiceConfig,
        id: i64,
        response: &FiscalResponse,
        raw: &str,
    ) -> Result<(), ServiceError> {
        let columns = &config.response_columns;
        let mut update = UpdateSet::new();
        update.add(
            &columns.verification_code,
            Bind::Text(response.verification_code.clone()),
        );
        update.add(&columns.qr_url, Bind::Text(response.qr_url.clone()));
        update.add(
            &columns.fiscalisation_status,
            Bind::Text(response.fiscalisation_status.clone()),
        );
        update.add(
            &columns.d_receipt_number,
            Bind::Text(response.d_receipt_number.clone()),
        );
        update.add(
            &columns.invoice_date,
            Bind::Text(response.invoice_date.clone()),
        );
        update.add(&columns.device_id, Bind::Text(response.device_id.clone()));
        update.add(&columns.error_message, Bind::Text(None));
        update.add(&columns.full_response, Bind::Text(Some(raw.to_string())));
        update.add(&config.last_success_at_column, Bind::Timestamp(Utc::now()));
        update.add(&config.retry_count_column, Bind::Int(0));
        update.execute(&self.pool, config, id).await
    }

    async fn apply_failure(
        &self,
        config: &ServiceConfig,
        id: i64,
        message: &str,
        raw: Option<&str>,
    ) -> Result<(), ServiceError> {
        // Nowhere to record the failure without an error column.
        if config.response_columns.error_message.trim().is_empty() {
            return Ok(());
        }

        let mut update = UpdateSet::new();
        update.add(
            &config.response_columns.error_message,
            Bind::Text(Some(message.to_string())),
        );
        if let Some(raw) = raw {
            update.add(
                &config.response_columns.full_response,
                Bind::Text(Some(raw.to_string())),
            );
        }
        update.add(&config.last_attempt_at_column, Bind::Timestamp(Utc::now()));
        update.execute(&self.pool, config, id).await
    }

    async fn increment_retry(&self, config: &ServiceConfig, id: i64) -> Result<(), ServiceError> {
        if !config.retry_tracking_enabled() {
            return Ok(());
        }
        let retry = quote_ident(&config.retry_count_column);
        let sql = format!(
            "UPDATE {table} SET {retry} = COALESCE({retry}, 0) + 1 WHERE {id_col} = $1",
            table = quote_ident(&config.table_name),
            id_col = quote_ident(&config.id_column),
        );
        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn set_status(
        &self,
        config: &ServiceConfig,
        id: i64,
        status: &str,
    ) -> Result<(), ServiceError> {
        let mut update = UpdateSet::new();
        update.add(&config.status_column, Bind::Text(Some(status.to_string())));
        update.execute(&self.pool, config, id).await
    }

    async fn lookup_client(
        &self,
        config: &ServiceConfig,
        account: &str,
    ) -> Result<Option<RecordRow>, ServiceError> {
        let lookup = &config.client_lookup;
        let sql = format!(
            "SELECT * FROM {table} WHERE {account} = $1 LIMIT 1",
            table = quote_ident(&lookup.table_name),
            account = quote_ident(&lookup.account_column),
        );
        let row = sqlx::query(&sql)
            .bind(account)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(decode_row))
    }
}

/// Translate a database row into the dynamic record shape, by column type.
fn decode_row(row: &PgRow) -> RecordRow {
    let mut record = RecordRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = decode_value(row, idx, column.type_info().name());
        record.push(column.name().to_string(), value);
    }
    record
}

fn decode_value(row: &PgRow, idx: usize, type_name: &str) -> SqlValue {
    match type_name {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(idx)).map_or(SqlValue::Null, SqlValue::Bool),
        "INT2" => opt(row.try_get::<Option<i16>, _>(idx))
            .map_or(SqlValue::Null, |n| SqlValue::Int(n.into())),
        "INT4" => opt(row.try_get::<Option<i32>, _>(idx))
            .map_or(SqlValue::Null, |n| SqlValue::Int(n.into())),
        "INT8" => opt(row.try_get::<Option<i64>, _>(idx)).map_or(SqlValue::Null, SqlValue::Int),
        "FLOAT4" => opt(row.try_get::<Option<f32>, _>(idx))
            .map_or(SqlValue::Null, |f| SqlValue::Float(f.into())),
        "FLOAT8" => opt(row.try_get::<Option<f64>, _>(idx)).map_or(SqlValue::Null, SqlValue::Float),
        "NUMERIC" => {
            opt(row.try_get::<Option<Decimal>, _>(idx)).map_or(SqlValue::Null, SqlValue::Decimal)
        }
        "TIMESTAMPTZ" => opt(row.try_get::<Option<DateTime<Utc>>, _>(idx))
            .map_or(SqlValue::Null, SqlValue::Timestamp),
        "TIMESTAMP" => opt(row.try_get::<Option<chrono::NaiveDateTime>, _>(idx))
            .map_or(SqlValue::Null, |ts| SqlValue::Timestamp(ts.and_utc())),
        "DATE" => opt(row.try_get::<Option<chrono::NaiveDate>, _>(idx))
            .map_or(SqlValue::Null, |d| SqlValue::Text(d.format("%Y-%m-%d").to_string())),
        _ => opt(row.try_get::<Option<String>, _>(idx)).map_or(SqlValue::Null, SqlValue::Text),
    }
}

fn opt<T>(result: Result<Option<T>, sqlx::Error>) -> Option<T> {
    result.ok().flatten()
}
