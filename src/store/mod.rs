//! Store boundary: the worker drives records through a small CRUD surface
//! and never sees SQL. Table and column names are configuration, so every
//! operation receives the current config snapshot.

pub mod postgres;
pub mod row;

pub use postgres::PgRecordStore;
pub use row::{RecordRow, SqlValue};

use crate::api::FiscalResponse;
use crate::config::ServiceConfig;
use crate::error::ServiceError;

/// CRUD operations the orchestration loop needs. Mock implementations
/// drive the worker tests; [`PgRecordStore`] is the production one.
pub trait RecordStore {
    /// Up to `batch_size` records matching the eligibility predicate,
    /// ordered by the id column ascending.
    async fn fetch_pending(&self, config: &ServiceConfig) -> Result<Vec<RecordRow>, ServiceError>;

    /// Set the in-progress status and stamp the last-attempt time.
    async fn mark_in_progress(&self, config: &ServiceConfig, id: i64) -> Result<(), ServiceError>;

    /// Write the response fields, clear the error column, reset the retry
    /// count and stamp the last-success time.
    async fn apply_success(
        &self,
        config: &ServiceConfig,
        id: i64,
        response: &FiscalResponse,
        raw: &str,
    ) -> Result<(), ServiceError>;

    /// Write the error message (and raw body when present) and stamp the
    /// last-attempt time.
    async fn apply_failure(
        &self,
        config: &ServiceConfig,
        id: i64,
        message: &str,
        raw: Option<&str>,
    ) -> Result<(), ServiceError>;

    /// Bump the retry counter, treating NULL as zero.
    async fn increment_retry(&self, config: &ServiceConfig, id: i64) -> Result<(), ServiceError>;

    async fn set_status(
        &self,
        config: &ServiceConfig,
        id: i64,
        status: &str,
    ) -> Result<(), ServiceError>;

    /// Find the client row matching the record's account key, if any.
    async fn lookup_client(
        &self,
        config: &ServiceConfig,
        account: &str,
    ) -> Result<Option<RecordRow>, ServiceError>;
}
