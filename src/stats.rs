//! Shared processing counters, reported on shutdown.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Default)]
struct StatsInner {
    last_run: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<DateTime<Utc>>,
    last_error_message: Option<String>,
    last_batch_count: usize,
    total_processed: u64,
    total_success: u64,
    total_timeout: u64,
    total_failed: u64,
}

/// Counters for batches and per-record outcomes. Updates go through a
/// mutex so nothing is lost if the loop is ever parallelized.
#[derive(Debug, Default)]
pub struct ServiceStats {
    inner: Mutex<StatsInner>,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatsInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_batch(&self, count: usize) {
        let mut inner = self.lock();
        inner.last_run = Some(Utc::now());
        inner.last_batch_count = count;
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.total_processed += 1;
        inner.total_success += 1;
        inner.last_success = Some(Utc::now());
    }

    pub fn record_timeout(&self, message: &str) {
        let mut inner = self.lock();
        inner.total_processed += 1;
        inner.total_timeout += 1;
        inner.last_error = Some(Utc::now());
        inner.last_error_message = Some(message.to_string());
    }

    pub fn record_failure(&self, message: &str) {
        let mut inner = self.lock();
        inner.total_processed += 1;
        inner.total_failed += 1;
        inner.last_error = Some(Utc::now());
        inner.last_error_message = Some(message.to_string());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.lock();
        StatsSnapshot {
            last_run: inner.last_run,
            last_success: inner.last_success,
            last_error: inner.last_error,
            last_error_message: inner.last_error_message.clone(),
            last_batch_count: inner.last_batch_count,
            total_processed: inner.total_processed,
            total_success: inner.total_success,
            total_timeout: inner.total_timeout,
            total_failed: inner.total_failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub last_batch_count: usize,
    pub total_processed: u64,
    pub total_success: u64,
    pub total_timeout: u64,
    pub total_failed: u64,
}
