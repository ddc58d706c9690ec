//! The orchestration loop.
//!
//! Each cycle fetches a batch of eligible records and walks them strictly
//! sequentially through: retry eligibility, in-progress marking, optional
//! client enrichment, transformation, submission, and outcome persistence.
//! A cycle-level store failure is logged and ends the cycle early; the
//! loop itself only stops on cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{ReceiptSubmitter, SubmitOutcome};
use crate::config::{ConfigStore, ServiceConfig};
use crate::error::ServiceError;
use crate::notify::{TimeoutContext, TimeoutNotifier};
use crate::retry::{self, RecordStatus, RetryDecision, RetryState};
use crate::stats::ServiceStats;
use crate::store::{RecordRow, RecordStore};
use crate::transform;

/// Terminal error written when a timed-out record exhausts its retries.
const MAX_RETRIES_MESSAGE: &str = "Max retries exceeded.";

/// Minimum seconds between poll cycles, whatever the configuration says.
const MIN_POLL_INTERVAL: u64 = 5;

pub struct FiscalWorker<S, C, N> {
    store: S,
    client: C,
    notifier: N,
    stats: Arc<ServiceStats>,
}

impl<S, C, N> FiscalWorker<S, C, N>
where
    S: RecordStore,
    C: ReceiptSubmitter,
    N: TimeoutNotifier,
{
    pub fn new(store: S, client: C, notifier: N, stats: Arc<ServiceStats>) -> Self {
        Self {
            store,
            client,
            notifier,
            stats,
        }
    }

    /// Poll until cancelled. Each cycle reads one configuration snapshot;
    /// updates apply from the next cycle onward.
    pub async fn run(&self, config_store: &ConfigStore, cancel: CancellationToken) {
        while !cancel.is_cancelled() {
            let config = config_store.snapshot();
            match self.run_cycle(&config, &cancel).await {
                Ok(submitted) if submitted > 0 => info!(submitted, "cycle complete"),
                Ok(_) => debug!("cycle complete, nothing submitted"),
                Err(e) => error!(error = %e, "error while processing batch"),
            }

            let interval = Duration::from_secs(config.poll_interval_seconds.max(MIN_POLL_INTERVAL));
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// One fetch-and-process pass. Returns the number of records submitted.
    pub async fn run_cycle(
        &self,
        config: &ServiceConfig,
        cancel: &CancellationToken,
    ) -> Result<usize, ServiceError> {
        let records = self.store.fetch_pending(config).await?;
        self.stats.record_batch(records.len());

        let mut submitted = 0;
        for record in &records {
            if cancel.is_cancelled() {
                break;
            }
            let Some(id) = record.get_i64(&config.id_column) else {
                warn!(column = %config.id_column, "record without a readable id, skipping");
                continue;
            };
            if self.process_record(config, id, record).await? {
                submitted += 1;
            }
        }
        Ok(submitted)
    }

    /// Drive one record through its per-cycle state machine. Returns true
    /// when a submission was attempted.
    async fn process_record(
        &self,
        config: &ServiceConfig,
        id: i64,
        record: &RecordRow,
    ) -> Result<bool, ServiceError> {
        let status = RecordStatus::from_column(&record.get_string(&config.status_column), config);
        let state = RetryState::from_record(record, config);

        match retry::decide(status, &state, config, Utc::now()) {
            RetryDecision::Wait => {
                debug!(id, retry_count = state.retry_count, "backoff window open, skipping");
                return Ok(false);
            }
            RetryDecision::GiveUp => {
                warn!(id, retry_count = state.retry_count, "retries exhausted");
                self.store
                    .set_status(config, id, &config.failed_status_value)
                    .await?;
                self.store
                    .apply_failure(config, id, MAX_RETRIES_MESSAGE, None)
                    .await?;
                self.stats.record_failure(MAX_RETRIES_MESSAGE);
                return Ok(false);
            }
            RetryDecision::Proceed => {}
        }

        self.store.mark_in_progress(config, id).await?;

        let client_row = self.resolve_client(config, record).await?;
        let receipt = transform::build_receipt(record, client_row.as_ref(), config);
        let outcome = self
            .client
            .submit(&config.api_url, &receipt, config.request_timeout_seconds)
            .await;

        match outcome {
            SubmitOutcome::Success { response, raw } => {
                self.store.apply_success(config, id, &response, &raw).await?;
                self.stats.record_success();
                info!(
                    id,
                    status = response.fiscalisation_status.as_deref().unwrap_or(""),
                    "record fiscalised"
                );
            }
            SubmitOutcome::Timeout(message) => {
                warn!(id, %message, "fiscalisation API timeout");
                let context = TimeoutContext {
                    record_id: id,
                    message: message.clone(),
                };
                if let Err(e) = self.notifier.notify_timeout(&config.notify, &context).await {
                    warn!(error = %e, "timeout notification failed");
                }
                self.store
                    .set_status(config, id, &config.timeout_status_value)
                    .await?;
                if config.retry_tracking_enabled() {
                    self.store.increment_retry(config, id).await?;
                }
                self.store.apply_failure(config, id, &message, None).await?;
                self.stats.record_timeout(&message);
            }
            SubmitOutcome::Failure { message, raw } => {
                warn!(id, %message, "fiscalisation failed");
                self.store
                    .set_status(config, id, &config.failed_status_value)
                    .await?;
                self.store
                    .apply_failure(config, id, &message, raw.as_deref())
                    .await?;
                self.stats.record_failure(&message);
            }
        }

        Ok(true)
    }

    async fn resolve_client(
        &self,
        config: &ServiceConfig,
        record: &RecordRow,
    ) -> Result<Option<RecordRow>, ServiceError> {
        let lookup = &config.client_lookup;
        if !lookup.enabled {
            return Ok(None);
        }
        let account = record.get_string(&lookup.account_column);
        if account.trim().is_empty() {
            return Ok(None);
        }
        self.store.lookup_client(config, &account).await
    }
}
