//! Retry eligibility and backoff for timed-out submissions.
//!
//! Only API timeouts are retried. A timed-out record waits out an
//! exponential backoff window between attempts and is given up on after
//! `max_retries`; every other fetched record proceeds immediately. When no
//! retry counter column is configured, tracking is off: timed-out records
//! are retried on the very next poll, with no backoff and no cap.

use chrono::{DateTime, Duration, Utc};

use crate::config::ServiceConfig;
use crate::store::RecordRow;

/// Record lifecycle status, decoded from the configured status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    InProgress,
    Timeout,
    Failed,
}

impl RecordStatus {
    /// Unknown values map to `Pending` so externally-seeded rows selected
    /// by a custom predicate still process.
    pub fn from_column(value: &str, config: &ServiceConfig) -> Self {
        if value.eq_ignore_ascii_case(&config.timeout_status_value) {
            RecordStatus::Timeout
        } else if value.eq_ignore_ascii_case(&config.in_progress_status_value) {
            RecordStatus::InProgress
        } else if value.eq_ignore_ascii_case(&config.failed_status_value) {
            RecordStatus::Failed
        } else {
            RecordStatus::Pending
        }
    }
}

/// Retry bookkeeping derived from a record's columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryState {
    pub retry_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl RetryState {
    pub fn from_record(record: &RecordRow, config: &ServiceConfig) -> Self {
        let retry_count = if config.retry_tracking_enabled() {
            record
                .get_i64(&config.retry_count_column)
                .map(|n| n.max(0) as u32)
                .unwrap_or(0)
        } else {
            0
        };
        Self {
            retry_count,
            last_attempt_at: record.get_timestamp(&config.last_attempt_at_column),
        }
    }
}

/// What the worker should do with a record this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Submit now.
    Proceed,
    /// Backoff window still open; skip until a later cycle.
    Wait,
    /// Retries exhausted; the record becomes terminally failed.
    GiveUp,
}

/// Seconds until a timed-out record may be retried: the base doubled per
/// prior retry, clamped to `[1, max]`.
pub fn backoff_seconds(retry_count: u32, base: u64, max: u64) -> u64 {
    let exponent = retry_count.saturating_sub(1).min(32);
    base.saturating_mul(1u64 << exponent).clamp(1, max.max(1))
}

pub fn decide(
    status: RecordStatus,
    state: &RetryState,
    config: &ServiceConfig,
    now: DateTime<Utc>,
) -> RetryDecision {
    if status != RecordStatus::Timeout {
        return RetryDecision::Proceed;
    }

    if !config.retry_tracking_enabled() {
        return RetryDecision::Proceed;
    }

    if state.retry_count >= config.max_retries {
        return RetryDecision::GiveUp;
    }

    let delay = backoff_seconds(
        state.retry_count,
        config.retry_backoff_base_seconds,
        config.retry_backoff_max_seconds,
    );
    match state.last_attempt_at {
        Some(last) if now.signed_duration_since(last) < Duration::seconds(delay as i64) => {
            RetryDecision::Wait
        }
        _ => RetryDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqlValue;

    fn config() -> ServiceConfig {
        ServiceConfig {
            max_retries: 5,
            retry_backoff_base_seconds: 10,
            retry_backoff_max_seconds: 300,
            ..Default::default()
        }
    }

    #[test]
    fn backoff_doubles_from_the_second_retry() {
        let delays: Vec<u64> = (0..5).map(|n| backoff_seconds(n, 10, 300)).collect();
        assert_eq!(delays, vec![10, 10, 20, 40, 80]);
    }

    #[test]
    fn backoff_clamps_to_max() {
        assert_eq!(backoff_seconds(10, 10, 300), 300);
        assert_eq!(backoff_seconds(63, 10, 300), 300);
    }

    #[test]
    fn backoff_clamps_to_at_least_one_second() {
        assert_eq!(backoff_seconds(0, 0, 300), 1);
    }

    #[test]
    fn backoff_is_monotonic() {
        let mut previous = 0;
        for n in 0..64 {
            let delay = backoff_seconds(n, 10, 300);
            assert!(delay >= previous, "delay shrank at retry {n}");
            previous = delay;
        }
    }

    #[test]
    fn pending_always_proceeds() {
        let state = RetryState {
            retry_count: 4,
            last_attempt_at: Some(Utc::now()),
        };
        assert_eq!(
            decide(RecordStatus::Pending, &state, &config(), Utc::now()),
            RetryDecision::Proceed
        );
    }

    #[test]
    fn timeout_within_window_waits() {
        let now = Utc::now();
        let state = RetryState {
            retry_count: 2,
            last_attempt_at: Some(now - Duration::seconds(5)),
        };
        // retry_count 2 => 20s window, only 5s elapsed.
        assert_eq!(
            decide(RecordStatus::Timeout, &state, &config(), now),
            RetryDecision::Wait
        );
    }

    #[test]
    fn timeout_past_window_proceeds() {
        let now = Utc::now();
        let state = RetryState {
            retry_count: 2,
            last_attempt_at: Some(now - Duration::seconds(21)),
        };
        assert_eq!(
            decide(RecordStatus::Timeout, &state, &config(), now),
            RetryDecision::Proceed
        );
    }

    #[test]
    fn timeout_without_last_attempt_proceeds() {
        let state = RetryState {
            retry_count: 1,
            last_attempt_at: None,
        };
        assert_eq!(
            decide(RecordStatus::Timeout, &state, &config(), Utc::now()),
            RetryDecision::Proceed
        );
    }

    #[test]
    fn timeout_at_retry_cap_gives_up() {
        let state = RetryState {
            retry_count: 5,
            last_attempt_at: Some(Utc::now()),
        };
        assert_eq!(
            decide(RecordStatus::Timeout, &state, &config(), Utc::now()),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn tracking_disabled_retries_immediately_and_never_gives_up() {
        let config = ServiceConfig {
            retry_count_column: String::new(),
            ..config()
        };
        let state = RetryState {
            retry_count: 0,
            last_attempt_at: Some(Utc::now()),
        };
        assert_eq!(
            decide(RecordStatus::Timeout, &state, &config, Utc::now()),
            RetryDecision::Proceed
        );
    }

    #[test]
    fn status_parses_case_insensitively() {
        let config = config();
        assert_eq!(
            RecordStatus::from_column("timeout", &config),
            RecordStatus::Timeout
        );
        assert_eq!(
            RecordStatus::from_column("In_Progress", &config),
            RecordStatus::InProgress
        );
        assert_eq!(
            RecordStatus::from_column("FAILED", &config),
            RecordStatus::Failed
        );
        assert_eq!(
            RecordStatus::from_column("anything else", &config),
            RecordStatus::Pending
        );
    }

    #[test]
    fn retry_state_reads_configured_columns() {
        let config = config();
        let ts = Utc::now();
        let record = RecordRow::new()
            .with("RetryCount", SqlValue::Int(3))
            .with("LastAttemptAt", SqlValue::Timestamp(ts));
        let state = RetryState::from_record(&record, &config);
        assert_eq!(state.retry_count, 3);
        assert_eq!(state.last_attempt_at, Some(ts));
    }

    #[test]
    fn retry_state_is_zero_when_tracking_disabled() {
        let config = ServiceConfig {
            retry_count_column: String::new(),
            ..config()
        };
        let record = RecordRow::new().with("RetryCount", SqlValue::Int(3));
        assert_eq!(RetryState::from_record(&record, &config).retry_count, 0);
    }
}
