//! Timeout alerts with a global send throttle.
//!
//! One "last sent" timestamp gates all notifications, across every record
//! and every timeout event: at most one alert per throttle window.
//! Delivery itself (email, chat) lives behind [`TimeoutNotifier`]; a
//! failed notification is the caller's to log and never blocks record
//! processing.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::config::NotifySettings;
use crate::error::ServiceError;

/// What a notifier is told about a timeout event.
#[derive(Debug, Clone)]
pub struct TimeoutContext {
    pub record_id: i64,
    pub message: String,
}

/// Delivery seam for timeout alerts.
pub trait TimeoutNotifier {
    async fn notify_timeout(
        &self,
        settings: &NotifySettings,
        context: &TimeoutContext,
    ) -> Result<(), ServiceError>;
}

/// Shared send gate. `should_send` records the send time as a side effect,
/// so call it only when actually about to send.
#[derive(Debug, Default)]
pub struct NotifyThrottle {
    last_sent: Mutex<Option<DateTime<Utc>>>,
}

impl NotifyThrottle {
    /// True when a notification may go out now. The window is clamped to
    /// at least one minute.
    pub fn should_send(&self, throttle_minutes: i64, now: DateTime<Utc>) -> bool {
        let window = Duration::minutes(throttle_minutes.max(1));
        let mut last = self.last_sent.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(sent) = *last
            && now.signed_duration_since(sent) < window
        {
            return false;
        }
        *last = Some(now);
        true
    }
}

/// Default notifier: records the alert in the service log. Outbound
/// delivery channels implement [`TimeoutNotifier`] in its place.
#[derive(Debug, Default)]
pub struct LogNotifier {
    throttle: NotifyThrottle,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeoutNotifier for LogNotifier {
    async fn notify_timeout(
        &self,
        settings: &NotifySettings,
        context: &TimeoutContext,
    ) -> Result<(), ServiceError> {
        if !settings.enabled {
            return Ok(());
        }
        if !self.throttle.should_send(settings.throttle_minutes, Utc::now()) {
            return Ok(());
        }
        warn!(
            record_id = context.record_id,
            client = %settings.client_name,
            subject = %settings.subject,
            detail = %context.message,
            "API timeout detected; deal note fiscalisation may be degraded"
        );
        Ok(())
    }
}
