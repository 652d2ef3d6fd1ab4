//! Best-effort notification dispatch

use crate::error::NotifyError;
use crate::message::CrashNotification;
use crate::sink::MessageSink;
use chrono::Utc;
use crashsim_model::{CrashRecord, NotificationResult};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DASHBOARD_URL: &str = "https://monitoring.example.com/errors";

/// Sends one crash summary per run
///
/// `notify` never fails. Missing configuration, network errors and rate
/// limits all come back as `sent: false` with a reason.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sink: Option<Arc<dyn MessageSink>>,
    dashboard_url: String,
    timeout: Duration,
    max_attempts: usize,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("sink", &self.sink.as_ref().map(|s| s.name()))
            .field("dashboard_url", &self.dashboard_url)
            .field("timeout", &self.timeout)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::disabled()
    }
}

impl NotificationDispatcher {
    /// Dispatcher without a sink; every call reports `sent: false`
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            sink: None,
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            timeout: DEFAULT_NOTIFY_TIMEOUT,
            max_attempts: 1,
        }
    }

    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::disabled()
        }
    }

    #[must_use]
    pub fn with_dashboard_url(mut self, url: impl Into<String>) -> Self {
        self.dashboard_url = url.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Retry retryable failures up to `max_attempts` total tries
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn notify(&self, record: &CrashRecord) -> NotificationResult {
        let Some(sink) = &self.sink else {
            tracing::info!(crash_id = %record.crash_id, "messaging not configured; skipping notification");
            return NotificationResult::not_sent(NotifyError::NotConfigured.to_string());
        };

        let message = CrashNotification::from_record(record, &self.dashboard_url, Utc::now());
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(self.timeout, sink.send(&message)).await {
                Ok(result) => result,
                Err(_) => Err(NotifyError::Timeout(self.timeout)),
            };

            match result {
                Ok(()) => {
                    tracing::info!(crash_id = %record.crash_id, sink = sink.name(), "notification sent");
                    return NotificationResult::sent();
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(attempt, error = %e, "notification failed; retrying");
                    if let NotifyError::RateLimited {
                        retry_after: Some(secs),
                    } = e
                    {
                        tokio::time::sleep(Duration::from_secs(secs).min(self.timeout)).await;
                    }
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        crash_id = %record.crash_id,
                        sink = sink.name(),
                        error = %e,
                        "notification not sent"
                    );
                    return NotificationResult::not_sent(e.to_string());
                }
            }
        }
    }
}
