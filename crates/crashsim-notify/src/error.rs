use std::time::Duration;

/// Why a notification was not delivered
///
/// Never fatal to a run. The dispatcher turns every variant into
/// `sent: false` with the display text as the reason.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("messaging not configured")]
    NotConfigured,

    #[error("messaging request timed out after {0:?}")]
    Timeout(Duration),

    #[error("messaging network error: {0}")]
    Network(String),

    #[error("rate limited by messaging sink")]
    RateLimited {
        /// Seconds, from the `Retry-After` header
        retry_after: Option<u64>,
    },

    /// HTTP error status from the sink
    #[error("messaging sink returned status {status}")]
    Http { status: u16 },

    /// The sink answered but refused the message (e.g. `channel_not_found`)
    #[error("messaging sink rejected message: {0}")]
    Rejected(String),
}

impl NotifyError {
    /// Worth another attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) | Self::RateLimited { .. } => true,
            Self::Http { status } => *status >= 500,
            Self::NotConfigured | Self::Rejected(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(NotifyError::RateLimited { retry_after: Some(1) }.is_retryable());
        assert!(NotifyError::Http { status: 502 }.is_retryable());
        assert!(!NotifyError::Rejected("invalid_auth".into()).is_retryable());
        assert!(!NotifyError::NotConfigured.is_retryable());
    }
}
