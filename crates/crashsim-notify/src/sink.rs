//! Messaging sinks

use crate::error::NotifyError;
use crate::message::CrashNotification;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Somewhere a crash summary can be posted
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Short sink name for logs
    fn name(&self) -> &'static str;

    async fn send(&self, message: &CrashNotification) -> Result<(), NotifyError>;
}

pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Bot credentials and target channel
#[derive(Clone)]
pub struct SlackConfig {
    pub bot_token: String,
    pub channel_id: String,
    pub api_base: String,
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
            api_base: SLACK_API_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

impl fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlackConfig")
            .field("bot_token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Posts notifications with `chat.postMessage`
#[derive(Debug, Clone)]
pub struct SlackSink {
    config: SlackConfig,
    client: reqwest::Client,
    timeout: Duration,
}

impl SlackSink {
    /// # Errors
    /// [`NotifyError::Network`] if the HTTP client cannot be built.
    pub fn new(config: SlackConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Network(e.to_string()))?;
        Ok(Self {
            config,
            client,
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat.postMessage", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl MessageSink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, message: &CrashNotification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.bot_token)
            .json(&message.to_slack_payload(&self.config.channel_id))
            .send()
            .await
            .map_err(|e| NotifyError::from_reqwest(&e, self.timeout))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            return Err(NotifyError::RateLimited { retry_after });
        }
        if !status.is_success() {
            return Err(NotifyError::Http {
                status: status.as_u16(),
            });
        }

        let body: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::from_reqwest(&e, self.timeout))?;
        if body.ok {
            tracing::debug!(channel = %self.config.channel_id, ts = ?body.ts, "slack message posted");
            Ok(())
        } else {
            Err(NotifyError::Rejected(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}
