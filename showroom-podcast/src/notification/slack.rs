//! Slack Web API notification channel.
//!
//! Posts through `chat.postMessage` with a bot token. Handles 429 rate limits
//! by respecting the `Retry-After` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::{ErrorNotifier, ErrorReport, NotificationError};

/// Root of the Slack Web API.
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api/";

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Slack truncates `text` beyond this many characters.
const SLACK_MESSAGE_LIMIT: usize = 40_000;

/// Slack channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot user OAuth token (`xoxb-...`).
    pub bot_token: String,
    /// Channel ID or name to post to.
    pub channel: String,
    /// Web API root, overridable for testing.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY`.
    #[serde(default = "default_use_system_proxy")]
    pub use_system_proxy: bool,
}

fn default_api_base() -> String {
    DEFAULT_SLACK_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_use_system_proxy() -> bool {
    true
}

impl SlackConfig {
    pub fn new(bot_token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            channel: channel.into(),
            api_base: default_api_base(),
            timeout_secs: default_timeout(),
            use_system_proxy: default_use_system_proxy(),
        }
    }

    /// Both credentials are present.
    pub fn is_enabled(&self) -> bool {
        !self.bot_token.is_empty() && !self.channel.is_empty()
    }
}

/// A message accepted by Slack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    /// Message timestamp; doubles as the thread id for replies.
    pub ts: String,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Minimal `chat.postMessage` client.
pub struct SlackClient {
    config: SlackConfig,
    client: Client,
    endpoint: String,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Result<Self, NotificationError> {
        showroom_api::client::install_rustls_provider();

        let base = if config.api_base.ends_with('/') {
            config.api_base.clone()
        } else {
            format!("{}/", config.api_base)
        };
        let endpoint = format!("{base}chat.postMessage");
        reqwest::Url::parse(&endpoint)
            .map_err(|e| NotificationError::InvalidUrl(format!("{endpoint}: {e}")))?;

        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    /// Post `text` to the configured channel.
    pub async fn post_message(&self, text: &str) -> Result<PostedMessage, NotificationError> {
        let payload = json!({
            "channel": self.config.channel,
            "text": truncate_message(text, SLACK_MESSAGE_LIMIT),
        });
        self.send_with_retry(&payload).await
    }

    /// Post `text` as a reply in the thread started by `thread_ts`.
    pub async fn post_reply(
        &self,
        text: &str,
        thread_ts: &str,
    ) -> Result<PostedMessage, NotificationError> {
        let payload = json!({
            "channel": self.config.channel,
            "text": truncate_message(text, SLACK_MESSAGE_LIMIT),
            "thread_ts": thread_ts,
        });
        self.send_with_retry(&payload).await
    }

    /// Send request with rate limit handling.
    async fn send_with_retry(&self, payload: &Value) -> Result<PostedMessage, NotificationError> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.config.bot_token)
                .json(payload)
                .send()
                .await?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Slack rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(NotificationError::RateLimited(attempts));
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Slack rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!("Slack chat.postMessage failed: {} - {}", status, body);
                return Err(NotificationError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let body: PostMessageResponse = response.json().await?;
            if !body.ok {
                let code = body.error.unwrap_or_else(|| "unknown_error".to_string());
                error!(error = %code, "Slack API returned an error");
                return Err(NotificationError::Api(code));
            }

            return Ok(PostedMessage {
                channel: body.channel.unwrap_or_else(|| self.config.channel.clone()),
                ts: body.ts.unwrap_or_default(),
            });
        }
    }
}

/// Posts fatal error reports to Slack.
pub struct SlackNotification {
    client: SlackClient,
}

impl SlackNotification {
    pub fn new(client: SlackClient) -> Self {
        Self { client }
    }

    /// Build from configuration; `None` when credentials are missing.
    pub fn from_config(config: &SlackConfig) -> Result<Option<Self>, NotificationError> {
        if !config.is_enabled() {
            return Ok(None);
        }
        Ok(Some(Self::new(SlackClient::new(config.clone())?)))
    }

    /// Post the summary, then the details as a threaded reply.
    pub async fn post_error(&self, report: &ErrorReport) -> Result<(), NotificationError> {
        let posted = self.client.post_message(&report.summary()).await?;
        self.client
            .post_reply(&format!("```{}```", report.details()), &posted.ts)
            .await?;
        debug!(ts = %posted.ts, "Error report posted to Slack");
        Ok(())
    }
}

#[async_trait]
impl ErrorNotifier for SlackNotification {
    async fn notify_error(&self, report: &ErrorReport) -> Result<(), NotificationError> {
        self.post_error(report).await
    }
}

/// Truncate a message to fit within the Slack character limit.
fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "\n[truncated]";
    let budget = limit - suffix.len();
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{suffix}")
}
