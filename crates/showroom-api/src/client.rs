//! Shared HTTP client for the SHOWROOM live API.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::ApiError;

/// Default root of the live API endpoints.
pub const DEFAULT_BASE_URL: &str = "https://www.showroom-live.com/api/live/";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// The API rejects requests without a browser-like User-Agent.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Configuration for [`ShowroomClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root URL the endpoint names are joined onto. Must end with `/`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Explicit proxy URL for all requests.
    pub proxy_url: Option<String>,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` when no explicit proxy is set.
    pub use_system_proxy: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            proxy_url: None,
            use_system_proxy: true,
        }
    }
}

/// Client for the polling and streaming URL endpoints.
///
/// A single pooled `reqwest::Client` is reused for every request so that
/// long-running monitors do not re-resolve the API host on each poll.
#[derive(Debug, Clone)]
pub struct ShowroomClient {
    client: Client,
    base_url: Url,
}

impl ShowroomClient {
    /// Create a client against the public API.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self, ApiError> {
        install_rustls_provider();

        let mut base_url = Url::parse(&config.base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout);

        builder = match config.proxy_url.as_deref() {
            Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy)?),
            None if config.use_system_proxy => builder,
            None => builder.no_proxy(),
        };

        let client = builder.build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// GET `endpoint?room_id=<room_id>` and decode the JSON body.
    ///
    /// Non-success statuses become [`ApiError::Status`]; callers decide which
    /// of them are transient.
    pub(crate) async fn get_json<T>(&self, endpoint: &str, room_id: u64) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.base_url.join(endpoint)?;
        trace!(%url, room_id, "GET");

        let response = self
            .client
            .get(url.clone())
            .query(&[("room_id", room_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
