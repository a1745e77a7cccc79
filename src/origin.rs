//! Origin fetch capability
//!
//! The coordinator talks to upstream backends through the [`OriginClient`]
//! trait; [`HttpOriginClient`] is the production implementation. Fetches are
//! always full and unranged (range requests are satisfied locally from the
//! cached full body) and always ask for an identity encoding so stored
//! bodies keep their byte offsets.

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::models::OriginResponse;
use crate::platform::Platform;
use crate::transform::NormalizedPath;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Upstream fetch capability.
///
/// Implementations return `Ok` for any response the origin produced,
/// whatever its status; `Err` is reserved for transport failures and
/// timeouts.
#[async_trait]
pub trait OriginClient: Send + Sync {
    async fn fetch(&self, platform: Platform, path: &NormalizedPath) -> Result<OriginResponse>;
}

/// HTTP origin client over a pooled reqwest client
pub struct HttpOriginClient {
    http_client: reqwest::Client,
    config: ProxyConfig,
}

impl HttpOriginClient {
    /// Create a client from a validated configuration
    pub fn new(config: ProxyConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.origin_timeout())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| ProxyError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(HttpOriginClient {
            http_client,
            config,
        })
    }

    fn url_for(&self, platform: Platform, path: &NormalizedPath) -> Result<String> {
        let base = self.config.upstream_for(platform)?;
        Ok(format!("{}{}", base, path))
    }
}

#[async_trait]
impl OriginClient for HttpOriginClient {
    async fn fetch(&self, platform: Platform, path: &NormalizedPath) -> Result<OriginResponse> {
        let url = self.url_for(platform, path)?;
        debug!("fetching from origin: platform={}, url={}", platform, url);

        let response = self
            .http_client
            .get(&url)
            // Compressed bodies would break byte-offset slicing downstream
            .header(http::header::ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProxyError::Timeout(self.config.origin_timeout_secs)
                } else {
                    ProxyError::origin(502, format!("request to {} failed: {}", url, e))
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();

        let body = response.bytes().await.map_err(|e| {
            ProxyError::origin(502, format!("failed to read origin body: {}", e))
        })?;

        debug!(
            "origin response: url={}, status={}, bytes={}",
            url,
            status,
            body.len()
        );

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}
