use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{ContractDataProvider, RateGate, RetryPolicy};
use crate::error::{DownloadError, Result};
use crate::models::Config;

/// Quiver Quantitative API client
pub struct QuiverClient {
    client: Client,
    base_url: Url,
    auth_token: String,
    rate_gate: RateGate,
    retry: RetryPolicy,
}

impl QuiverClient {
    /// Create a new Quiver client
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("govcontracts-downloader/1.0")
            .build()?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.vendor_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            auth_token: config.vendor_auth_token.clone(),
            rate_gate: RateGate::new(config.rate_limit_requests, config.rate_limit_window())?,
            retry: RetryPolicy::new(config.max_retries, config.retry_delay()),
        })
    }

    async fn send_get(&self, url: Url) -> Result<Response> {
        debug!("Making request to: {}", url);

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Token {}", self.auth_token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        Ok(response)
    }

    /// Single attempt at fetching `url`, without retries
    pub async fn fetch_once(&self, url: &Url) -> Result<String> {
        // Makes sure we don't overrun the vendor rate limits
        self.rate_gate.acquire().await;

        let mut response = self.send_get(url.clone()).await?;

        if response.status() == StatusCode::NOT_FOUND {
            warn!("🔍 Files not found at url: {}", url);
            return Ok(String::new());
        }

        if response.status() == StatusCode::UNAUTHORIZED {
            // The final location after redirects; headers are sent again on the reissue
            let final_url = response.url().clone();
            debug!("Reissuing unauthorized request against {}", final_url);
            response = self.send_get(final_url).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::UnexpectedStatus {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("API response received: {} bytes", body.len());
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ContractDataProvider for QuiverClient {
    async fn fetch(&self, path: &str) -> Result<String> {
        let url = self.base_url.join(path)?;
        let url_ref = &url;
        self.retry
            .execute(url.as_str(), move |_| self.fetch_once(url_ref))
            .await
    }
}
