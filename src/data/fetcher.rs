use rand::Rng;
use reqwest::{header, Client};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use crate::config::{FetchConfig, SourcesConfig};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} failed after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

/// Anything that can hand back the raw text of a listing page.
pub trait TextSource: Send + Sync {
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// HTTP fetcher with bounded retries and jittered backoff.
pub struct TextFetcher {
    client: Client,
    config: FetchConfig,
}

impl TextFetcher {
    pub fn new(sources: &SourcesConfig, config: FetchConfig) -> reqwest::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
        headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .user_agent(sources.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Network { url: url.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        response
            .text()
            .await
            .map_err(|source| FetchError::Network { url: url.to_string(), source })
    }

    fn jitter(&self) -> Duration {
        let lo = self.config.backoff_min_ms;
        let hi = self.config.backoff_max_ms.max(lo);
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

impl TextSource for TextFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let attempts = self.config.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            match self.attempt(url).await {
                Ok(body) => {
                    info!("Fetched {} ({} bytes, attempt {})", url, body.len(), attempt);
                    return Ok(body);
                }
                Err(e) => {
                    warn!("Fetch attempt {}/{} failed: {}", attempt, attempts, e);
                    last = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.jitter()).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last: Box::new(last.unwrap_or(FetchError::Status { url: url.to_string(), status: 0 })),
        })
    }
}
