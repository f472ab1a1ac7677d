use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Semaphore;

use crate::config::ScraperConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request timed out")]
    TimedOut,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchError {
    /// Failures worth another attempt: the server was never reached.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::TimedOut | FetchError::ConnectionRefused)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::TimedOut
        } else if e.is_connect() {
            FetchError::ConnectionRefused
        } else if let Some(status) = e.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// A single GET returning the response body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// The production transport: one pooled client shared by every pipeline.
///
/// reqwest bounds idle connections per host but not open ones, so a
/// semaphore caps the sockets in use at `max_connections`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    connections: Arc<Semaphore>,
}

impl ReqwestTransport {
    pub fn new(config: &ScraperConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .pool_max_idle_per_host(config.max_idle_connections)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            connections: Arc::new(Semaphore::new(config.max_connections)),
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|_| FetchError::Request("connection pool closed".to_string()))?;

        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::debug!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}

/// Fetches pages with a fixed, bounded retry loop for transient failures.
#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn HttpTransport>,
    max_retries: u32,
    retry_delay: Duration,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ScraperConfig) -> Self {
        Self {
            transport,
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
        }
    }

    /// Returns `Ok(None)` once every attempt has timed out or been refused.
    /// Any other failure is returned as soon as it happens.
    pub async fn fetch(&self, url: &str) -> Result<Option<String>, FetchError> {
        for attempt in 1..=self.max_retries {
            match self.transport.get(url).await {
                Ok(html) => return Ok(Some(html)),
                Err(e) if e.is_transient() => {
                    log::warn!(
                        "Failed to connect to {} ({}), attempt {}/{}",
                        url,
                        e,
                        attempt,
                        self.max_retries
                    );
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
                Err(e) => {
                    log::error!("Failed to fetch {}: {}", url, e);
                    return Err(e);
                }
            }
        }

        log::error!(
            "Failed to connect to {} after {} attempts",
            url,
            self.max_retries
        );
        Ok(None)
    }
}

impl std::fmt::Debug for PageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFetcher")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    /// Serves canned pages and records every URL requested.
    #[derive(Default)]
    pub(crate) struct StubTransport {
        pages: HashMap<String, Result<String, FetchError>>,
        panics: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl StubTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), Ok(html.to_string()));
            self
        }

        pub(crate) fn failing(mut self, url: &str, error: FetchError) -> Self {
            self.pages.insert(url.to_string(), Err(error));
            self
        }

        /// Requests for `url` panic inside the transport.
        pub(crate) fn panicking(mut self, url: &str) -> Self {
            self.panics.insert(url.to_string());
            self
        }

        pub(crate) fn calls_to(&self, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.as_str() == url)
                .count()
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn get(&self, url: &str) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.panics.contains(url) {
                panic!("stub transport asked to panic on {url}");
            }
            self.pages
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::HttpStatus(404)))
        }
    }
}
