//! HTTP client for the upstream build server's queue API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::{BuildQueue, QueueError, Stage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Production [`BuildQueue`] adapter over the build server's REST API.
pub struct HttpQueue {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQueue {
    /// Build a client for `{proto}://{host}` authenticating with the given
    /// bearer token.
    pub fn new(proto: &str, host: &str, token: &str) -> Result<Self, QueueError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| QueueError::Config("auth token contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{proto}://{host}"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post(&self, path: &str) -> Result<(), QueueError> {
        let url = self.url(path);
        debug!(url = %url, "posting to build server");

        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::Server { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl BuildQueue for HttpQueue {
    async fn fetch(&self) -> Result<Vec<Stage>, QueueError> {
        let url = self.url("/api/queue");
        debug!(url = %url, "fetching build queue");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(QueueError::Server { status, body });
        }

        let stages: Vec<Stage> = response.json().await?;
        debug!(count = stages.len(), "fetched build queue");
        Ok(stages)
    }

    async fn pause(&self) -> Result<(), QueueError> {
        self.post("/api/queue/pause").await
    }

    async fn resume(&self) -> Result<(), QueueError> {
        self.post("/api/queue/resume").await
    }
}
