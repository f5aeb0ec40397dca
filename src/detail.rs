use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

/// Out-of-band retrieval of page fragments (event detail, camera listing).
pub trait DetailSource: Clone + Send + Sync + 'static {
    /// GET a site-relative `path` and return the raw body.
    fn fetch(&self, path: &str) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Clone)]
pub struct HttpDetailSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDetailSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl DetailSource for HttpDetailSource {
    async fn fetch(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?;
        response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {url}"))
    }
}
