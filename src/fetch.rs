use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Retrieves raw response documents. Retry policy belongs to implementors.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_document(&self, url: &str) -> Result<String>;
}

/// reqwest-backed fetcher used by the binary.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch_document(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).with_context(|| format!("invalid url: {url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("unsupported url scheme `{}`: {url}", parsed.scheme());
        }
        let resp = self.client.get(parsed).send().await.with_context(|| format!("requesting {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("{url} answered {status}");
        }
        let body = resp.text().await.with_context(|| format!("reading body of {url}"))?;
        debug!(url, bytes = body.len(), "fetched document");
        Ok(body)
    }
}
