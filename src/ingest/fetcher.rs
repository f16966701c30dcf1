// src/ingest/fetcher.rs
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Response};
use std::time::Duration;
use url::Url;

use crate::error::FetchError;
use crate::ingest::types::{ContentKind, FetchedSource, SourceFetcher};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; RSSGenerator/1.0)";

/// Default cap on a streamed response body (5 MiB).
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Plain HTTP GET, one attempt per source.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    user_agent: String,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(10),
            max_body_bytes: MAX_BODY_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedSource, FetchError> {
        let resp = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = read_capped(url, resp, self.max_body_bytes).await?;
        let body = String::from_utf8_lossy(&bytes).into_owned();
        let kind = classify(&content_type, &body);

        tracing::debug!(target: "ingest", url = %url, ?kind, bytes = body.len(), "fetched source");

        Ok(FetchedSource {
            url: url.clone(),
            kind,
            body,
        })
    }
}

/// Read the body chunk by chunk, failing once it grows past `limit`.
async fn read_capped(url: &Url, mut resp: Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let too_large = || FetchError::TooLarge {
        url: url.to_string(),
        limit,
    };
    if resp.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = resp.chunk().await.map_err(|e| request_error(url, e))? {
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(too_large());
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn request_error(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Feed if the content type mentions xml/rss or the body opens like XML.
pub fn classify(content_type: &str, body: &str) -> ContentKind {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("xml") || ct.contains("rss") {
        return ContentKind::Feed;
    }
    let head: String = body
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(5)
        .collect::<String>()
        .to_ascii_lowercase();
    if head.starts_with("<?xml") || head.starts_with("<rss") || head.starts_with("<feed") {
        ContentKind::Feed
    } else {
        ContentKind::Page
    }
}
