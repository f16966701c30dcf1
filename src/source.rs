// src/source.rs
use url::Url;

use crate::error::ValidationError;

/// Hard upper bound on sources per request.
pub const MAX_SOURCES: usize = 5;

/// Ordered, validated list of 1..=`max` source URLs.
///
/// The raw strings are kept verbatim next to the parsed form so the short
/// code round-trips exactly what the caller sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    raw: Vec<String>,
    parsed: Vec<Url>,
}

impl SourceRequest {
    pub fn new<I, S>(urls: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_limit(urls, MAX_SOURCES)
    }

    pub fn with_limit<I, S>(urls: I, max: usize) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw: Vec<String> = urls
            .into_iter()
            .map(|u| u.as_ref().trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();

        if raw.is_empty() {
            return Err(ValidationError::NoUrls);
        }
        if raw.len() > max {
            return Err(ValidationError::TooManyUrls {
                count: raw.len(),
                max,
            });
        }

        let parsed = raw
            .iter()
            .map(|u| parse_source_url(u))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { raw, parsed })
    }

    /// Split a comma-delimited list (`?urls=a,b`) into a request.
    pub fn from_delimited(list: &str, max: usize) -> Result<Self, ValidationError> {
        Self::with_limit(list.split(','), max)
    }

    pub fn urls(&self) -> &[Url] {
        &self.parsed
    }

    pub fn raw(&self) -> &[String] {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Parse one absolute http(s) URL.
pub fn parse_source_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|e| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        other => Err(ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Display label for a source: hostname without a leading `www.`.
pub fn host_label(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}
