// src/ingest/types.rs
use url::Url;

use crate::error::FetchError;

/// One normalized content item. `title` and `link` are never empty.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: Option<String>,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
}

impl Article {
    /// Build an article, returning `None` when title or link is blank.
    pub fn new(title: String, link: String) -> Option<Self> {
        if title.trim().is_empty() || link.trim().is_empty() {
            return None;
        }
        Some(Self {
            title,
            link,
            description: String::new(),
            pub_date: None,
            source_name: None,
            source_url: None,
        })
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_pub_date(mut self, pub_date: Option<String>) -> Self {
        self.pub_date = pub_date;
        self
    }
}

/// How a fetched body should be mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Feed,
    Page,
}

#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub url: Url,
    pub kind: ContentKind,
    pub body: String,
}

/// Output of one extractor run over one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub source_url: String,
    pub source_label: String,
    /// Document-level `<title>`, if any.
    pub title: Option<String>,
    /// Page `<meta name="description">` or feed channel description.
    pub description: Option<String>,
    pub articles: Vec<Article>,
}

#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedSource, FetchError>;
}
