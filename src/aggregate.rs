// src/aggregate.rs
//! Fan-out/fan-in over the requested sources.
//!
//! Each source runs fetch + extract in its own task and writes exactly one
//! slot, indexed by its position in the request. Merge order is therefore
//! request order regardless of completion order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::task::JoinSet;
use url::Url;

use crate::error::{AggregateError, FetchError, SourceError};
use crate::ingest::feed::extract_feed;
use crate::ingest::page::extract_page;
use crate::ingest::types::{ContentKind, ExtractionResult, SourceFetcher};
use crate::rss::AggregateFeed;
use crate::source::SourceRequest;

/// At most this many source labels are listed in the combined title.
const TITLE_LABELS: usize = 3;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_sources_total", "Sources processed by the aggregator.");
        describe_counter!(
            "feed_source_errors_total",
            "Sources that contributed no articles, by kind."
        );
        describe_counter!("feed_articles_total", "Articles emitted into rendered feeds.");
        describe_counter!(
            "feed_aggregate_empty_total",
            "Requests where every source came back empty."
        );
        describe_histogram!("feed_fetch_ms", "Fetch + extract time per source in milliseconds.");
    });
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub per_source: usize,
    pub total: usize,
    pub fetch_timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            per_source: 20,
            total: 100,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

pub type SourceOutcome = Result<ExtractionResult, SourceError>;

#[derive(Clone)]
pub struct Aggregator {
    fetcher: Arc<dyn SourceFetcher>,
    limits: Limits,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, limits: Limits) -> Self {
        ensure_metrics_described();
        Self { fetcher, limits }
    }

    /// Run every source concurrently; one outcome per source, in request order.
    pub async fn collect(&self, request: &SourceRequest) -> Vec<SourceOutcome> {
        let mut tasks = JoinSet::new();
        for (idx, url) in request.urls().iter().cloned().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let limits = self.limits;
            tasks.spawn(async move { (idx, run_source(fetcher.as_ref(), &url, limits).await) });
        }

        let mut slots: Vec<Option<SourceOutcome>> = (0..request.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => tracing::error!(target: "aggregate", error = %e, "source task failed"),
            }
        }

        slots
            .into_iter()
            .zip(request.urls())
            .map(|(slot, url)| {
                slot.unwrap_or_else(|| {
                    Err(SourceError::Aborted {
                        url: url.to_string(),
                    })
                })
            })
            .collect()
    }

    /// Merge all sources into one feed, or fail when nothing came back.
    pub async fn aggregate(&self, request: &SourceRequest) -> Result<AggregateFeed, AggregateError> {
        let outcomes = self.collect(request).await;
        merge(request, outcomes, self.limits.total)
    }

    /// Single-source pipeline. An empty extraction is not an error here, and
    /// the page or channel metadata survives it.
    pub async fn single(&self, url: &Url) -> Result<ExtractionResult, FetchError> {
        fetch_and_extract(self.fetcher.as_ref(), url, self.limits).await
    }
}

/// Fetch and route by content kind, bounded by the per-source timeout.
async fn fetch_and_extract(
    fetcher: &dyn SourceFetcher,
    url: &Url,
    limits: Limits,
) -> Result<ExtractionResult, FetchError> {
    let fetched = match tokio::time::timeout(limits.fetch_timeout, fetcher.fetch(url)).await {
        Err(_) => {
            return Err(FetchError::Timeout {
                url: url.to_string(),
            })
        }
        Ok(res) => res?,
    };
    Ok(match fetched.kind {
        ContentKind::Feed => extract_feed(&fetched.body, url, limits.per_source),
        ContentKind::Page => extract_page(&fetched.body, url, limits.per_source),
    })
}

/// One aggregation slot: an empty extraction counts as a failure.
async fn run_source(fetcher: &dyn SourceFetcher, url: &Url, limits: Limits) -> SourceOutcome {
    let t0 = Instant::now();
    counter!("feed_sources_total").increment(1);

    let outcome = match fetch_and_extract(fetcher, url, limits).await {
        Err(e) => Err(SourceError::Fetch(e)),
        Ok(res) if res.articles.is_empty() => Err(SourceError::Empty {
            url: url.to_string(),
        }),
        Ok(res) => Ok(tag(res)),
    };

    histogram!("feed_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    match &outcome {
        Ok(res) => tracing::debug!(
            target: "aggregate",
            url = %url,
            articles = res.articles.len(),
            "source ok"
        ),
        Err(e) => {
            counter!("feed_source_errors_total", "kind" => e.kind()).increment(1);
            tracing::warn!(target: "aggregate", url = %url, error = %e, "source contributed nothing");
        }
    }
    outcome
}

/// Attach the source label and URL to every article.
fn tag(mut res: ExtractionResult) -> ExtractionResult {
    for article in &mut res.articles {
        article.source_name = Some(res.source_label.clone());
        article.source_url = Some(res.source_url.clone());
    }
    res
}

/// Concatenate successful sources in request order and cap the total.
pub fn merge(
    request: &SourceRequest,
    outcomes: Vec<SourceOutcome>,
    total: usize,
) -> Result<AggregateFeed, AggregateError> {
    let mut labels = Vec::new();
    let mut articles = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            Ok(res) => {
                labels.push(res.source_label);
                articles.extend(res.articles);
            }
            Err(e) => failures.push(e),
        }
    }
    articles.truncate(total);

    if articles.is_empty() {
        counter!("feed_aggregate_empty_total").increment(1);
        return Err(AggregateError::Empty {
            sources: request.len(),
            failures,
        });
    }

    tracing::info!(
        target: "aggregate",
        sources = request.len(),
        failed = failures.len(),
        articles = articles.len(),
        "aggregate built"
    );
    counter!("feed_articles_total").increment(articles.len() as u64);

    let n = request.len();
    Ok(AggregateFeed {
        channel_title: combined_title(&labels),
        channel_link: request.raw().first().cloned().unwrap_or_default(),
        channel_description: format!(
            "Combined RSS feed from {n} source{}",
            if n == 1 { "" } else { "s" }
        ),
        self_link: None,
        articles,
        generated_at: Utc::now(),
        tag_sources: true,
    })
}

fn combined_title(labels: &[String]) -> String {
    let named: Vec<&str> = labels
        .iter()
        .map(String::as_str)
        .filter(|l| !l.is_empty())
        .collect();
    if named.is_empty() {
        return "Combined RSS Feed".to_string();
    }
    let head = named[..named.len().min(TITLE_LABELS)].join(", ");
    if named.len() > TITLE_LABELS {
        format!("Combined Feed: {head}...")
    } else {
        format!("Combined Feed: {head}")
    }
}
