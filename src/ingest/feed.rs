// src/ingest/feed.rs
//! Feed extraction: `feed-rs` for well-formed documents, the positional
//! scanner for everything else.
//!
//! Malformed or truncated markup yields fewer articles, never an error.

use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use url::Url;

use crate::ingest::scan::{self, Element};
use crate::ingest::types::{Article, ExtractionResult};
use crate::ingest::{normalize_link, normalize_text, truncate_chars, MAX_DESCRIPTION_CHARS};
use crate::rss::rfc1123;
use crate::source::host_label;

/// Titles derived from a description are cut to this many chars.
const DERIVED_TITLE_CHARS: usize = 100;

/// Channel metadata plus the articles found under it.
struct Parsed {
    title: Option<String>,
    description: Option<String>,
    articles: Vec<Article>,
}

pub fn extract_feed(body: &str, source: &Url, limit: usize) -> ExtractionResult {
    extract_feed_at(body, source, limit, Utc::now())
}

/// Same as [`extract_feed`] with an explicit "now" for missing dates.
pub fn extract_feed_at(
    body: &str,
    source: &Url,
    limit: usize,
    now: DateTime<Utc>,
) -> ExtractionResult {
    let parsed = match feed_rs::parser::parse(body.as_bytes()) {
        Ok(feed) => Some(from_model(&feed, body, limit, now)),
        Err(e) => {
            tracing::debug!(target: "ingest", url = %source, error = %e, "feed parser rejected body, scanning");
            None
        }
    };
    let parsed = match parsed {
        Some(p) if !p.articles.is_empty() => p,
        _ => scan_feed(body, limit, now),
    };

    ExtractionResult {
        source_url: source.to_string(),
        source_label: parsed.title.clone().unwrap_or_else(|| host_label(source)),
        title: parsed.title,
        description: parsed.description,
        articles: parsed.articles,
    }
}

// ---------- feed-rs model ----------

fn from_model(feed: &Feed, body: &str, limit: usize, now: DateTime<Utc>) -> Parsed {
    Parsed {
        title: feed
            .title
            .as_ref()
            .map(|t| normalize_text(&t.content))
            .filter(|t| !t.is_empty()),
        description: feed
            .description
            .as_ref()
            .map(|d| normalize_text(&d.content))
            .filter(|d| !d.is_empty()),
        articles: feed
            .entries
            .iter()
            .filter_map(|entry| article_from_entry(entry, body, now))
            .take(limit)
            .collect(),
    }
}

fn article_from_entry(entry: &Entry, body: &str, now: DateTime<Utc>) -> Option<Article> {
    let description = entry
        .summary
        .as_ref()
        .map(|s| s.content.as_str())
        .into_iter()
        .chain(entry.content.as_ref().and_then(|c| c.body.as_deref()))
        .map(normalize_text)
        .find(|d| !d.is_empty())
        .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    let title = entry
        .title
        .as_ref()
        .map(|t| normalize_text(&t.content))
        .filter(|t| !t.is_empty())
        .or_else(|| derived_title(&description))?;

    let link = entry_link(entry)?;

    // Dates the model leaves empty (e.g. `dc:date` in RSS 2.0) are read from
    // the raw item carrying the same link.
    let pub_date = entry
        .published
        .or(entry.updated)
        .map(rfc1123)
        .or_else(|| raw_item_date(body, &link))
        .unwrap_or_else(|| rfc1123(now));

    Article::new(title, link).map(|a| {
        a.with_description(description)
            .with_pub_date(Some(pub_date))
    })
}

/// First `alternate` (or untyped) link, then a URL-shaped entry id.
fn entry_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .filter(|l| {
            l.rel
                .as_deref()
                .map_or(true, |rel| rel.eq_ignore_ascii_case("alternate"))
        })
        .map(|l| normalize_link(&l.href))
        .find(|href| !href.is_empty())
        .or_else(|| Some(normalize_link(&entry.id)).filter(|id| is_http(id)))
}

fn raw_item_date(body: &str, link: &str) -> Option<String> {
    scan::elements(body, "item")
        .chain(scan::elements(body, "entry"))
        .find(|block| item_link(block.inner).as_deref() == Some(link))
        .and_then(|block| item_date(block.inner))
}

// ---------- positional scan ----------

fn scan_feed(body: &str, limit: usize, now: DateTime<Utc>) -> Parsed {
    let mut articles = collect(scan::elements(body, "item"), limit, now);
    if articles.is_empty() {
        articles = collect(scan::elements(body, "entry"), limit, now);
    }
    Parsed {
        title: channel_title(body),
        description: channel_description(body),
        articles,
    }
}

fn collect<'a>(
    blocks: impl Iterator<Item = Element<'a>>,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<Article> {
    let mut out = Vec::new();
    for block in blocks {
        if out.len() >= limit {
            break;
        }
        if let Some(article) = parse_item(block.inner, now) {
            out.push(article);
        }
    }
    out
}

/// First `<title>` ahead of the first item, so an item title never
/// becomes the channel name.
fn channel_title(body: &str) -> Option<String> {
    scan::first_inner(channel_head(body), "title")
        .map(normalize_text)
        .filter(|t| !t.is_empty())
}

fn channel_description(body: &str) -> Option<String> {
    let head = channel_head(body);
    scan::first_inner(head, "description")
        .or_else(|| scan::first_inner(head, "subtitle"))
        .map(normalize_text)
        .filter(|d| !d.is_empty())
}

/// Document prefix that precedes the first item/entry.
fn channel_head(body: &str) -> &str {
    let lower = body.to_ascii_lowercase();
    let cut = ["<item", "<entry"]
        .iter()
        .filter_map(|tag| lower.find(tag))
        .min()
        .unwrap_or(body.len());
    &body[..cut]
}

fn parse_item(item: &str, now: DateTime<Utc>) -> Option<Article> {
    let description = ["description", "summary", "content:encoded", "content"]
        .iter()
        .filter_map(|tag| scan::first_inner(item, tag))
        .map(normalize_text)
        .find(|d| !d.is_empty())
        .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    let title = scan::first_inner(item, "title")
        .map(normalize_text)
        .filter(|t| !t.is_empty())
        .or_else(|| derived_title(&description))?;

    let link = item_link(item)?;
    let pub_date = item_date(item).unwrap_or_else(|| rfc1123(now));

    Article::new(title, link).map(|a| {
        a.with_description(description)
            .with_pub_date(Some(pub_date))
    })
}

fn derived_title(description: &str) -> Option<String> {
    (!description.is_empty()).then(|| truncate_chars(description, DERIVED_TITLE_CHARS))
}

/// `pubDate` as written, else an RFC 3339 `published`/`updated`/`dc:date`.
fn item_date(item: &str) -> Option<String> {
    scan::first_inner(item, "pubDate")
        .map(normalize_text)
        .filter(|d| !d.is_empty())
        .or_else(|| {
            ["published", "updated", "dc:date"]
                .iter()
                .filter_map(|tag| scan::first_inner(item, tag))
                .find_map(|d| rfc3339_to_rfc1123(normalize_text(d).as_str()))
        })
}

fn is_http(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// `<link>text</link>`, then `<link href=..>`, then a URL-shaped `<guid>`/`<id>`.
fn item_link(item: &str) -> Option<String> {
    for link in scan::elements(item, "link") {
        let text = normalize_link(link.inner);
        if !text.is_empty() {
            return Some(text);
        }
        let rel = link.attr("rel").unwrap_or("alternate");
        if let Some(href) = link.attr("href") {
            let href = normalize_link(href);
            if !href.is_empty() && rel.eq_ignore_ascii_case("alternate") {
                return Some(href);
            }
        }
    }
    ["guid", "id"]
        .iter()
        .filter_map(|tag| scan::first_inner(item, tag))
        .map(normalize_link)
        .find(|g| is_http(g))
}

fn rfc3339_to_rfc1123(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| rfc1123(dt.with_timezone(&Utc)))
}
