// src/rss.rs
//! RSS 2.0 rendering. Every interpolated value goes through [`escape_xml`].

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use quick_xml::escape::escape;

use crate::ingest::types::Article;

/// Merged, render-ready feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateFeed {
    pub channel_title: String,
    pub channel_link: String,
    pub channel_description: String,
    /// `atom:link rel="self"` target, when the public URL is known.
    pub self_link: Option<String>,
    pub articles: Vec<Article>,
    pub generated_at: DateTime<Utc>,
    /// Append `[Source]` to item titles and emit `<source>`.
    pub tag_sources: bool,
}

/// RFC-1123 timestamp as used by `pubDate`/`lastBuildDate`.
pub fn rfc1123(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Escape `& < > " '` to their named entities.
pub fn escape_xml(s: &str) -> String {
    escape(s).into_owned()
}

pub fn render(feed: &AggregateFeed) -> String {
    let now = rfc1123(feed.generated_at);
    let mut out = String::with_capacity(512 + feed.articles.len() * 512);

    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">\n");
    out.push_str("  <channel>\n");
    push_elem(&mut out, 4, "title", &feed.channel_title);
    push_elem(&mut out, 4, "link", &feed.channel_link);
    push_elem(&mut out, 4, "description", &feed.channel_description);
    push_elem(&mut out, 4, "language", "en-us");
    push_elem(&mut out, 4, "lastBuildDate", &now);
    if let Some(self_link) = &feed.self_link {
        let _ = writeln!(
            out,
            "    <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\"/>",
            escape_xml(self_link)
        );
    }

    for article in &feed.articles {
        render_item(&mut out, article, feed.tag_sources, &now);
    }

    out.push_str("  </channel>\n");
    out.push_str("</rss>\n");
    out
}

fn render_item(out: &mut String, article: &Article, tag_sources: bool, now: &str) {
    let source = article
        .source_name
        .as_deref()
        .filter(|s| tag_sources && !s.is_empty());

    let title = match source {
        Some(name) => format!("{} [{}]", article.title, name),
        None => article.title.clone(),
    };
    let description = if article.description.is_empty() {
        &article.title
    } else {
        &article.description
    };
    let pub_date = article.pub_date.as_deref().unwrap_or(now);

    out.push_str("    <item>\n");
    push_elem(out, 6, "title", &title);
    push_elem(out, 6, "link", &article.link);
    push_elem(out, 6, "description", description);
    push_elem(out, 6, "pubDate", pub_date);
    let _ = writeln!(
        out,
        "      <guid isPermaLink=\"true\">{}</guid>",
        escape_xml(&article.link)
    );
    if let Some(name) = source {
        let url = article.source_url.as_deref().unwrap_or_default();
        let _ = writeln!(
            out,
            "      <source url=\"{}\">{}</source>",
            escape_xml(url),
            escape_xml(name)
        );
    }
    out.push_str("    </item>\n");
}

fn push_elem(out: &mut String, indent: usize, name: &str, text: &str) {
    let _ = writeln!(
        out,
        "{:indent$}<{name}>{}</{name}>",
        "",
        escape_xml(text),
        indent = indent
    );
}
