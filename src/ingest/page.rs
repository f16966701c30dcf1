// src/ingest/page.rs
//! Heuristic article mining for plain HTML pages.
//!
//! Tier 1 reads the first anchor of every `<article>` block. Tier 2 runs only
//! when tier 1 found fewer than [`FALLBACK_THRESHOLD`] links and takes any
//! anchor whose text looks like a headline. Both tiers share one `seen` set
//! keyed by the raw `href`, owned by the call.

use std::collections::HashSet;

use url::Url;

use crate::ingest::scan;
use crate::ingest::types::{Article, ExtractionResult};
use crate::ingest::{collapse_whitespace, normalize_link, normalize_text};
use crate::source::host_label;

pub const FALLBACK_THRESHOLD: usize = 10;

/// Anchor text must be longer than this to count as a headline.
pub const MIN_HEADLINE_CHARS: usize = 20;

/// Last path segments that never point at an article.
const NON_ARTICLE_SEGMENTS: &[&str] = &[
    "map", "contact", "about", "compose", "privacy", "terms", "login",
];

pub fn extract_page(html: &str, base: &Url, limit: usize) -> ExtractionResult {
    let mut seen: HashSet<String> = HashSet::new();
    let mut articles = Vec::new();

    // Tier 1: <article> blocks
    for block in scan::elements(html, "article") {
        if articles.len() >= limit {
            break;
        }
        let Some(anchor) = scan::elements(block.inner, "a").find(|a| a.attr("href").is_some())
        else {
            continue;
        };
        let href = anchor.attr("href").map(normalize_link).unwrap_or_default();
        let title = normalize_text(anchor.inner);
        if let Some(article) = accept(&href, title, base, &mut seen) {
            articles.push(article);
        }
    }

    // Tier 2: headline-looking anchors anywhere
    if articles.len() < FALLBACK_THRESHOLD {
        for anchor in scan::elements(html, "a") {
            if articles.len() >= limit {
                break;
            }
            let Some(raw_href) = anchor.attr("href") else {
                continue;
            };
            let href = normalize_link(raw_href);
            let title = normalize_text(anchor.inner);
            if title.chars().count() <= MIN_HEADLINE_CHARS {
                continue;
            }
            let Some(article) = accept(&href, title, base, &mut seen) else {
                continue;
            };
            if is_non_article(&article.link) {
                continue;
            }
            articles.push(article);
        }
    }

    ExtractionResult {
        source_url: base.to_string(),
        source_label: host_label(base),
        title: page_title(html),
        description: meta_description(html),
        articles,
    }
}

/// Dedupe by raw href, then resolve. Unresolvable links are dropped silently.
fn accept(href: &str, title: String, base: &Url, seen: &mut HashSet<String>) -> Option<Article> {
    if href.is_empty() || href.starts_with('#') || seen.contains(href) {
        return None;
    }
    let link = resolve_link(href, base)?;
    let article = Article::new(title.clone(), link)?.with_description(title);
    seen.insert(href.to_string());
    Some(article)
}

/// Resolve `link` against `base`.
///
/// - `http(s)://...` is kept as-is
/// - `//host/path` inherits the base scheme
/// - `/path` inherits scheme and host
/// - anything else is taken relative to the host root
///
/// Other schemes (`javascript:`, `mailto:`, `tel:`, ...) resolve to `None`.
pub fn resolve_link(link: &str, base: &Url) -> Option<String> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let lower = link.to_ascii_lowercase();

    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        link.to_string()
    } else if link.starts_with("//") {
        format!("{}:{}", base.scheme(), link)
    } else if link.starts_with('/') {
        format!("{}{}", origin(base)?, link)
    } else if has_scheme(link) {
        return None;
    } else {
        format!("{}/{}", origin(base)?, link)
    };

    let parsed = Url::parse(&candidate).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(candidate)
}

fn origin(base: &Url) -> Option<String> {
    let host = base.host_str()?;
    Some(match base.port() {
        Some(port) => format!("{}://{}:{}", base.scheme(), host, port),
        None => format!("{}://{}", base.scheme(), host),
    })
}

/// `scheme:` prefix per RFC 3986 (letter, then letters/digits/`+-.`).
fn has_scheme(link: &str) -> bool {
    let Some((scheme, _)) = link.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn is_non_article(link: &str) -> bool {
    let Ok(url) = Url::parse(link) else {
        return true;
    };
    url.path_segments()
        .and_then(|segs| segs.filter(|s| !s.is_empty()).last())
        .is_some_and(|last| {
            NON_ARTICLE_SEGMENTS
                .iter()
                .any(|w| last.eq_ignore_ascii_case(w))
        })
}

fn page_title(html: &str) -> Option<String> {
    scan::first_inner(html, "title")
        .map(normalize_text)
        .filter(|t| !t.is_empty())
}

/// `<meta name="description" content="...">`, attributes in either order.
fn meta_description(html: &str) -> Option<String> {
    scan::elements(html, "meta")
        .find(|m| {
            m.attr("name")
                .is_some_and(|n| n.eq_ignore_ascii_case("description"))
        })
        .and_then(|m| m.attr("content"))
        .map(|c| collapse_whitespace(&html_escape::decode_html_entities(c)))
        .filter(|c| !c.is_empty())
}
