// src/ingest/mod.rs
pub mod feed;
pub mod fetcher;
pub mod page;
pub mod scan;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

/// Longest description kept per article, in chars.
pub const MAX_DESCRIPTION_CHARS: usize = 1500;

fn re_cdata() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("cdata regex"))
}

/// HTML elements removed from display text. Anything else that looks like a
/// tag (`Vec<T>`, `<username>`) is kept as text.
const HTML_TAGS: &[&str] = &[
    "a", "abbr", "address", "article", "aside", "audio", "b", "big", "blockquote", "br",
    "button", "caption", "center", "cite", "code", "dd", "del", "details", "div", "dl", "dt",
    "em", "embed", "figcaption", "figure", "font", "footer", "form", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "hr", "i", "iframe", "img", "input", "ins", "kbd", "label", "li",
    "main", "mark", "nav", "noscript", "object", "ol", "p", "picture", "pre", "q", "s",
    "script", "section", "small", "source", "span", "strike", "strong", "style", "sub",
    "summary", "sup", "svg", "table", "tbody", "td", "tfoot", "th", "thead", "time", "tr", "tt",
    "u", "ul", "var", "video", "wbr",
];

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        let names = HTML_TAGS.join("|");
        Regex::new(&format!(r"(?is)<!--.*?-->|</?(?:{names})\b[^<>]*>")).expect("tag regex")
    })
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Replace every `<![CDATA[...]]>` section with its contents.
pub fn unwrap_cdata(s: &str) -> String {
    re_cdata().replace_all(s, "$1").into_owned()
}

pub fn strip_tags(s: &str) -> String {
    re_tags().replace_all(s, " ").into_owned()
}

pub fn collapse_whitespace(s: &str) -> String {
    re_ws().replace_all(s, " ").trim().to_string()
}

/// Normalize display text (titles, descriptions, anchor text).
pub fn normalize_text(s: &str) -> String {
    // 1) CDATA unwrap
    let out = unwrap_cdata(s);

    // 2) Strip markup, then decode entities, then strip again: feeds often
    //    ship entity-escaped HTML (`&lt;p&gt;`) inside descriptions.
    let out = strip_tags(&out);
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = strip_tags(&out);

    // 3) Collapse whitespace
    collapse_whitespace(&out)
}

/// Normalize a link value: CDATA unwrap, entity decode, trim. No tag stripping.
pub fn normalize_link(s: &str) -> String {
    let out = unwrap_cdata(s);
    html_escape::decode_html_entities(out.trim()).trim().to_string()
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect::<String>().trim_end().to_string()
}
