// src/ingest/scan.rs
//! Forgiving tag scanner shared by the feed and page extractors.
//!
//! Finds `<name ...>inner</name>` spans by position, case-insensitively. It
//! never fails: an unclosed element runs until the next sibling opening tag
//! or the end of the document, and a truncated opening tag ends the scan.

use once_cell::sync::OnceCell;
use regex::Regex;

/// One matched element. Both slices borrow from the scanned document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub attrs: &'a str,
    pub inner: &'a str,
}

impl<'a> Element<'a> {
    /// Value of attribute `name` (case-insensitive), quotes removed.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        attr(self.attrs, name)
    }
}

pub struct Elements<'a> {
    doc: &'a str,
    lower: String,
    open: String,
    close: String,
    pos: usize,
}

/// Iterate every `name` element of `doc` in document order.
pub fn elements<'a>(doc: &'a str, name: &str) -> Elements<'a> {
    let name = name.to_ascii_lowercase();
    Elements {
        doc,
        lower: doc.to_ascii_lowercase(),
        open: format!("<{name}"),
        close: format!("</{name}"),
        pos: 0,
    }
}

/// First `name` element of `doc`, if any.
pub fn first<'a>(doc: &'a str, name: &str) -> Option<Element<'a>> {
    elements(doc, name).next()
}

/// Inner text of the first `name` element, if present.
pub fn first_inner<'a>(doc: &'a str, name: &str) -> Option<&'a str> {
    first(doc, name).map(|e| e.inner)
}

impl<'a> Iterator for Elements<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.doc.as_bytes();
        let start = find_tag(&self.lower, &self.open, self.pos)?;
        let attrs_start = start + self.open.len();
        let gt = tag_end(bytes, attrs_start)?;

        let raw_attrs = &self.doc[attrs_start..gt];
        if raw_attrs.trim_end().ends_with('/') {
            self.pos = gt + 1;
            return Some(Element {
                attrs: raw_attrs.trim_end().trim_end_matches('/'),
                inner: "",
            });
        }

        let body_start = gt + 1;
        let next_close = find_tag(&self.lower, &self.close, body_start);
        let next_open = find_tag(&self.lower, &self.open, body_start);

        let (body_end, resume) = match (next_close, next_open) {
            (Some(c), Some(o)) if o < c => (o, o),
            (Some(c), _) => {
                let after = tag_end(bytes, c + self.close.len()).map_or(bytes.len(), |i| i + 1);
                (c, after)
            }
            (None, Some(o)) => (o, o),
            (None, None) => (bytes.len(), bytes.len()),
        };

        self.pos = resume;
        Some(Element {
            attrs: raw_attrs,
            inner: &self.doc[body_start..body_end],
        })
    }
}

/// Position of the next `needle` (e.g. `<item`) whose name is not merely a
/// prefix of a longer tag name (`<itemref`).
fn find_tag(lower: &str, needle: &str, from: usize) -> Option<usize> {
    let mut cursor = from;
    while cursor <= lower.len() {
        let idx = cursor + lower.get(cursor..)?.find(needle)?;
        let boundary = lower.as_bytes().get(idx + needle.len()).copied();
        match boundary {
            None => return Some(idx),
            Some(b) if b == b'>' || b == b'/' || b.is_ascii_whitespace() => return Some(idx),
            Some(_) => cursor = idx + 1,
        }
    }
    None
}

/// Index of the `>` closing the tag that started before `from`, skipping
/// quoted attribute values. A quote only opens a value right after `=`, so an
/// apostrophe inside an unquoted value is plain text. Falls back to the first
/// bare `>` when a quote never closes.
fn tag_end(bytes: &[u8], from: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut after_eq = false;
    for (i, &b) in bytes.iter().enumerate().skip(from) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
                continue;
            }
            None if b == b'>' => return Some(i),
            None if after_eq && (b == b'"' || b == b'\'') => {
                quote = Some(b);
                continue;
            }
            None => {}
        }
        if !b.is_ascii_whitespace() {
            after_eq = b == b'=';
        }
    }
    bytes
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, &b)| b == b'>')
        .map(|(i, _)| i)
}

fn attr_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`][^\s>]*))"#)
            .expect("attribute regex")
    })
}

/// Look up one attribute in a raw attribute string.
pub fn attr<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attr_regex().captures_iter(attrs).find_map(|caps| {
        let key = caps.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        caps.get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str())
    })
}
