// src/codec.rs
//! Stateless short codes: the token *is* the URL list.
//!
//! `encode` joins with `|`, base64-encodes, swaps `+`/`/` for `-`/`_` and
//! drops the padding. `decode` reverses each step.

use base64::{engine::general_purpose, Engine as _};

use crate::error::CodecError;

const DELIMITER: char = '|';

pub fn encode<S: AsRef<str>>(urls: &[S]) -> String {
    let joined = urls
        .iter()
        .map(|u| u.as_ref())
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string());

    general_purpose::STANDARD
        .encode(joined.as_bytes())
        .replace('+', "-")
        .replace('/', "_")
        .trim_end_matches('=')
        .to_string()
}

pub fn decode(code: &str) -> Result<Vec<String>, CodecError> {
    let mut b64 = code.trim().replace('-', "+").replace('_', "/");
    while b64.len() % 4 != 0 {
        b64.push('=');
    }

    let bytes = general_purpose::STANDARD
        .decode(b64.as_bytes())
        .map_err(|e| CodecError::Malformed(e.to_string()))?;
    let joined = String::from_utf8(bytes).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let urls: Vec<String> = joined
        .split(DELIMITER)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(urls)
}
