// tests/codec_roundtrip.rs
use feed_combiner::codec::{decode, encode};
use feed_combiner::error::CodecError;

#[test]
fn one_to_five_urls_roundtrip() {
    let pool = [
        "https://patch.com",
        "https://techcrunch.com/feed/",
        "http://news.ycombinator.com/rss?x=1&y=%20z",
        "https://www.example.org/a/b/c?q=caf%C3%A9#frag",
        "https://blog.example/\u{00fc}ber",
    ];
    for n in 1..=pool.len() {
        let urls: Vec<String> = pool[..n].iter().map(|s| s.to_string()).collect();
        let code = encode(&urls);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "code must be URL-safe: {code}"
        );
        assert_eq!(decode(&code).unwrap(), urls);
    }
}

#[test]
fn equal_lists_give_equal_codes() {
    let a = encode(&["https://a.com", "https://b.com"]);
    let b = encode(&["https://a.com".to_string(), "https://b.com".to_string()]);
    assert_eq!(a, b);
}

#[test]
fn garbage_is_rejected() {
    assert!(matches!(decode("a"), Err(CodecError::Malformed(_))));
    assert!(matches!(decode("@@@@"), Err(CodecError::Malformed(_))));
    // valid base64 that is not UTF-8
    assert!(matches!(decode("__79"), Err(CodecError::Malformed(_))));
    // decodes fine but carries only delimiters
    assert_eq!(decode(&encode(&["|"])), Err(CodecError::Empty));
}
