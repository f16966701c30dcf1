// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot; upstream
// sources are wiremock servers.
//
// Covered:
// - GET /health
// - GET|POST /api/combine (validation, success headers, empty aggregate)
// - GET /api/feed
// - GET|POST /api/shorten + GET /s/{code} round-trip
// - OPTIONS preflight

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use feed_combiner::error::FetchError;
use feed_combiner::ingest::types::FetchedSource;
use feed_combiner::{router, AppConfig, AppState, SourceFetcher};
use std::sync::Arc;
use url::Url;
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY_LIMIT: usize = 1024 * 1024;

fn test_router() -> Router {
    router(AppState::new(AppConfig::default()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::HOST, "feeds.test")
        .body(Body::empty())
        .expect("build GET");
    send(app, req).await
}

async fn post_json(app: Router, uri: &str, payload: Json) -> (StatusCode, axum::http::HeaderMap, String) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, "feeds.test")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST");
    send(app, req).await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, headers, String::from_utf8(bytes).expect("utf8"))
}

async fn rss_server(items: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let body: String = items
        .iter()
        .map(|t| format!("<item><title>{t}</title><link>https://x.example/{t}</link></item>"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/rss+xml")
                .set_body_string(format!(
                    "<rss><channel><title>Up & Down</title>{body}</channel></rss>"
                )),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, _, body) = get(test_router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn combine_without_urls_is_400_with_examples() {
    let (status, _, body) = get(test_router(), "/api/combine").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Json = serde_json::from_str(&body).expect("json");
    assert_eq!(v["error"], "URLs required");
    assert!(v.get("example").is_some());
    assert!(v.get("example2").is_some());
}

#[tokio::test]
async fn combine_with_six_urls_is_400() {
    let urls: Vec<String> = (1..=6).map(|i| format!("https://s{i}.example")).collect();
    let uri = format!("/api/combine?urls={}", urls.join(","));
    let (status, _, body) = get(test_router(), &uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Maximum 5 URLs allowed"));
}

#[tokio::test]
async fn combine_with_bad_url_is_400() {
    let (status, _, _) = get(test_router(), "/api/combine?url1=not-a-url").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn combine_renders_rss_with_cache_hint() {
    let server = rss_server(&["one", "two"]).await;
    let uri = format!("/api/combine?url1={}/feed", server.uri());
    let (status, headers, body) = get(test_router(), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CONTENT_TYPE],
        "application/rss+xml; charset=utf-8"
    );
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "s-maxage=1800, stale-while-revalidate"
    );
    assert!(body.contains("<title>Combined Feed: Up &amp; Down</title>"));
    assert!(body.contains("<title>one [Up &amp; Down]</title>"));
    assert!(body.contains("<guid isPermaLink=\"true\">https://x.example/two</guid>"));
    assert!(body.contains("<atom:link href=\"https://feeds.test/api/combine?url1="));
}

#[tokio::test]
async fn combine_post_accepts_json_array() {
    let server = rss_server(&["posted"]).await;
    let payload = json!({ "urls": [format!("{}/feed", server.uri())] });
    let (status, _, body) = post_json(test_router(), "/api/combine", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("posted"));
}

#[tokio::test]
async fn combine_with_only_empty_sources_is_404() {
    let server = rss_server(&[]).await;
    let uri = format!("/api/combine?urls={0}/feed,{0}/missing", server.uri());
    let (status, headers, body) = get(test_router(), &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let v: Json = serde_json::from_str(&body).expect("json");
    assert_eq!(v["error"], "Could not extract any articles from provided URLs");
}

#[tokio::test]
async fn single_feed_uses_page_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Quiet Town</title>\
             <meta name=\"description\" content=\"Everything local\"></head>\
             <body><article><a href=\"/s/1\">A story from the quiet town</a></article></body></html>",
        ))
        .mount(&server)
        .await;

    let uri = format!("/api/feed?url={}/page", server.uri());
    let (status, headers, body) = get(test_router(), &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "s-maxage=3600, stale-while-revalidate"
    );
    assert!(body.contains("<title>Quiet Town</title>"));
    assert!(body.contains("<description>Everything local</description>"));
    assert!(body.contains("<title>A story from the quiet town</title>"));
    assert!(!body.contains("<source"));
}

#[tokio::test]
async fn single_feed_validation_and_upstream_failure() {
    let (status, _, _) = get(test_router(), "/api/feed").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(test_router(), "/api/feed?url=nope").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let uri = format!("/api/feed?url={}/down", server.uri());
    let (status, _, body) = get(test_router(), &uri).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("Failed to generate feed"));
}

#[tokio::test]
async fn shorten_then_expand_redirects_to_combine() {
    let payload = json!({ "urls": "https://patch.com, https://techcrunch.com/feed?a=1&b=2" });
    let (status, _, body) = post_json(test_router(), "/api/shorten", payload).await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_str(&body).expect("json");
    assert_eq!(v["count"], 2);
    assert_eq!(v["urls"][1], "https://techcrunch.com/feed?a=1&b=2");
    let code = v["shortCode"].as_str().expect("shortCode").to_string();
    assert_eq!(v["shortUrl"], format!("https://feeds.test/s/{code}"));

    let expected = "https://feeds.test/api/combine?url1=https%3A%2F%2Fpatch.com\
                    &url2=https%3A%2F%2Ftechcrunch.com%2Ffeed%3Fa%3D1%26b%3D2";
    assert_eq!(v["fullUrl"], expected);

    let (status, headers, _) = get(test_router(), &format!("/s/{code}")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], expected);

    let (status, headers, _) = get(test_router(), &format!("/api/s?code={code}")).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(headers[header::LOCATION], expected);
}

#[tokio::test]
async fn redirect_for_comma_url_combines_that_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/rss+xml")
                .set_body_string(
                    "<rss><channel><title>Rust news</title><item><title>comma ok</title>\
                     <link>https://x.example/c</link></item></channel></rss>",
                ),
        )
        .mount(&server)
        .await;

    let source = format!("{}/rss?q=rust,tokio", server.uri());
    let (status, _, body) =
        post_json(test_router(), "/api/shorten", json!({ "urls": [source.clone()] })).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).expect("json");
    assert_eq!(v["urls"][0], source.as_str());
    let code = v["shortCode"].as_str().expect("shortCode").to_string();

    let (status, headers, _) = get(test_router(), &format!("/s/{code}")).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = headers[header::LOCATION].to_str().expect("ascii location");
    let path_and_query = location
        .strip_prefix("https://feeds.test")
        .expect("same origin");

    let (status, _, body) = get(test_router(), path_and_query).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body.contains("<title>comma ok [Rust news]</title>"));
}

/// Fetcher that blows up inside the request path.
struct PanickingFetcher;

#[async_trait]
impl SourceFetcher for PanickingFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FetchedSource, FetchError> {
        panic!("fetcher exploded");
    }
}

#[tokio::test]
async fn panic_in_handler_path_is_an_opaque_500() {
    let app = router(AppState::with_fetcher(
        AppConfig::default(),
        Arc::new(PanickingFetcher),
    ));
    let (status, headers, body) = get(app, "/api/feed?url=https://boom.example").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let v: Json = serde_json::from_str(&body).expect("json");
    assert_eq!(v, json!({ "error": "Internal server error" }));
    assert!(!body.contains("<rss"));
    assert!(!body.contains("fetcher exploded"));
}

#[tokio::test]
async fn shorten_bounds_and_bad_codes() {
    let (status, _, _) = get(test_router(), "/api/shorten").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = get(test_router(), "/s/a").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("short code"));

    let (status, _, body) = get(test_router(), "/api/s").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Short code required"));
}

#[tokio::test]
async fn options_preflight_is_empty_200() {
    for uri in ["/api/combine", "/api/feed", "/api/shorten"] {
        let req = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .body(Body::empty())
            .expect("build OPTIONS");
        let (status, _, body) = send(test_router(), req).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(body.is_empty());
    }

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/combine")
        .header(header::ORIGIN, "https://reader.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .expect("build preflight");
    let (status, headers, _) = send(test_router(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
