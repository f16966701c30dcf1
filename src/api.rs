// src/api.rs
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use url::form_urlencoded::byte_serialize;

use crate::aggregate::Aggregator;
use crate::codec;
use crate::config::AppConfig;
use crate::error::{AggregateError, CodecError, FetchError, ValidationError};
use crate::ingest::fetcher::HttpFetcher;
use crate::ingest::types::SourceFetcher;
use crate::rss::{self, AggregateFeed};
use crate::source::{host_label, parse_source_url, SourceRequest};

const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";
const COMBINE_EXAMPLE: &str = "/api/combine?urls=https://patch.com,https://techcrunch.com";
const COMBINE_NUMBERED_EXAMPLE: &str =
    "/api/combine?url1=https://patch.com&url2=https://techcrunch.com";
const FEED_EXAMPLE: &str = "/api/feed?url=https://patch.com";
const SHORTEN_EXAMPLE: &str = "/api/shorten?urls=https://patch.com,https://techcrunch.com";

#[derive(Clone)]
pub struct AppState {
    aggregator: Aggregator,
    config: Arc<AppConfig>,
}

impl AppState {
    /// Live state: real HTTP fetcher configured from `config`.
    pub fn new(config: AppConfig) -> Self {
        let fetcher = HttpFetcher::new(config.user_agent.clone())
            .with_timeout(config.fetch_timeout())
            .with_max_body_bytes(config.max_body_bytes);
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    pub fn with_fetcher(config: AppConfig, fetcher: Arc<dyn SourceFetcher>) -> Self {
        let aggregator = Aggregator::new(fetcher, config.limits());
        Self {
            aggregator,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(cors::Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/combine",
            get(combine_get).post(combine_post).options(preflight),
        )
        .route("/api/feed", get(single_feed).options(preflight))
        .route(
            "/api/shorten",
            get(shorten_get).post(shorten_post).options(preflight),
        )
        .route("/api/s", get(expand_query).options(preflight))
        .route("/s/{code}", get(expand_path).options(preflight))
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic))
        .with_state(state)
}

// ---------- errors ----------

#[derive(Debug)]
pub enum ApiError {
    Validation {
        cause: ValidationError,
        example: Option<&'static str>,
    },
    Codec(CodecError),
    Empty(AggregateError),
    Upstream(FetchError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    example: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    example2: Option<&'static str>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            example: None,
            example2: None,
        }
    }
}

impl ApiError {
    fn validation(cause: ValidationError, example: &'static str) -> Self {
        ApiError::Validation {
            cause,
            example: Some(example),
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(e: CodecError) -> Self {
        ApiError::Codec(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation { cause, example } => {
                let mut body = ErrorBody::new(cause.to_string());
                body.example = example;
                if example == Some(COMBINE_EXAMPLE) && cause == ValidationError::NoUrls {
                    body.example2 = Some(COMBINE_NUMBERED_EXAMPLE);
                }
                (StatusCode::BAD_REQUEST, body)
            }
            ApiError::Codec(e) => (StatusCode::BAD_REQUEST, ErrorBody::new(e.to_string())),
            ApiError::Empty(e) => (StatusCode::NOT_FOUND, ErrorBody::new(e.to_string())),
            ApiError::Upstream(e) => {
                let mut body = ErrorBody::new("Failed to generate feed");
                body.message = Some(e.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        if status.is_server_error() {
            tracing::error!(target: "api", status = %status, error = %body.error, "request failed");
        } else {
            tracing::info!(target: "api", status = %status, error = %body.error, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(target: "api", panic = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Internal server error")),
    )
        .into_response()
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

// ---------- request parsing ----------

/// `urls` may be a JSON array or a comma-delimited string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UrlList {
    Many(Vec<String>),
    Delimited(String),
}

impl UrlList {
    fn into_vec(self) -> Vec<String> {
        match self {
            UrlList::Many(v) => v,
            UrlList::Delimited(s) => split_list(&s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UrlsBody {
    #[serde(default)]
    urls: Option<UrlList>,
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

/// `?urls=a,b` wins; otherwise numbered `url1..urlN`, ordered by N.
fn urls_from_query(q: &HashMap<String, String>) -> Vec<String> {
    if let Some(list) = q.get("urls") {
        return split_list(list);
    }
    let mut numbered: Vec<(usize, &String)> = q
        .iter()
        .filter_map(|(k, v)| {
            let n = k.strip_prefix("url")?.parse::<usize>().ok()?;
            Some((n, v))
        })
        .collect();
    numbered.sort_by_key(|(n, _)| *n);
    numbered
        .into_iter()
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Public origin for generated links: `X-Forwarded-Proto` + `Host`.
fn request_origin(headers: &HeaderMap, cfg: &AppConfig) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim())
        .filter(|v| !v.is_empty())
        .unwrap_or("https");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(cfg.public_host.as_str());
    format!("{proto}://{host}")
}

fn encode_component(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

/// Numbered `url1..urlN` params, so a `,` inside a URL cannot split it.
fn combine_url(origin: &str, urls: &[String]) -> String {
    let query = urls
        .iter()
        .enumerate()
        .map(|(i, u)| format!("url{}={}", i + 1, encode_component(u)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{origin}/api/combine?{query}")
}

fn rss_response(xml: String, max_age: u64) -> Response {
    (
        [
            (header::CONTENT_TYPE, RSS_CONTENT_TYPE.to_string()),
            (
                header::CACHE_CONTROL,
                format!("s-maxage={max_age}, stale-while-revalidate"),
            ),
        ],
        xml,
    )
        .into_response()
}

// ---------- handlers ----------

async fn combine_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    combined(&state, &headers, urls_from_query(&q)).await
}

async fn combine_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UrlsBody>,
) -> Result<Response, ApiError> {
    let urls = body.urls.map(UrlList::into_vec).unwrap_or_default();
    combined(&state, &headers, urls).await
}

async fn combined(
    state: &AppState,
    headers: &HeaderMap,
    urls: Vec<String>,
) -> Result<Response, ApiError> {
    let request = SourceRequest::with_limit(&urls, state.config.max_sources)
        .map_err(|e| ApiError::validation(e, COMBINE_EXAMPLE))?;

    tracing::info!(target: "api", sources = request.len(), "combine requested");

    let mut feed = state
        .aggregator
        .aggregate(&request)
        .await
        .map_err(ApiError::Empty)?;
    feed.self_link = Some(combine_url(&request_origin(headers, &state.config), request.raw()));

    Ok(rss_response(rss::render(&feed), state.config.combined_max_age_secs))
}

async fn single_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let raw = q
        .get("url")
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::validation(ValidationError::NoUrls, FEED_EXAMPLE))?;
    let url = parse_source_url(&raw).map_err(|e| ApiError::validation(e, FEED_EXAMPLE))?;

    let res = state
        .aggregator
        .single(&url)
        .await
        .map_err(ApiError::Upstream)?;

    let origin = request_origin(&headers, &state.config);
    let feed = AggregateFeed {
        channel_title: res.title.unwrap_or_else(|| host_label(&url)),
        channel_link: raw.clone(),
        channel_description: res
            .description
            .unwrap_or_else(|| format!("RSS feed for {raw}")),
        self_link: Some(format!("{origin}/api/feed?url={}", encode_component(&raw))),
        articles: res.articles,
        generated_at: chrono::Utc::now(),
        tag_sources: false,
    };

    Ok(rss_response(rss::render(&feed), state.config.single_max_age_secs))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShortenResponse {
    short_code: String,
    short_url: String,
    full_url: String,
    urls: Vec<String>,
    count: usize,
}

async fn shorten_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<ShortenResponse>, ApiError> {
    let urls = q.get("urls").map(|s| split_list(s)).unwrap_or_default();
    shorten(&state, &headers, urls)
}

async fn shorten_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UrlsBody>,
) -> Result<Json<ShortenResponse>, ApiError> {
    let urls = body.urls.map(UrlList::into_vec).unwrap_or_default();
    shorten(&state, &headers, urls)
}

fn shorten(
    state: &AppState,
    headers: &HeaderMap,
    urls: Vec<String>,
) -> Result<Json<ShortenResponse>, ApiError> {
    let request = SourceRequest::with_limit(&urls, state.config.max_sources)
        .map_err(|e| ApiError::validation(e, SHORTEN_EXAMPLE))?;

    let origin = request_origin(headers, &state.config);
    let code = codec::encode(request.raw());
    tracing::info!(target: "api", count = request.len(), code = %code, "short code issued");

    Ok(Json(ShortenResponse {
        short_url: format!("{origin}/s/{code}"),
        full_url: combine_url(&origin, request.raw()),
        short_code: code,
        urls: request.raw().to_vec(),
        count: request.len(),
    }))
}

async fn expand_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    expand(&state, &headers, &code)
}

async fn expand_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let code = q
        .get("code")
        .filter(|c| !c.trim().is_empty())
        .ok_or(ApiError::Validation {
            cause: ValidationError::MissingCode,
            example: None,
        })?;
    expand(&state, &headers, code)
}

fn expand(state: &AppState, headers: &HeaderMap, code: &str) -> Result<Response, ApiError> {
    let urls = codec::decode(code)?;
    let location = combine_url(&request_origin(headers, &state.config), &urls);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn delimited_list_takes_precedence_over_numbered() {
        let q = query(&[("urls", "https://a.com, ,https://b.com"), ("url1", "https://c.com")]);
        assert_eq!(urls_from_query(&q), vec!["https://a.com", "https://b.com"]);
    }

    #[test]
    fn numbered_params_are_ordered_by_index() {
        let q = query(&[
            ("url10", "https://j.com"),
            ("url2", "https://b.com"),
            ("url1", "https://a.com"),
            ("other", "x"),
        ]);
        assert_eq!(
            urls_from_query(&q),
            vec!["https://a.com", "https://b.com", "https://j.com"]
        );
    }

    #[test]
    fn origin_prefers_forwarded_proto_and_host() {
        let cfg = AppConfig::default();
        let mut h = HeaderMap::new();
        assert_eq!(request_origin(&h, &cfg), "https://localhost:8000");
        h.insert(header::HOST, "feeds.example".parse().unwrap());
        h.insert("x-forwarded-proto", "http".parse().unwrap());
        assert_eq!(request_origin(&h, &cfg), "http://feeds.example");
    }

    #[test]
    fn combine_url_keeps_commas_inside_one_param() {
        let raw = "https://news.example/rss?q=rust,tokio".to_string();
        let url = combine_url("https://h", &[raw.clone()]);
        assert_eq!(url, "https://h/api/combine?url1=https%3A%2F%2Fnews.example%2Frss%3Fq%3Drust%2Ctokio");

        let query: HashMap<String, String> = url::form_urlencoded::parse(
            url.split_once('?').map(|(_, q)| q).unwrap_or_default().as_bytes(),
        )
        .into_owned()
        .collect();
        assert_eq!(urls_from_query(&query), vec![raw]);
    }

    #[test]
    fn combine_url_percent_encodes_each_url() {
        let url = combine_url(
            "https://h",
            &["https://a.com/x?y=1&z=2".to_string(), "https://b.com".to_string()],
        );
        assert_eq!(
            url,
            "https://h/api/combine?url1=https%3A%2F%2Fa.com%2Fx%3Fy%3D1%26z%3D2&url2=https%3A%2F%2Fb.com"
        );
    }
}
