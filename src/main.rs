//! Feed combiner: binary entrypoint.
//! Boots the Axum HTTP server with the aggregation router and `/metrics`.

use anyhow::Context;
use feed_combiner::{metrics::Metrics, router, AppConfig, AppState};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs. Best-effort: a subscriber installed by the host
/// runtime stays in place.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_combiner=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = AppConfig::load_default().context("loading feed config")?;
    tracing::info!(
        max_sources = config.max_sources,
        fetch_timeout_secs = config.fetch_timeout_secs,
        public_host = %config.public_host,
        "config loaded"
    );

    let metrics = Metrics::init(config.max_sources, config.fetch_timeout_secs)?;
    let app = router(AppState::new(config)).merge(metrics.router());

    Ok(app.into())
}
