//! Serves aggregated statistics for a set of backup profiles.
//!
//! Each immediate subdirectory of `SNAPSTAT_DATA_ROOT` is a profile. A
//! refresh invokes the external reporting tool per profile and query mode,
//! merges the three result views into one record, and caches the
//! collection for `SNAPSTAT_CACHE_SECONDS`. Concurrent queries against a
//! stale cache share a single refresh round.

mod aggregator;
mod cache;
mod config;
mod discover;
mod error;
mod humanize;
mod metrics;
mod source;
mod stats;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use color_eyre::eyre::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::aggregator::Aggregator;
use crate::cache::StatsCache;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::source::CommandSource;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    info!("{:?}", &config);

    let metrics = Arc::new(Metrics::default());

    let source = CommandSource::new(config.binary.clone(), config.source_timeout);
    let aggregator = Aggregator::new(
        Box::new(source),
        config.data_root.clone().into(),
        config.reduced,
        metrics.clone(),
    );
    let cache = Arc::new(StatsCache::new(
        config.cache_ttl,
        Box::new(aggregator),
        metrics.clone(),
    ));

    let app = Router::new()
        .route("/stats", get(stats_handler))
        .with_state(cache);

    let listener = TcpListener::bind(&config.listen).await?;
    info!("listening on {}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("{:?}", metrics);
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn stats_handler(State(cache): State<Arc<StatsCache>>) -> Response {
    match cache.query().await {
        Ok(stats) => Json(&*stats).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}
