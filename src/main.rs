mod affordances;
mod cameras;
mod config;
mod detail;
mod envelope;
mod feed;
mod page;
mod reconnect;
mod transport;
mod ui;
mod web;

use crate::cameras::{load_cameras, monitoring_body};
use crate::config::AppConfig;
use crate::detail::HttpDetailSource;
use crate::feed::{FeedController, FeedSettings};
use crate::page::{Document, SharedDocument};
use crate::reconnect::ReconnectSchedule;
use crate::web::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Arc::new(AppConfig::from_env());
    let feed_url = transport::feed_url(&config.backend_origin)
        .context("BACKEND_ORIGIN must be an http(s) origin")?;

    tracing::info!(
        "Starting ppe-feed on {} (backend: {}, reconnect: {:?})",
        config.http_bind,
        config.backend_origin,
        config.reconnect
    );

    let source = HttpDetailSource::new(&config.backend_origin, config.detail_timeout)?;
    let cameras = load_cameras(&source).await;
    let document = SharedDocument::new(Document::new(monitoring_body(&cameras)));
    let controller = FeedController::new(
        document,
        source,
        FeedSettings {
            capacity: config.feed_capacity,
            timestamp_format: config.timestamp_format.clone(),
        },
    );

    let feed_task = if affordances::on_document_ready(&controller) {
        let schedule = ReconnectSchedule::new(config.reconnect.clone());
        Some(tokio::spawn(transport::run_feed(
            feed_url,
            controller.clone(),
            schedule,
        )))
    } else {
        None
    };

    let state = AppState {
        config: config.clone(),
        controller,
    };

    web::serve(state).await?;

    if let Some(task) = feed_task {
        task.abort();
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}
