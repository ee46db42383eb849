mod app_state;
mod config;
mod models;
mod providers;
mod routes;

use axum::http::{header, Method};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use providers::Pipeline;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing placa-fipe server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("placa_lookups_total", "Total plate lookups received");
    metrics::describe_counter!(
        "placa_lookups_rejected_total",
        "Lookups rejected for invalid plate format"
    );
    metrics::describe_counter!(
        "placa_lookups_exhausted_total",
        "Lookups for which every provider missed or failed"
    );
    metrics::describe_counter!(
        "provider_lookups_total",
        "Per-provider lookup attempts by outcome"
    );
    metrics::describe_histogram!(
        "placa_resolution_seconds",
        "Time to resolve a plate through the provider pipeline"
    );

    // Build the ordered provider pipeline from configuration
    let pipeline = Pipeline::from_config(&config).expect("Failed to build provider pipeline");
    tracing::info!(providers = ?pipeline.provider_names(), "Provider pipeline configured");

    let state = AppState::new(pipeline);

    // The lookup endpoint is consumed by browser frontends on other origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/placa", get(routes::placa::lookup_placa))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors);

    tracing::info!("Starting placa-fipe on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
