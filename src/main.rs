use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use plate_gate::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{
        audit_log::DurableLogger, cache::ResultCache, metrics::MetricsRecorder,
        pipeline::RecognitionPipeline, recognizer::PlateRecognizerClient,
    },
};

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

    tracing::info!("Initializing plate-gate server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_histogram!(
        "plate_operation_duration_seconds",
        "Duration of named recognition operations"
    );
    metrics::describe_counter!(
        "plate_operations_total",
        "Completed recognition operations by outcome"
    );

    // Initialize recognizer client
    tracing::info!(endpoint = %config.plate_api_url, "Initializing plate recognizer client");
    let client = PlateRecognizerClient::new(config.recognizer_settings())
        .expect("Failed to initialize recognizer client");

    if let Err(e) = client.ensure_fallback_configured() {
        tracing::warn!(error = %e, "Fallback enabled without FALLBACK_API_TOKEN, primary failures will not fall back");
    }

    if !client.test_connection().await {
        tracing::warn!("Primary recognizer is not reachable yet, continuing");
    }

    // Durable audit log: file sink when enabled, in-memory otherwise
    let audit = if config.file_logging_enabled {
        match DurableLogger::open(&config.log_file_path).await {
            Ok(logger) => logger,
            Err(e) => {
                tracing::warn!(
                    path = %config.log_file_path,
                    error = %e,
                    "Failed to open durable log file, using in-memory log"
                );
                DurableLogger::in_memory()
            }
        }
    } else {
        DurableLogger::in_memory()
    };
    let audit = Arc::new(audit);

    let pipeline = RecognitionPipeline::new(
        Arc::new(client),
        Arc::new(ResultCache::new(config.cache_ttl())),
        Arc::new(MetricsRecorder::new()),
        audit.clone(),
        config.pipeline_config(),
    );

    // Create shared application state
    let state = AppState::new(pipeline);

    let app = routes::api_router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(routes::MAX_BODY_BYTES));

    tracing::info!("Starting plate-gate on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    audit.close().await;
}
