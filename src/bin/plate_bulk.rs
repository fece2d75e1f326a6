//! Batch runner: recognizes every image in a directory, in file-name order,
//! and prints the bulk summary as JSON.
//!
//! Usage: plate-bulk <directory> [camera_id]

use plate_gate::{
    config::AppConfig,
    models::upload::ImageUpload,
    services::{
        audit_log::DurableLogger, bulk::BulkProcessor, cache::ResultCache,
        metrics::MetricsRecorder, pipeline::RecognitionPipeline,
        recognizer::{PlateRecognizerClient, RecognizeOptions},
        validation,
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging (stderr, so stdout stays pure JSON)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let dir = args
        .next()
        .map(PathBuf::from)
        .ok_or("usage: plate-bulk <directory> [camera_id]")?;
    let camera_id = args.next();

    let config = AppConfig::from_env()?;

    let files = load_images(&dir).await?;
    tracing::info!(dir = %dir.display(), count = files.len(), "Loaded images");

    let audit = if config.file_logging_enabled {
        DurableLogger::open(&config.log_file_path).await?
    } else {
        DurableLogger::in_memory()
    };
    let audit = Arc::new(audit);

    let metrics = Arc::new(MetricsRecorder::new());
    let pipeline = Arc::new(RecognitionPipeline::new(
        Arc::new(PlateRecognizerClient::new(config.recognizer_settings())?),
        Arc::new(ResultCache::new(config.cache_ttl())),
        metrics.clone(),
        audit.clone(),
        config.pipeline_config(),
    ));

    let processor = BulkProcessor::new(pipeline).with_options(RecognizeOptions {
        camera_id,
        ..RecognizeOptions::default()
    });
    let summary = processor.process_bulk(&files).await;
    audit.close().await;

    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Ok(path) = std::env::var("METRICS_CSV_PATH") {
        tokio::fs::write(&path, metrics.export_csv()).await?;
        tracing::info!(path = %path, "Wrote metrics CSV");
    }

    Ok(())
}

/// Read every regular file in `dir`, sorted by name. Files over the upload
/// size limit are skipped without being read.
async fn load_images(dir: &Path) -> std::io::Result<Vec<ImageUpload>> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        if metadata.len() > validation::MAX_IMAGE_BYTES as u64 {
            tracing::warn!(
                path = %entry.path().display(),
                size = metadata.len(),
                max = validation::MAX_IMAGE_BYTES,
                "Skipping oversized file"
            );
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();

    let mut uploads = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path).await?;
        let content_type = validation::sniff_content_type(&bytes)
            .unwrap_or("application/octet-stream")
            .to_string();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        uploads.push(ImageUpload::new(filename, content_type, bytes));
    }
    Ok(uploads)
}
