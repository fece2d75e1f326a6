use axum::extract::{Multipart, State};
use axum::Json;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::bulk::BulkProcessingResult;
use crate::models::recognition::RecognitionResult;
use crate::models::upload::ImageUpload;
use crate::services::bulk::BulkProcessor;
use crate::services::recognizer::RecognizeOptions;
use crate::services::validation;

/// Parsed multipart form: every `image` part in order plus request options.
struct UploadForm {
    images: Vec<ImageUpload>,
    options: RecognizeOptions,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut images = Vec::new();
    let mut options = RecognizeOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MalformedUpload(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("upload-{}", images.len() + 1));
                let declared = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::MalformedUpload(e.to_string()))?;

                // Parts without a declared type are sniffed from their magic bytes.
                let content_type = declared
                    .filter(|ct| ct != "application/octet-stream")
                    .or_else(|| validation::sniff_content_type(&data).map(str::to_string))
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                images.push(ImageUpload::new(filename, content_type, data.to_vec()));
            }
            "regions" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::MalformedUpload(e.to_string()))?;
                let regions: Vec<String> = text
                    .split(',')
                    .map(|r| r.trim().to_lowercase())
                    .filter(|r| !r.is_empty())
                    .collect();
                if !regions.is_empty() {
                    options.regions = Some(regions);
                }
            }
            "camera_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::MalformedUpload(e.to_string()))?;
                options.camera_id = Some(text.trim().to_string()).filter(|c| !c.is_empty());
            }
            _ => {}
        }
    }

    Ok(UploadForm { images, options })
}

/// POST /api/v1/recognize: recognize the plate in one uploaded capture.
pub async fn submit_recognition(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RecognitionResult>, ApiError> {
    let form = read_form(multipart).await?;
    let upload = form.images.into_iter().next().ok_or(ApiError::MissingImage)?;

    let result = state.pipeline.recognize(&upload, &form.options).await?;
    Ok(Json(result))
}

/// POST /api/v1/recognize/bulk: recognize every uploaded capture in order.
pub async fn submit_bulk(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<BulkProcessingResult>, ApiError> {
    let form = read_form(multipart).await?;
    let summary = if form.options.regions.is_some() || form.options.camera_id.is_some() {
        BulkProcessor::new(state.pipeline.clone())
            .with_options(form.options)
            .process_bulk(&form.images)
            .await
    } else {
        state.bulk.process_bulk(&form.images).await
    };
    Ok(Json(summary))
}
