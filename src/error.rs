use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::services::pipeline::PipelineError;
use crate::services::recognizer::RecognitionError;
use crate::services::validation::ValidationError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("No image part in upload")]
    MissingImage,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Recognizer(#[from] RecognitionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedUpload(_) | ApiError::MissingImage => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(PipelineError::Validation(e)) => match e {
                ValidationError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ValidationError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ValidationError::TooSmall { .. } => StatusCode::BAD_REQUEST,
            },
            ApiError::Pipeline(PipelineError::LowConfidence { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Pipeline(PipelineError::Client(e)) | ApiError::Recognizer(e) => match e {
                RecognitionError::InvalidEndpoint(_) => StatusCode::BAD_REQUEST,
                RecognitionError::FallbackNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::BAD_GATEWAY,
            },
            ApiError::Pipeline(PipelineError::Recognition(_)) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unsupported: ApiError =
            PipelineError::from(ValidationError::UnsupportedFormat("image/gif".into())).into();
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let low: ApiError = PipelineError::LowConfidence {
            plate: "ABC1234".into(),
            confidence: 0.5,
            threshold: 0.8,
        }
        .into();
        assert_eq!(low.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let endpoint: ApiError = RecognitionError::InvalidEndpoint("x".into()).into();
        assert_eq!(endpoint.status(), StatusCode::BAD_REQUEST);

        let timeout: ApiError = PipelineError::Client(RecognitionError::Timeout(
            std::time::Duration::from_secs(1),
        ))
        .into();
        assert_eq!(timeout.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::MissingImage.status(), StatusCode::BAD_REQUEST);
    }
}
