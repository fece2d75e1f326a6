use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use crate::models::recognition::{
    normalize_plate, BoundingBox, RecognitionCandidate, RecognitionResult, ResultSource,
};
use crate::services::backoff::AttemptTimedOut;

/// Static settings for [`PlateRecognizerClient`].
#[derive(Debug, Clone)]
pub struct RecognizerSettings {
    pub primary_url: String,
    pub primary_token: Option<String>,
    pub fallback_url: String,
    pub fallback_token: Option<String>,
    pub fallback_enabled: bool,
    /// Candidates below this confidence are dropped from results.
    pub threshold: f64,
    pub regions: Vec<String>,
    pub timeout: Duration,
}

/// Per-call request options.
#[derive(Debug, Clone, Default)]
pub struct RecognizeOptions {
    /// Overrides the configured region list for this call.
    pub regions: Option<Vec<String>>,
    pub camera_id: Option<String>,
    /// File name sent with the multipart upload.
    pub filename: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("Recognition service error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    #[error("Recognition request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error contacting recognizer: {0}")]
    Network(String),

    #[error("Failed to decode recognizer response: {0}")]
    Decode(String),

    #[error("Fallback recognizer requested but no API token is configured")]
    FallbackNotConfigured,

    #[error("Invalid recognizer endpoint URL: {0}")]
    InvalidEndpoint(String),
}

impl RecognitionError {
    /// Configuration errors repeat identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            RecognitionError::FallbackNotConfigured | RecognitionError::InvalidEndpoint(_)
        )
    }
}

impl From<AttemptTimedOut> for RecognitionError {
    fn from(e: AttemptTimedOut) -> Self {
        RecognitionError::Timeout(e.0)
    }
}

#[derive(Deserialize)]
struct PlateApiResponse {
    #[serde(default)]
    processing_time: f64,
    #[serde(default)]
    results: Vec<ApiPlate>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct ApiPlate {
    plate: String,
    #[serde(alias = "score")]
    confidence: f64,
    #[serde(default)]
    region: Option<ApiRegion>,
    #[serde(default)]
    vehicle: Option<ApiVehicle>,
    #[serde(default, rename = "box")]
    bounding_box: Option<BoundingBox>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ApiRegion {
    Code(String),
    Detailed { code: String },
}

#[derive(Deserialize)]
struct ApiVehicle {
    #[serde(rename = "type")]
    kind: String,
}

impl From<ApiPlate> for RecognitionCandidate {
    fn from(p: ApiPlate) -> Self {
        RecognitionCandidate {
            plate: normalize_plate(&p.plate),
            confidence: p.confidence,
            region: p.region.map(|r| match r {
                ApiRegion::Code(code) | ApiRegion::Detailed { code } => code,
            }),
            vehicle_type: p.vehicle.map(|v| v.kind),
            bounding_box: p.bounding_box,
        }
    }
}

enum Credential<'a> {
    Token(&'a str),
    Bearer(&'a str),
}

/// Recognizer client with runtime-replaceable primary endpoint.
pub struct PlateRecognizerClient {
    http: Client,
    primary_url: RwLock<Url>,
    primary_token: Option<String>,
    fallback_url: Url,
    fallback_token: Option<String>,
    fallback_enabled: bool,
    threshold: f64,
    regions: Vec<String>,
    timeout: Duration,
}

impl PlateRecognizerClient {
    pub fn new(settings: RecognizerSettings) -> Result<Self, RecognitionError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("plate-gate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RecognitionError::Network(e.to_string()))?;

        Ok(Self {
            http,
            primary_url: RwLock::new(parse_endpoint(&settings.primary_url)?),
            primary_token: settings.primary_token.filter(|t| !t.is_empty()),
            fallback_url: parse_endpoint(&settings.fallback_url)?,
            fallback_token: settings.fallback_token.filter(|t| !t.is_empty()),
            fallback_enabled: settings.fallback_enabled,
            threshold: settings.threshold,
            regions: settings.regions,
            timeout: settings.timeout,
        })
    }

    /// Current primary endpoint.
    pub fn primary_endpoint(&self) -> Url {
        self.primary_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the primary endpoint. Calls already in flight keep the URL they
    /// started with.
    pub fn update_primary_endpoint(&self, url: &str) -> Result<(), RecognitionError> {
        let url = parse_endpoint(url)?;
        tracing::info!(endpoint = %url, "Primary recognizer endpoint updated");
        *self
            .primary_url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = url;
        Ok(())
    }

    /// Startup check: fails when fallback is enabled but the secondary has
    /// no credential. Recognition itself still tries the primary.
    pub fn ensure_fallback_configured(&self) -> Result<(), RecognitionError> {
        if self.fallback_enabled && self.fallback_token.is_none() {
            return Err(RecognitionError::FallbackNotConfigured);
        }
        Ok(())
    }

    /// Liveness probe against the primary's `health` sibling path. Never errors.
    pub async fn test_connection(&self) -> bool {
        let url = health_url(&self.primary_endpoint());
        match self.http.get(url.clone()).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                if !healthy {
                    tracing::warn!(url = %url, status = %response.status(), "Recognizer health check failed");
                }
                healthy
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Recognizer unreachable");
                false
            }
        }
    }

    /// Recognize plates using the primary endpoint only.
    pub async fn recognize(
        &self,
        image: &[u8],
        options: &RecognizeOptions,
    ) -> Result<RecognitionResult, RecognitionError> {
        let url = self.primary_endpoint();
        let credential = self.primary_token.as_deref().map(Credential::Token);
        self.call(url, credential, image, options, ResultSource::Primary)
            .await
    }

    /// Recognize with the primary, falling back once to the secondary.
    ///
    /// When both fail, the secondary's error is returned. A primary failure
    /// with fallback enabled but no secondary token yields
    /// [`RecognitionError::FallbackNotConfigured`] without contacting the
    /// secondary.
    pub async fn recognize_with_fallback(
        &self,
        image: &[u8],
        options: &RecognizeOptions,
    ) -> Result<RecognitionResult, RecognitionError> {
        match self.recognize(image, options).await {
            Ok(result) => Ok(result),
            Err(primary_err) if self.fallback_enabled => {
                let Some(token) = self.fallback_token.as_deref() else {
                    tracing::error!(
                        error = %primary_err,
                        "Primary recognizer failed and fallback has no API token"
                    );
                    return Err(RecognitionError::FallbackNotConfigured);
                };
                tracing::warn!(error = %primary_err, "Primary recognizer failed, trying fallback");
                self.call(
                    self.fallback_url.clone(),
                    Some(Credential::Bearer(token)),
                    image,
                    options,
                    ResultSource::Fallback,
                )
                .await
            }
            Err(primary_err) => Err(primary_err),
        }
    }

    async fn call(
        &self,
        url: Url,
        credential: Option<Credential<'_>>,
        image: &[u8],
        options: &RecognizeOptions,
        source: ResultSource,
    ) -> Result<RecognitionResult, RecognitionError> {
        let filename = options
            .filename
            .clone()
            .unwrap_or_else(|| "capture.jpg".to_string());

        let mut form = multipart::Form::new().part(
            "upload",
            multipart::Part::bytes(image.to_vec()).file_name(filename.clone()),
        );

        let regions = options.regions.as_ref().unwrap_or(&self.regions);
        if !regions.is_empty() {
            form = form.text("regions", regions.join(","));
        }
        if let Some(camera_id) = &options.camera_id {
            form = form.text("camera_id", camera_id.clone());
        }

        let request = authorize(self.http.post(url.clone()).multipart(form), credential);

        tracing::debug!(url = %url, %source, bytes = image.len(), "Submitting image to recognizer");
        let response = request.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Service {
                status: status.as_u16(),
                message: service_message(status, &body),
            });
        }

        let body: PlateApiResponse = response.json().await.map_err(|e| self.classify(e))?;

        let raw: Vec<RecognitionCandidate> = body.results.into_iter().map(Into::into).collect();
        let raw_count = raw.len();
        let candidates = filter_candidates(raw, self.threshold);

        tracing::debug!(
            %source,
            raw_count,
            kept = candidates.len(),
            processing_time_ms = body.processing_time,
            "Recognizer responded"
        );

        Ok(RecognitionResult {
            candidates,
            processing_time_ms: body.processing_time,
            filename: body.filename.unwrap_or(filename),
            timestamp: body
                .timestamp
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or_else(Utc::now),
            source,
            from_cache: false,
        })
    }

    fn classify(&self, e: reqwest::Error) -> RecognitionError {
        if e.is_timeout() {
            RecognitionError::Timeout(self.timeout)
        } else if e.is_decode() {
            RecognitionError::Decode(e.to_string())
        } else {
            RecognitionError::Network(e.to_string())
        }
    }
}

fn authorize(request: RequestBuilder, credential: Option<Credential<'_>>) -> RequestBuilder {
    match credential {
        Some(Credential::Token(token)) => {
            request.header(reqwest::header::AUTHORIZATION, format!("Token {token}"))
        }
        Some(Credential::Bearer(token)) => request.bearer_auth(token),
        None => request,
    }
}

fn parse_endpoint(url: &str) -> Result<Url, RecognitionError> {
    let parsed = Url::parse(url).map_err(|e| RecognitionError::InvalidEndpoint(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RecognitionError::InvalidEndpoint(format!(
            "{url}: unsupported scheme"
        )));
    }
    Ok(parsed)
}

/// Keep candidates at or above `threshold`, preserving detector order.
pub fn filter_candidates(
    candidates: Vec<RecognitionCandidate>,
    threshold: f64,
) -> Vec<RecognitionCandidate> {
    candidates
        .into_iter()
        .filter(|c| c.confidence >= threshold)
        .collect()
}

/// Sibling `health` path of a recognition endpoint: the trailing resource
/// segment is replaced, e.g. `/v1/plate-reader/` becomes `/v1/health`.
pub fn health_url(endpoint: &Url) -> Url {
    let mut url = endpoint.clone();
    url.set_query(None);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().pop().push("health");
    }
    url
}

/// Extract a human-readable message from an error response body
/// (`{error, details?}`, or `{detail}`), falling back to the raw text.
fn service_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let text = |v: &serde_json::Value| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if let Some(error) = value.get("error") {
            return match value.get("details") {
                Some(details) if !details.is_null() => {
                    format!("{} ({})", text(error), text(details))
                }
                _ => text(error),
            };
        }
        if let Some(detail) = value.get("detail") {
            return text(detail);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}
