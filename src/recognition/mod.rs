//! Math OCR client for a Mathpix-compatible text recognition API.
//!
//! One HTTP call per image. Oversized photos are downscaled before upload;
//! an oversize rejection from the provider is still classified separately as
//! a secondary signal.

mod image_prep;

use async_trait::async_trait;
use image::DynamicImage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Credentials;
use crate::models::RecognitionResult;

pub use image_prep::{downscale_if_needed, encode_jpeg, to_data_uri};

/// Substring the provider embeds in oversize rejection bodies.
///
/// Matching is case-insensitive and best-effort: if the provider rewords the
/// message, oversize rejections degrade to generic API errors. The proactive
/// downscale in `image_prep` is the primary defense, not this check.
const OVERSIZE_MARKER: &str = "request too large";

/// Errors that can occur during math recognition.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Failed to reach the recognition provider.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Provider returned an error status or error payload.
    #[error("Recognition API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider rejected the request as too large. The image should be
    /// downscaled further before resubmitting.
    #[error("Image exceeds the provider size limit; downscale it further before submitting")]
    RequestTooLarge,

    /// Provider returned a body that could not be decoded.
    #[error("Invalid recognition response: {0}")]
    InvalidResponse(String),

    /// Image could not be encoded for upload.
    #[error("Failed to encode image: {0}")]
    ImageEncoding(String),
}

/// Configuration for the recognition client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// API endpoint for text recognition.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Maximum pixels per side before downscaling kicks in.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// JPEG re-encode quality (0-100).
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.mathpix.com/v3/text".to_string()
}

fn default_max_dimension() -> u32 {
    // Tested limit; the provider accepts up to 4000x3000.
    3000
}

fn default_jpeg_quality() -> u8 {
    70
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RecognitionConfig {
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Seam between the pipeline and the recognition provider, also used to
/// inject mock recognizers in tests.
#[async_trait]
pub trait MathRecognizer: Send + Sync {
    /// Recognize math content in a single image.
    async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult, RecognitionError>;
}

/// Math recognition client for the Mathpix `v3/text` API.
pub struct MathpixClient {
    config: RecognitionConfig,
    credentials: Credentials,
    client: Client,
}

/// Request body for the text recognition endpoint.
#[derive(Debug, Serialize)]
struct MathpixRequest {
    src: String,
    formats: Vec<&'static str>,
    data_options: DataOptions,
}

#[derive(Debug, Serialize)]
struct DataOptions {
    include_asciimath: bool,
    include_latex: bool,
}

/// Error payload the provider can return, sometimes with HTTP 200.
#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: String,
}

impl MathpixClient {
    /// Create a new recognition client.
    pub fn new(config: RecognitionConfig, credentials: Credentials) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            credentials,
            client,
        }
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Downscale and encode the image, then build the request body.
    fn build_request(&self, image: &DynamicImage) -> Result<MathpixRequest, RecognitionError> {
        let prepared = downscale_if_needed(image.clone(), self.config.max_dimension);
        let jpeg = encode_jpeg(&prepared, self.config.jpeg_quality)?;
        debug!("Submitting {} byte image for recognition", jpeg.len());

        Ok(MathpixRequest {
            src: to_data_uri(&jpeg),
            formats: vec!["text", "latex_styled"],
            data_options: DataOptions {
                include_asciimath: true,
                include_latex: true,
            },
        })
    }
}

#[async_trait]
impl MathRecognizer for MathpixClient {
    async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult, RecognitionError> {
        let request = self.build_request(image)?;

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header("app_id", &self.credentials.mathpix_app_id)
            .header("app_key", &self.credentials.mathpix_app_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RecognitionError::Connection(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RecognitionError::Connection(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &body));
        }

        parse_success_body(&body)
    }
}

/// Classify a non-2xx response body into a typed error.
fn classify_failure(status: u16, body: &str) -> RecognitionError {
    if body.to_lowercase().contains(OVERSIZE_MARKER) {
        return RecognitionError::RequestTooLarge;
    }
    RecognitionError::Api {
        status,
        message: body.trim().to_string(),
    }
}

/// Decode a 2xx response body, accounting for error payloads the provider
/// returns with a success status.
fn parse_success_body(body: &str) -> Result<RecognitionResult, RecognitionError> {
    match serde_json::from_str::<RecognitionResult>(body) {
        Ok(result) => {
            debug!("Recognized math content: {}", result.best_content());
            Ok(result)
        }
        Err(decode_err) => {
            if let Ok(provider_err) = serde_json::from_str::<ProviderErrorBody>(body) {
                if provider_err.error.to_lowercase().contains(OVERSIZE_MARKER) {
                    return Err(RecognitionError::RequestTooLarge);
                }
                return Err(RecognitionError::Api {
                    status: 200,
                    message: provider_err.error,
                });
            }
            Err(RecognitionError::InvalidResponse(decode_err.to_string()))
        }
    }
}
