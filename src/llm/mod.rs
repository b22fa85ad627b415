//! Chat-completion client for flashcard generation.
//!
//! Talks to an OpenAI-compatible endpoint (Groq by default). One call per
//! pipeline run: a single user-role message carrying the full prompt, no
//! streaming, no retries.

mod config;
pub mod extract;
pub mod prompts;
pub mod repair;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::Credentials;

pub use config::LlmConfig;
pub use extract::{extract, ParseError};
pub use prompts::{build_prompt, DEFAULT_INSTRUCTIONS, DEFAULT_PROMPT_TEMPLATE};
pub use repair::normalize;

/// Errors that can occur during card generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Failed to reach the generation provider.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Provider returned an error status.
    #[error("Generation API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider returned a success envelope with no usable content.
    #[error("No content in generation response")]
    NoContent,

    /// Provider returned a body that could not be decoded.
    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

/// Seam between the pipeline and the generation provider, also used to
/// inject mock generators in tests.
#[async_trait]
pub trait CardGenerator: Send + Sync {
    /// Run one chat completion and return the raw assistant text.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Chat-completion request format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat-completion response envelope.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Generation client for an OpenAI-compatible chat-completion API.
pub struct GroqClient {
    config: LlmConfig,
    credentials: Credentials,
    client: Client,
}

impl GroqClient {
    /// Create a new generation client.
    pub fn new(config: LlmConfig, credentials: Credentials) -> Self {
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

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl CardGenerator for GroqClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("Requesting completion from {}", self.config.model);
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.credentials.groq_api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        parse_chat_body(&body)
    }
}

/// Extract the assistant's text from a 2xx chat-completion body.
fn parse_chat_body(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

    let content = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(GenerationError::NoContent);
    }

    debug!("Received {} chars of completion text", content.len());
    Ok(content)
}
