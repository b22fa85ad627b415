//! Flashcard generation pipeline.
//!
//! Sequences recognition of N images, prompt construction, one generation
//! call, normalization, and extraction into an ordered list of drafts. Any
//! stage failure aborts the whole run; there is no partial success and no
//! automatic retry. Progress is reported over an optional event channel so
//! front-ends can show per-stage state.

use futures::stream::{self, StreamExt};
use image::DynamicImage;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Credentials;
use crate::llm::{
    build_prompt, extract, normalize, CardGenerator, GenerationError, GroqClient, LlmConfig,
    ParseError,
};
use crate::models::{FlashcardDraft, GenerationRequest};
use crate::recognition::{MathRecognizer, MathpixClient, RecognitionConfig, RecognitionError};

/// Input problems caught before any network call. Always recoverable by the
/// caller correcting input; never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No images were provided")]
    NoImages,

    #[error("Instructions must not be empty")]
    EmptyInstructions,

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Failure of a pipeline run, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// How recognition calls are scheduled across images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionPolicy {
    /// One call at a time, in input order. Bounds provider load and keeps the
    /// image-to-text correlation deterministic without bookkeeping.
    #[default]
    Sequential,
    /// Up to n calls in flight. Results still land in input order.
    Bounded(usize),
}

/// Progress events emitted during a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Recognition phase started.
    RecognitionStarted { total: usize },
    /// One image finished recognition.
    ImageRecognized { index: usize, total: usize },
    /// Generation call in flight.
    Generating,
    /// Parsing the model's response.
    Extracting,
    /// Run finished with this many drafts.
    Complete { cards: usize },
}

/// The flashcard generation pipeline.
///
/// Owns no persistent state; each run is independent. Dropping the returned
/// future cancels the in-flight network call and abandons the run without
/// surfacing partial results.
pub struct FlashcardPipeline<R, G> {
    recognizer: R,
    generator: G,
    policy: RecognitionPolicy,
    prompt_template: Option<String>,
    events: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl FlashcardPipeline<MathpixClient, GroqClient> {
    /// Build a pipeline over the real providers, validating credentials
    /// before any client is constructed.
    pub fn from_credentials(
        recognition: RecognitionConfig,
        llm: LlmConfig,
        credentials: Credentials,
    ) -> Result<Self, ValidationError> {
        let missing = credentials.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingCredentials(missing.join(", ")));
        }

        let prompt_template = llm.prompt_template.clone();
        Ok(Self {
            recognizer: MathpixClient::new(recognition, credentials.clone()),
            generator: GroqClient::new(llm, credentials),
            policy: RecognitionPolicy::default(),
            prompt_template,
            events: None,
        })
    }
}

impl<R: MathRecognizer, G: CardGenerator> FlashcardPipeline<R, G> {
    /// Build a pipeline over arbitrary recognizer/generator implementations.
    pub fn new(recognizer: R, generator: G) -> Self {
        Self {
            recognizer,
            generator,
            policy: RecognitionPolicy::default(),
            prompt_template: None,
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: RecognitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prompt_template(mut self, template: &str) -> Self {
        self.prompt_template = Some(template.to_string());
        self
    }

    /// Attach a progress event channel.
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    /// Run the full pipeline: recognize every image, build the prompt,
    /// generate, normalize, and extract drafts.
    pub async fn run(
        &self,
        images: &[DynamicImage],
        instructions: &str,
        rigor: f64,
        quantity_hint: Option<u32>,
    ) -> Result<Vec<FlashcardDraft>, PipelineError> {
        if images.is_empty() {
            return Err(ValidationError::NoImages.into());
        }
        if instructions.trim().is_empty() {
            return Err(ValidationError::EmptyInstructions.into());
        }

        let sections = self.recognize_all(images).await?;
        let math_content = combine_sections(&sections);

        let request = GenerationRequest {
            math_content,
            instructions: instructions.to_string(),
            rigor,
            quantity_hint,
        };
        let prompt = build_prompt(self.prompt_template.as_deref(), &request);

        self.emit(PipelineEvent::Generating);
        let raw = self.generator.generate(&prompt).await?;

        self.emit(PipelineEvent::Extracting);
        let normalized = normalize(&raw);
        let drafts = match extract(&normalized) {
            Ok(drafts) => drafts,
            Err(err) => {
                // Keep both renditions around for diagnosing model quirks.
                warn!(%raw, %normalized, "Flashcard extraction failed");
                return Err(err.into());
            }
        };

        info!("Pipeline produced {} flashcard drafts", drafts.len());
        self.emit(PipelineEvent::Complete {
            cards: drafts.len(),
        });
        Ok(drafts)
    }

    /// Recognize all images, returning per-image math content in input order.
    ///
    /// Any single failure aborts the whole run: generating cards from a
    /// subset of the images would silently degrade quality.
    async fn recognize_all(
        &self,
        images: &[DynamicImage],
    ) -> Result<Vec<String>, RecognitionError> {
        let total = images.len();
        self.emit(PipelineEvent::RecognitionStarted { total });

        let mut sections = Vec::with_capacity(total);
        match self.policy {
            RecognitionPolicy::Sequential => {
                for (index, image) in images.iter().enumerate() {
                    let result = self.recognizer.recognize(image).await?;
                    sections.push(result.best_content().to_string());
                    self.emit(PipelineEvent::ImageRecognized {
                        index: index + 1,
                        total,
                    });
                }
            }
            RecognitionPolicy::Bounded(limit) => {
                // buffered() yields in input order regardless of completion
                // order, so the positional correlation survives.
                let mut results = stream::iter(images)
                    .map(|image| self.recognizer.recognize(image))
                    .buffered(limit.max(1));
                while let Some(result) = results.next().await {
                    sections.push(result?.best_content().to_string());
                    self.emit(PipelineEvent::ImageRecognized {
                        index: sections.len(),
                        total,
                    });
                }
            }
        }

        Ok(sections)
    }
}

/// Concatenate per-image content in input order. Positions are labeled when
/// there is more than one image so the model gets positional context without
/// correlating images itself.
fn combine_sections(sections: &[String]) -> String {
    match sections {
        [single] => single.clone(),
        _ => sections
            .iter()
            .enumerate()
            .map(|(i, content)| format!("Image {}: {}", i + 1, content))
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}
