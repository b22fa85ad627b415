//! Pipeline Integration Tests
//!
//! Exercises the full generation pipeline over mock recognizer/generator
//! implementations: ordering guarantees, fail-fast validation, stage error
//! propagation, and end-to-end draft extraction.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use tokio::time::sleep;

use mathdeck::config::Credentials;
use mathdeck::llm::{CardGenerator, GenerationError, LlmConfig};
use mathdeck::models::{FlashcardDraft, RecognitionResult};
use mathdeck::pipeline::{
    FlashcardPipeline, PipelineError, RecognitionPolicy, ValidationError,
};
use mathdeck::recognition::{MathRecognizer, MathpixClient, RecognitionConfig, RecognitionError};

/// Recognizer that answers based on image width, with later images answering
/// faster than earlier ones to expose any completion-order dependence.
struct StubRecognizer;

#[async_trait]
impl MathRecognizer for StubRecognizer {
    async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult, RecognitionError> {
        let width = image.width() as u64;
        // width 10 -> 60ms, width 20 -> 40ms, width 30 -> 20ms
        sleep(Duration::from_millis(80u64.saturating_sub(width * 2))).await;
        Ok(RecognitionResult {
            text: format!("plain-{width}"),
            latex_styled: Some(format!("styled-{width}")),
            confidence: Some(0.9),
        })
    }
}

/// Recognizer that fails for a specific image width.
struct FailingRecognizer {
    fail_width: u32,
    error: fn() -> RecognitionError,
}

#[async_trait]
impl MathRecognizer for FailingRecognizer {
    async fn recognize(&self, image: &DynamicImage) -> Result<RecognitionResult, RecognitionError> {
        if image.width() == self.fail_width {
            return Err((self.error)());
        }
        Ok(RecognitionResult {
            text: format!("plain-{}", image.width()),
            latex_styled: None,
            confidence: None,
        })
    }
}

/// Recognizer that returns fixed text for any image.
struct FixedRecognizer(&'static str);

#[async_trait]
impl MathRecognizer for FixedRecognizer {
    async fn recognize(&self, _image: &DynamicImage) -> Result<RecognitionResult, RecognitionError> {
        Ok(RecognitionResult {
            text: self.0.to_string(),
            latex_styled: None,
            confidence: None,
        })
    }
}

/// Generator that records every prompt it sees and returns a canned response.
#[derive(Clone)]
struct RecordingGenerator {
    prompts: Arc<Mutex<Vec<String>>>,
    response: Result<&'static str, fn() -> GenerationError>,
}

impl RecordingGenerator {
    fn replying(response: &'static str) -> Self {
        Self {
            prompts: Arc::new(Mutex::new(Vec::new())),
            response: Ok(response),
        }
    }

    fn failing(error: fn() -> GenerationError) -> Self {
        Self {
            prompts: Arc::new(Mutex::new(Vec::new())),
            response: Err(error),
        }
    }

    fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CardGenerator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.response {
            Ok(text) => Ok(text.to_string()),
            Err(error) => Err(error()),
        }
    }
}

fn images_of_widths(widths: &[u32]) -> Vec<DynamicImage> {
    widths
        .iter()
        .map(|&w| DynamicImage::new_rgb8(w, 8))
        .collect()
}

#[tokio::test]
async fn sequential_recognition_preserves_input_order() {
    let generator = RecordingGenerator::replying("[]");
    let pipeline = FlashcardPipeline::new(StubRecognizer, generator.clone());

    let images = images_of_widths(&[10, 20, 30]);
    let drafts = pipeline.run(&images, "cover it", 0.5, None).await.unwrap();
    assert!(drafts.is_empty());

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Image 1: styled-10\n\nImage 2: styled-20\n\nImage 3: styled-30"));
}

#[tokio::test]
async fn bounded_recognition_still_preserves_input_order() {
    // Later images complete first; order must come from input position.
    let generator = RecordingGenerator::replying("[]");
    let pipeline = FlashcardPipeline::new(StubRecognizer, generator.clone())
        .with_policy(RecognitionPolicy::Bounded(3));

    let images = images_of_widths(&[10, 20, 30]);
    pipeline.run(&images, "cover it", 0.5, None).await.unwrap();

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Image 1: styled-10\n\nImage 2: styled-20\n\nImage 3: styled-30"));
}

#[tokio::test]
async fn single_image_content_is_not_position_labeled() {
    let generator = RecordingGenerator::replying("[]");
    let pipeline = FlashcardPipeline::new(FixedRecognizer("x^2"), generator.clone());

    let images = images_of_widths(&[10]);
    pipeline.run(&images, "cover it", 0.5, None).await.unwrap();

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("x^2"));
    assert!(!prompt.contains("Image 1:"));
}

#[tokio::test]
async fn no_images_fails_before_any_call() {
    let generator = RecordingGenerator::replying("[]");
    let pipeline = FlashcardPipeline::new(StubRecognizer, generator.clone());

    let err = pipeline.run(&[], "cover it", 0.5, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::NoImages)
    ));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn empty_instructions_fail_fast() {
    let generator = RecordingGenerator::replying("[]");
    let pipeline = FlashcardPipeline::new(StubRecognizer, generator.clone());

    let images = images_of_widths(&[10]);
    let err = pipeline.run(&images, "   ", 0.5, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::EmptyInstructions)
    ));
    assert_eq!(generator.call_count(), 0);
}

#[test]
fn missing_credentials_are_rejected_at_construction() {
    let err = FlashcardPipeline::from_credentials(
        RecognitionConfig::default(),
        LlmConfig::default(),
        Credentials::default(),
    )
    .err()
    .unwrap();

    match err {
        ValidationError::MissingCredentials(names) => {
            assert!(names.contains("mathpix_app_id"));
            assert!(names.contains("groq_api_key"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn recognition_failure_aborts_the_whole_run() {
    let generator = RecordingGenerator::replying("[]");
    let recognizer = FailingRecognizer {
        fail_width: 20,
        error: || RecognitionError::Api {
            status: 500,
            message: "upstream".to_string(),
        },
    };
    let pipeline = FlashcardPipeline::new(recognizer, generator.clone());

    let images = images_of_widths(&[10, 20, 30]);
    let err = pipeline.run(&images, "cover it", 0.5, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Recognition(RecognitionError::Api { status: 500, .. })
    ));
    // No partial-credit generation from the images that succeeded.
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn oversize_rejection_surfaces_as_the_oversize_kind() {
    let generator = RecordingGenerator::replying("[]");
    let recognizer = FailingRecognizer {
        fail_width: 10,
        error: || RecognitionError::RequestTooLarge,
    };
    let pipeline = FlashcardPipeline::new(recognizer, generator);

    let images = images_of_widths(&[10]);
    let err = pipeline.run(&images, "cover it", 0.5, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Recognition(RecognitionError::RequestTooLarge)
    ));
}

#[tokio::test]
async fn missing_generation_content_surfaces_as_no_content() {
    let generator = RecordingGenerator::failing(|| GenerationError::NoContent);
    let pipeline = FlashcardPipeline::new(FixedRecognizer("x^2"), generator);

    let images = images_of_widths(&[10]);
    let err = pipeline.run(&images, "cover it", 0.5, None).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Generation(GenerationError::NoContent)
    ));
}

#[tokio::test]
async fn fenced_response_yields_the_expected_draft() {
    let generator = RecordingGenerator::replying(
        "```json\n[{\"front\":\"x^2+2x+1=0\",\"back\":\"(x+1)^2=0\",\"isLatex\":true}]\n```",
    );
    let pipeline = FlashcardPipeline::new(FixedRecognizer("x^2+2x+1=0"), generator);

    let images = images_of_widths(&[10]);
    let drafts = pipeline.run(&images, "solve it", 0.5, None).await.unwrap();

    assert_eq!(
        drafts,
        vec![FlashcardDraft {
            front: "x^2+2x+1=0".to_string(),
            back: "(x+1)^2=0".to_string(),
            is_latex: true,
        }]
    );
}

#[tokio::test]
async fn unsupported_macros_are_rewritten_in_extracted_drafts() {
    let generator = RecordingGenerator::replying(
        r#"[{"front":"p \\implies q","back":"1, 2, \\dots, n"}]"#,
    );
    let pipeline = FlashcardPipeline::new(FixedRecognizer("p => q"), generator);

    let images = images_of_widths(&[10]);
    let drafts = pipeline.run(&images, "cover it", 0.5, None).await.unwrap();

    assert_eq!(drafts[0].front, r"p \Rightarrow q");
    assert_eq!(drafts[0].back, r"1, 2, \cdots, n");
    assert!(drafts[0].is_latex);
}

#[tokio::test]
async fn malformed_response_is_a_parse_error() {
    let generator = RecordingGenerator::replying(r#"[{"front":"a","back":"b"},"#);
    let pipeline = FlashcardPipeline::new(FixedRecognizer("x"), generator);

    let images = images_of_widths(&[10]);
    let err = pipeline.run(&images, "cover it", 0.5, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
}

#[tokio::test]
async fn quantity_and_rigor_steering_reach_the_prompt() {
    let generator = RecordingGenerator::replying("[]");
    let pipeline = FlashcardPipeline::new(FixedRecognizer("x"), generator.clone());

    let images = images_of_widths(&[10]);
    pipeline
        .run(&images, "focus on limits", 0.9, Some(6))
        .await
        .unwrap();

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("focus on limits"));
    assert!(prompt.contains("approximately 6 cards"));
    assert!(prompt.contains("exam-level phrasing"));
}

// MathpixClient satisfies the recognizer seam the orchestrator consumes.
#[test]
fn mathpix_client_is_a_math_recognizer() {
    fn assert_recognizer<R: MathRecognizer>(_r: &R) {}
    let client = MathpixClient::new(RecognitionConfig::default(), Credentials::default());
    assert_recognizer(&client);
}
