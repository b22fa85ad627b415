//! Flashcard drafts and the intermediate values that produce them.
//!
//! A draft carries only the content fields the pipeline is responsible for.
//! Identity, review statistics, and persistence belong to the consuming deck
//! store and are assigned after the draft leaves the pipeline.

use serde::{Deserialize, Serialize};

/// Result of recognizing math content in a single image.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionResult {
    /// Plain-text rendition of the recognized content.
    pub text: String,
    /// Semantic LaTeX rendition, when the provider produced one.
    pub latex_styled: Option<String>,
    /// Provider confidence score, when reported.
    pub confidence: Option<f64>,
}

impl RecognitionResult {
    /// The canonical math representation for this image: styled LaTeX when
    /// available, plain text otherwise.
    pub fn best_content(&self) -> &str {
        self.latex_styled.as_deref().unwrap_or(&self.text)
    }
}

/// Parameters for one generation call, built once per pipeline run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Recognized math content from all images, concatenated in input order.
    pub math_content: String,
    /// Free-text user instructions for the model.
    pub instructions: String,
    /// Steering between intuitive (0.0) and exam-level rigorous (1.0) cards.
    pub rigor: f64,
    /// Approximate number of cards to aim for, if the caller has a preference.
    pub quantity_hint: Option<u32>,
}

/// A generated flashcard, validated but not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashcardDraft {
    /// Question side. Non-empty after trimming.
    pub front: String,
    /// Answer side. Non-empty after trimming.
    pub back: String,
    /// Whether front/back contain LaTeX. Defaults to true: recognized math
    /// content is assumed to be LaTeX unless the model says otherwise.
    #[serde(rename = "isLatex")]
    pub is_latex: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_content_prefers_styled_latex() {
        let result = RecognitionResult {
            text: "x^2".to_string(),
            latex_styled: Some("x^{2}".to_string()),
            confidence: Some(0.98),
        };
        assert_eq!(result.best_content(), "x^{2}");
    }

    #[test]
    fn best_content_falls_back_to_text() {
        let result = RecognitionResult {
            text: "x^2".to_string(),
            latex_styled: None,
            confidence: None,
        };
        assert_eq!(result.best_content(), "x^2");
    }

    #[test]
    fn draft_serializes_with_provider_field_names() {
        let draft = FlashcardDraft {
            front: "a".to_string(),
            back: "b".to_string(),
            is_latex: false,
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["isLatex"], serde_json::Value::Bool(false));
    }
}
