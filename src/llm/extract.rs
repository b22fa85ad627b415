//! Structured extraction of flashcard drafts from normalized model output.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::repair::collapse_double_spaces;
use crate::models::FlashcardDraft;

/// Macro substitutions applied to every extracted front/back value. The
/// on-device renderer does not support these macros, but the model keeps
/// emitting them.
const MACRO_SUBSTITUTIONS: &[(&str, &str)] = &[
    (r"\implies", r"\Rightarrow"),
    (r"\dots", r"\cdots"),
];

/// Errors from structured extraction.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Text is not a valid JSON array of card objects. Carries the offending
    /// text for diagnostics.
    #[error("Model output is not a valid flashcard array: {source}")]
    InvalidJson {
        source: serde_json::Error,
        text: String,
    },

    /// A card came back with an empty front or back after cleanup.
    #[error("Card {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
}

/// Wire shape of one card in the model's output array.
#[derive(Debug, Deserialize)]
struct CardJson {
    front: String,
    back: String,
    #[serde(rename = "isLatex")]
    is_latex: Option<bool>,
}

/// Clean one side of a card: substitute unsupported macros, collapse double
/// spaces, trim.
fn clean_content(content: &str) -> String {
    let substituted = MACRO_SUBSTITUTIONS
        .iter()
        .fold(content.to_string(), |acc, (pattern, replacement)| {
            acc.replace(pattern, replacement)
        });
    collapse_double_spaces(&substituted).trim().to_string()
}

/// Parse normalized model output into validated flashcard drafts.
///
/// An empty array is a valid zero-draft result. `isLatex` defaults to true
/// when the model omits it: recognized math content is assumed to be LaTeX
/// unless stated otherwise.
pub fn extract(normalized: &str) -> Result<Vec<FlashcardDraft>, ParseError> {
    let cards: Vec<CardJson> =
        serde_json::from_str(normalized).map_err(|source| ParseError::InvalidJson {
            source,
            text: normalized.to_string(),
        })?;

    let mut drafts = Vec::with_capacity(cards.len());
    for (index, card) in cards.into_iter().enumerate() {
        let front = clean_content(&card.front);
        if front.is_empty() {
            return Err(ParseError::EmptyField {
                index,
                field: "front",
            });
        }
        let back = clean_content(&card.back);
        if back.is_empty() {
            return Err(ParseError::EmptyField {
                index,
                field: "back",
            });
        }
        drafts.push(FlashcardDraft {
            front,
            back,
            is_latex: card.is_latex.unwrap_or(true),
        });
    }

    debug!("Extracted {} flashcard drafts", drafts.len());
    Ok(drafts)
}
