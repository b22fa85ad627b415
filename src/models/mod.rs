//! Domain models for the flashcard generation pipeline.

mod card;

pub use card::{FlashcardDraft, GenerationRequest, RecognitionResult};
