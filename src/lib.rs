//! mathdeck - math flashcard generation from photos.
//!
//! A two-stage pipeline: photos of mathematical notation go through a math
//! OCR provider, and the recognized LaTeX is fed to an LLM prompted to emit
//! flashcards as a JSON array, which is repaired and parsed into validated
//! drafts.

pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod recognition;
