//! Prompt construction for flashcard generation.
//!
//! Pure text assembly: recognized math content and user instructions are
//! interpolated into a fixed template whose output contract pins the model to
//! a bare JSON array of `{front, back, isLatex}` objects. Rigor and quantity
//! steering are soft hints appended to the instructions; the model is not
//! guaranteed to obey them.

use crate::models::GenerationRequest;

/// Default generation prompt. `{math_content}` and `{user_instructions}` are
/// replaced at build time.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are an assistant that creates math flashcards for exam revision.

From the LaTeX content below and the user's instructions, produce a set of flashcards.

Respond with ONLY a JSON array, no prose and no code fences. Each element must be an object with exactly these fields:
- "front": the question side (LaTeX allowed)
- "back": the answer side (LaTeX allowed)
- "isLatex": true if front/back contain LaTeX, false otherwise

LaTeX content:
{math_content}

Instructions:
{user_instructions}"#;

/// Substituted when the caller provides no usable instructions.
pub const DEFAULT_INSTRUCTIONS: &str =
    "Create flashcards covering the key definitions, results, and techniques in this content.";

/// Build the full prompt for one generation call.
///
/// `template` falls back to [`DEFAULT_PROMPT_TEMPLATE`] when `None`.
/// Interpolation is best-effort replacement; a custom template missing a
/// placeholder is used as-is.
pub fn build_prompt(template: Option<&str>, request: &GenerationRequest) -> String {
    let template = template.unwrap_or(DEFAULT_PROMPT_TEMPLATE);

    let mut instructions = if request.instructions.trim().is_empty() {
        DEFAULT_INSTRUCTIONS.to_string()
    } else {
        request.instructions.trim().to_string()
    };

    if let Some(count) = request.quantity_hint {
        instructions.push_str(&format!(" Aim for approximately {count} cards."));
    }

    let rigor = request.rigor.clamp(0.0, 1.0);
    if rigor >= 0.5 {
        instructions.push_str(" Favor precise, exam-level phrasing.");
    } else {
        instructions.push_str(" Favor intuitive explanations over formal rigor.");
    }

    template
        .replace("{math_content}", &request.math_content)
        .replace("{user_instructions}", &instructions)
}
