//! Best-effort repair of raw model output before structured parsing.
//!
//! The generation provider systematically wraps JSON in code fences and
//! double-applies JSON string escaping to LaTeX macros. The rules here target
//! only those observed failure patterns; this is not a general JSON or LaTeX
//! repair engine. Extend by adding rows to the repair table, not by adding
//! control flow.

/// Over-escaping repairs, applied in order. Four backslashes before a known
/// macro name collapse to two (JSON escaping applied twice by the model).
const ESCAPE_REPAIRS: &[(&str, &str)] = &[
    (r"\\\\text", r"\\text"),
    (r"\\\\frac", r"\\frac"),
    (r"\\\\int", r"\\int"),
    (r"\\\\sum", r"\\sum"),
    (r"\\\\lim", r"\\lim"),
];

/// Apply an ordered table of literal find/replace repairs.
fn apply_repairs(text: &str, repairs: &[(&str, &str)]) -> String {
    repairs
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            acc.replace(pattern, replacement)
        })
}

/// Strip a leading code-fence marker (optionally tagged with a language
/// identifier) and a trailing one, if present.
fn strip_code_fences(text: &str) -> &str {
    let mut stripped = text.trim();

    if let Some(rest) = stripped.strip_prefix("```") {
        stripped = match rest.find('\n') {
            // Tag (if any) occupies the rest of the fence line.
            Some(newline) => &rest[newline + 1..],
            // Single-line response: drop just the tag.
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }

    stripped = stripped.trim_end();
    if let Some(rest) = stripped.strip_suffix("```") {
        stripped = rest;
    }

    stripped.trim()
}

/// Collapse double spaces to single spaces.
pub(crate) fn collapse_double_spaces(text: &str) -> String {
    text.replace("  ", " ")
}

/// Normalize raw model output for structured parsing.
///
/// Always returns a best-effort cleaned string; parsing downstream may still
/// fail. Fence stripping runs before backslash repair since fences bracket
/// the content the repairs apply to.
pub fn normalize(raw: &str) -> String {
    let stripped = strip_code_fences(raw.trim());
    let repaired = apply_repairs(stripped, ESCAPE_REPAIRS);
    collapse_double_spaces(&repaired).trim().to_string()
}
