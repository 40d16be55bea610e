// ─────────────────────────────────────────────────────────────────────
// Minicode — Prompt Builder
// ─────────────────────────────────────────────────────────────────────
//! Bounded prompt assembly.
//!
//! Layout, in fixed order:
//!
//! ```text
//! <system preamble>
//!
//! Instruction: <instruction>
//!
//! <one line per style directive>
//! Current content:
//! <as much context as fits>[\n...]
//! ```
//!
//! Everything up to `Current content:\n` is the fixed portion and is never
//! truncated. All lengths are counted in `char`s.

use minicode_types::{GenerationRequest, MinicodeError, MinicodeResult, StyleDirective};

/// String the engine emits, alone, to decline a task.
pub const TOO_COMPLEX_SENTINEL: &str = "ERROR_TOO_COMPLEX";

/// Appended after a truncated context.
pub const TRUNCATION_MARKER: &str = "\n...";

/// Default system preamble for single-file code edits.
pub const SYSTEM_PREAMBLE: &str = "\
You are Minicode, an offline AI codewriter.

Rules:
Output ONLY full valid file content.
No explanations.
No markdown.
No commentary.

Work on ONE file only.
Do not modify architecture unless explicitly requested.
Do not add extra features.
Do not refactor unless requested.

If task is unclear or too complex:
Output EXACTLY: ERROR_TOO_COMPLEX

The token ERROR_TOO_COMPLEX must never appear inside valid code.";

/// Assemble a prompt of at most `max_chars` characters.
///
/// Fails with `InputTooLong` when the fixed portion alone exceeds the
/// budget, or when truncation is needed but not even the marker fits.
pub fn build_prompt(
    preamble: &str,
    instruction: &str,
    directives: &[StyleDirective],
    context: &str,
    max_chars: usize,
) -> MinicodeResult<String> {
    let mut prompt = String::with_capacity(max_chars);
    prompt.push_str(preamble);
    prompt.push_str("\n\nInstruction: ");
    prompt.push_str(instruction);
    prompt.push_str("\n\n");
    for directive in directives {
        prompt.push_str(&directive.render());
        prompt.push('\n');
    }
    prompt.push_str("Current content:\n");

    let fixed_len = prompt.chars().count();
    if fixed_len > max_chars {
        return Err(MinicodeError::InputTooLong {
            len: fixed_len,
            max: max_chars,
        });
    }

    let remaining = max_chars - fixed_len;
    let context_len = context.chars().count();
    if context_len <= remaining {
        prompt.push_str(context);
        return Ok(prompt);
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if remaining < marker_len {
        return Err(MinicodeError::InputTooLong {
            len: fixed_len + context_len,
            max: max_chars,
        });
    }

    let keep = remaining - marker_len;
    let cut = context
        .char_indices()
        .nth(keep)
        .map_or(context.len(), |(idx, _)| idx);
    log::debug!("context truncated from {context_len} to {keep} chars");
    prompt.push_str(&context[..cut]);
    prompt.push_str(TRUNCATION_MARKER);
    Ok(prompt)
}

/// Prompt builder bound to a preamble and an input budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    preamble: String,
    max_chars: usize,
}

impl PromptBuilder {
    pub fn new(preamble: impl Into<String>, max_chars: usize) -> Self {
        Self {
            preamble: preamble.into(),
            max_chars,
        }
    }

    pub fn build(&self, request: &GenerationRequest) -> MinicodeResult<String> {
        build_prompt(
            &self.preamble,
            request.instruction.trim(),
            &request.directives,
            &request.context,
            self.max_chars,
        )
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(SYSTEM_PREAMBLE, 2000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_without_truncation() {
        let prompt = build_prompt(
            "SYS",
            "fix bug",
            &[StyleDirective::CamelCase],
            "let a = 1;",
            2000,
        )
        .unwrap();
        assert_eq!(
            prompt,
            "SYS\n\nInstruction: fix bug\n\nUse camelCase for identifiers.\nCurrent content:\nlet a = 1;"
        );
    }

    #[test]
    fn test_layout_without_directives() {
        let prompt = build_prompt("SYS", "fix bug", &[], "", 2000).unwrap();
        assert_eq!(prompt, "SYS\n\nInstruction: fix bug\n\nCurrent content:\n");
    }

    #[test]
    fn test_truncates_long_context() {
        let context = "x".repeat(5000);
        let prompt = build_prompt(SYSTEM_PREAMBLE, "fix bug", &[], &context, 2000).unwrap();
        assert!(prompt.chars().count() <= 2000);
        assert!(prompt.ends_with(TRUNCATION_MARKER));
        assert!(prompt.starts_with(SYSTEM_PREAMBLE));
        assert!(prompt.contains("\n\nInstruction: fix bug\n\n"));
    }

    #[test]
    fn test_truncation_fills_budget_exactly() {
        let context = "y".repeat(500);
        let prompt = build_prompt("P", "go", &[], &context, 100).unwrap();
        assert_eq!(prompt.chars().count(), 100);
    }

    #[test]
    fn test_exact_fit_is_not_truncated() {
        let fixed = build_prompt("P", "go", &[], "", 1000).unwrap();
        let room = 60 - fixed.chars().count();
        let context = "z".repeat(room);
        let prompt = build_prompt("P", "go", &[], &context, 60).unwrap();
        assert_eq!(prompt.chars().count(), 60);
        assert!(!prompt.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_fixed_portion_over_budget_rejected() {
        let instruction = "do it ".repeat(100);
        let err = build_prompt("P", &instruction, &[], "", 50).unwrap_err();
        assert!(matches!(err, MinicodeError::InputTooLong { max: 50, .. }));
    }

    #[test]
    fn test_no_room_for_marker_rejected() {
        let fixed = build_prompt("P", "go", &[], "", 1000).unwrap();
        let max = fixed.chars().count() + 2;
        let err = build_prompt("P", "go", &[], "abcdef", max).unwrap_err();
        assert!(matches!(err, MinicodeError::InputTooLong { .. }));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let context = "é".repeat(300);
        let prompt = build_prompt("P", "go", &[], &context, 120).unwrap();
        assert_eq!(prompt.chars().count(), 120);
        assert!(prompt.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_builder_trims_instruction() {
        let builder = PromptBuilder::new("P", 500);
        let prompt = builder
            .build(&GenerationRequest::new("  add tests \n"))
            .unwrap();
        assert!(prompt.contains("Instruction: add tests\n\n"));
    }

    #[test]
    fn test_preamble_mentions_sentinel() {
        assert!(SYSTEM_PREAMBLE.contains(TOO_COMPLEX_SENTINEL));
    }
}
