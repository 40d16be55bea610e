// ─────────────────────────────────────────────────────────────────────
// Minicode — Request, Verdict & Outcome Types
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown when the engine declines a request via its sentinel.
pub const TOO_COMPLEX_MESSAGE: &str =
    "The request is too complex or unclear. Try a smaller, more specific instruction.";

/// Message shown when the safety monitor cuts a generation short.
pub const SAFETY_STOP_MESSAGE: &str =
    "Generation stopped: the output was repeating or exceeded its limits.";

/// Optional style line appended to the prompt after the instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleDirective {
    /// Prefer camelCase identifiers.
    CamelCase,
    /// Target language of the working file.
    Language(String),
    /// Free-form directive, emitted verbatim.
    Custom(String),
}

impl StyleDirective {
    /// Render as a single prompt line (no trailing newline).
    pub fn render(&self) -> String {
        match self {
            StyleDirective::CamelCase => "Use camelCase for identifiers.".to_string(),
            StyleDirective::Language(lang) => format!("Target language: {lang}."),
            StyleDirective::Custom(text) => text.trim().to_string(),
        }
    }
}

/// One generation request. Moved into the session on start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// What the engine should do. Must be non-blank.
    pub instruction: String,
    /// Style lines, rendered in order.
    pub directives: Vec<StyleDirective>,
    /// Current working content; truncated to fit the input budget.
    pub context: String,
}

impl GenerationRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Default::default()
        }
    }

    pub fn with_directive(mut self, directive: StyleDirective) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Per-fragment decision of the safety monitor.
///
/// Checks run in declaration order; the first violated one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyVerdict {
    Continue,
    StopCharLimit,
    StopTimeLimit,
    StopLineRepetition,
    StopTokenRepetition,
}

impl SafetyVerdict {
    pub fn is_stop(self) -> bool {
        self != SafetyVerdict::Continue
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyVerdict::Continue => "continue",
            SafetyVerdict::StopCharLimit => "char_limit",
            SafetyVerdict::StopTimeLimit => "time_limit",
            SafetyVerdict::StopLineRepetition => "line_repetition",
            SafetyVerdict::StopTokenRepetition => "token_repetition",
        }
    }
}

/// Why a session's cancellation flag was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SafetyLimit,
    UserCancelled,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::SafetyLimit => "safety_limit",
            StopReason::UserCancelled => "user_cancelled",
        }
    }
}

/// Precondition failure reported before any engine work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("generation already in progress")]
    GenerationInProgress,

    #[error("input too long")]
    InputTooLong,

    #[error("file too large to process")]
    ContextTooLarge,

    #[error("instruction is empty")]
    EmptyInstruction,
}

/// Lifecycle of a generation session. The last four states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Stopped,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed
                | SessionState::Stopped
                | SessionState::Cancelled
                | SessionState::Failed
        )
    }
}

/// Terminal outcome of one `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GenerationResult {
    /// Trimmed engine output.
    Success(String),
    /// The engine declined via its sentinel.
    TooComplex,
    /// The safety monitor stopped the session.
    SafetyLimitStopped(SafetyVerdict),
    /// The caller cancelled.
    Cancelled,
    /// A precondition failed; no session was created.
    Rejected(RejectReason),
    /// The adapter reported a fault.
    EngineFailure(String),
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    /// Output text, only on success.
    pub fn output(&self) -> Option<&str> {
        match self {
            GenerationResult::Success(text) => Some(text),
            _ => None,
        }
    }

    /// Text to surface to the user, or `None` when nothing should be
    /// shown (success, user cancellation).
    pub fn user_message(&self) -> Option<String> {
        match self {
            GenerationResult::Success(_) | GenerationResult::Cancelled => None,
            GenerationResult::TooComplex => Some(TOO_COMPLEX_MESSAGE.to_string()),
            GenerationResult::SafetyLimitStopped(_) => Some(SAFETY_STOP_MESSAGE.to_string()),
            GenerationResult::Rejected(reason) => Some(capitalize(&reason.to_string())),
            GenerationResult::EngineFailure(msg) if msg.trim().is_empty() => {
                Some("Generation failed".to_string())
            }
            GenerationResult::EngineFailure(msg) => Some(msg.clone()),
        }
    }
}

impl From<RejectReason> for GenerationResult {
    fn from(reason: RejectReason) -> Self {
        GenerationResult::Rejected(reason)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_render() {
        assert_eq!(
            StyleDirective::CamelCase.render(),
            "Use camelCase for identifiers."
        );
        assert_eq!(
            StyleDirective::Language("Python".into()).render(),
            "Target language: Python."
        );
        assert_eq!(
            StyleDirective::Custom("  Keep it short.\n".into()).render(),
            "Keep it short."
        );
    }

    #[test]
    fn test_request_builder() {
        let req = GenerationRequest::new("fix bug")
            .with_directive(StyleDirective::CamelCase)
            .with_context("let x = 1;");
        assert_eq!(req.instruction, "fix bug");
        assert_eq!(req.directives.len(), 1);
        assert_eq!(req.context, "let x = 1;");
    }

    #[test]
    fn test_verdict_is_stop() {
        assert!(!SafetyVerdict::Continue.is_stop());
        assert!(SafetyVerdict::StopCharLimit.is_stop());
        assert!(SafetyVerdict::StopTokenRepetition.is_stop());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Running.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed.is_terminal());
    }

    #[test]
    fn test_cancelled_has_no_user_message() {
        assert_eq!(GenerationResult::Cancelled.user_message(), None);
        assert_eq!(GenerationResult::Success("x".into()).user_message(), None);
    }

    #[test]
    fn test_too_complex_message_is_fixed() {
        assert_eq!(
            GenerationResult::TooComplex.user_message().as_deref(),
            Some(TOO_COMPLEX_MESSAGE)
        );
    }

    #[test]
    fn test_rejected_message() {
        let result: GenerationResult = RejectReason::ModelNotLoaded.into();
        assert_eq!(result.user_message().as_deref(), Some("Model not loaded"));
    }

    #[test]
    fn test_engine_failure_surfaces_message() {
        let result = GenerationResult::EngineFailure("context overflow".into());
        assert_eq!(result.user_message().as_deref(), Some("context overflow"));
        let blank = GenerationResult::EngineFailure(String::new());
        assert_eq!(blank.user_message().as_deref(), Some("Generation failed"));
    }

    #[test]
    fn test_result_serializes_tagged() {
        let json =
            serde_json::to_string(&GenerationResult::SafetyLimitStopped(SafetyVerdict::StopTimeLimit))
                .unwrap();
        assert_eq!(json, r#"{"kind":"safety_limit_stopped","detail":"stop_time_limit"}"#);
    }
}
