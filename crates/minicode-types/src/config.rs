// ─────────────────────────────────────────────────────────────────────
// Minicode — Prompt Budget & Sampling Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{MinicodeError, MinicodeResult};

/// Hard limits applied to one generation session.
///
/// Input limits are enforced by the prompt builder before the engine is
/// invoked; output limits and repetition thresholds are enforced per
/// fragment by the safety monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptBudget {
    /// Maximum prompt length in characters, fixed part included.
    /// Default: 2000.
    pub max_input_chars: usize,

    /// Token ceiling handed to the engine as `SamplingParams::max_tokens`.
    /// Default: 900.
    pub max_output_tokens: u32,

    /// Session stops once the accumulated output reaches this many chars.
    /// Default: 20000.
    pub max_output_chars: usize,

    /// Session stops once this much wall-clock time has elapsed.
    /// Default: 30000.
    pub max_generation_ms: u64,

    /// Consecutive identical non-blank completed lines that stop a session.
    /// Default: 3.
    pub line_repeat_threshold: usize,

    /// Shortest repeated fragment sequence that stops a session.
    /// Default: 10.
    pub token_repeat_min_len: usize,

    /// Number of recent fragments kept for sequence-repeat detection.
    /// Default: 50.
    pub token_lookback_window: usize,

    /// Working content longer than this is refused outright.
    /// Default: 15000.
    pub max_context_chars: usize,

    /// Working content with this many newlines or more is refused outright.
    /// Default: 600.
    pub max_context_lines: usize,
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            max_input_chars: 2000,
            max_output_tokens: 900,
            max_output_chars: 20_000,
            max_generation_ms: 30_000,
            line_repeat_threshold: 3,
            token_repeat_min_len: 10,
            token_lookback_window: 50,
            max_context_chars: 15_000,
            max_context_lines: 600,
        }
    }
}

impl PromptBudget {
    /// Validate configuration parameters.
    pub fn validate(&self) -> MinicodeResult<()> {
        if self.max_input_chars == 0 {
            return Err(MinicodeError::Config(
                "max_input_chars must be > 0".to_string(),
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(MinicodeError::Config(
                "max_output_tokens must be > 0".to_string(),
            ));
        }
        if self.max_output_chars == 0 {
            return Err(MinicodeError::Config(
                "max_output_chars must be > 0".to_string(),
            ));
        }
        if self.max_generation_ms == 0 {
            return Err(MinicodeError::Config(
                "max_generation_ms must be > 0".to_string(),
            ));
        }
        if self.line_repeat_threshold < 2 {
            return Err(MinicodeError::Config(format!(
                "line_repeat_threshold must be >= 2, got {}",
                self.line_repeat_threshold
            )));
        }
        if self.token_repeat_min_len == 0 {
            return Err(MinicodeError::Config(
                "token_repeat_min_len must be >= 1".to_string(),
            ));
        }
        if self.token_lookback_window < 2 * self.token_repeat_min_len {
            return Err(MinicodeError::Config(format!(
                "token_lookback_window must be >= 2 * token_repeat_min_len ({}), got {}",
                2 * self.token_repeat_min_len,
                self.token_lookback_window
            )));
        }
        Ok(())
    }

    /// Load from JSON string. Missing fields take their default values.
    pub fn from_json(json: &str) -> MinicodeResult<Self> {
        let budget: Self = serde_json::from_str(json)
            .map_err(|e| MinicodeError::Config(format!("JSON parse error: {e}")))?;
        log::debug!("prompt budget loaded: {budget:?}");
        Ok(budget)
    }
}

/// Engine sampling parameters.
///
/// Passed through to the model adapter unmodified; nothing in the
/// controller interprets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub repeat_window: u32,
    pub seed: u32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 40,
            top_p: 0.9,
            repeat_penalty: 1.1,
            repeat_window: 64,
            seed: 42,
            max_tokens: 900,
        }
    }
}
