// ─────────────────────────────────────────────────────────────────────
// Minicode — Safety Monitor (Repetition & Resource Gate)
// ─────────────────────────────────────────────────────────────────────
//! Per-session detector that inspects every emitted fragment and decides
//! whether generation may continue.
//!
//! Four checks, evaluated in a fixed order; the first violated one is
//! the reported verdict:
//!
//! 1. **Char limit**: accumulated output reached `max_output_chars`.
//! 2. **Time limit**: elapsed time reached `max_generation_ms`.
//! 3. **Line repetition**: the same non-blank line completed
//!    `line_repeat_threshold` times in a row.
//! 4. **Token repetition**: the most recent `k` fragments equal the `k`
//!    fragments just before them, for some `k` in
//!    `token_repeat_min_len..=min(window / 2, buffered / 2)`.
//!
//! All detector state lives in the `SafetyMonitor` value; nothing is
//! captured or shared.

use std::collections::VecDeque;

use minicode_types::{PromptBudget, SafetyVerdict};

/// Stateful repetition and resource detector for one session.
#[derive(Debug, Clone)]
pub struct SafetyMonitor {
    max_output_chars: usize,
    max_generation_ms: u64,
    line_repeat_threshold: usize,
    token_repeat_min_len: usize,
    token_lookback_window: usize,

    /// Byte offset where the in-progress line starts.
    line_start: usize,
    /// Last non-blank completed line, trimmed.
    last_line: Option<String>,
    /// Consecutive completions of `last_line`.
    line_repeats: usize,

    recent: VecDeque<String>,
    observed: u64,
}

impl SafetyMonitor {
    pub fn new(budget: &PromptBudget) -> Self {
        Self {
            max_output_chars: budget.max_output_chars,
            max_generation_ms: budget.max_generation_ms,
            line_repeat_threshold: budget.line_repeat_threshold,
            token_repeat_min_len: budget.token_repeat_min_len.max(1),
            token_lookback_window: budget.token_lookback_window,
            line_start: 0,
            last_line: None,
            line_repeats: 0,
            recent: VecDeque::with_capacity(budget.token_lookback_window + 1),
            observed: 0,
        }
    }

    /// Inspect one fragment.
    ///
    /// `accumulated` must already end with `fragment`. Call once per
    /// fragment, in emission order.
    pub fn observe(&mut self, accumulated: &str, fragment: &str, elapsed_ms: u64) -> SafetyVerdict {
        self.observed += 1;

        // Both detectors see every fragment, even when an earlier check fires.
        let line_hit = self.track_lines(accumulated);
        let token_hit = self.track_fragment(fragment);

        if exceeds_chars(accumulated, self.max_output_chars) {
            SafetyVerdict::StopCharLimit
        } else if elapsed_ms >= self.max_generation_ms {
            SafetyVerdict::StopTimeLimit
        } else if line_hit {
            SafetyVerdict::StopLineRepetition
        } else if token_hit {
            SafetyVerdict::StopTokenRepetition
        } else {
            SafetyVerdict::Continue
        }
    }

    /// Consume every line completed since the last call.
    ///
    /// Returns true once a non-blank line has completed
    /// `line_repeat_threshold` times in a row.
    fn track_lines(&mut self, accumulated: &str) -> bool {
        if self.line_start > accumulated.len() || !accumulated.is_char_boundary(self.line_start) {
            // Buffer is append-only; anything else is a caller bug.
            log::warn!("safety monitor saw a non-append buffer update; line state reset");
            self.line_start = 0;
            self.last_line = None;
            self.line_repeats = 0;
        }

        let mut hit = false;
        while let Some(rel) = accumulated[self.line_start..].find('\n') {
            let end = self.line_start + rel;
            let line = accumulated[self.line_start..end].trim();
            self.line_start = end + 1;

            if line.is_empty() {
                continue;
            }
            if self.last_line.as_deref() == Some(line) {
                self.line_repeats += 1;
            } else {
                self.last_line = Some(line.to_string());
                self.line_repeats = 1;
            }
            if self.line_repeats >= self.line_repeat_threshold {
                hit = true;
            }
        }
        hit
    }

    /// Push the fragment into the lookback window and check whether the
    /// tail repeats the sequence just before it.
    fn track_fragment(&mut self, fragment: &str) -> bool {
        if self.token_lookback_window == 0 {
            return false;
        }
        self.recent.push_back(fragment.to_string());
        while self.recent.len() > self.token_lookback_window {
            self.recent.pop_front();
        }

        let len = self.recent.len();
        let upper = (self.token_lookback_window / 2).min(len / 2);
        (self.token_repeat_min_len..=upper).any(|k| {
            let tail = self.recent.range(len - k..);
            let prev = self.recent.range(len - 2 * k..len - k);
            tail.eq(prev)
        })
    }

    /// Fragments observed so far.
    pub fn observed(&self) -> u64 {
        self.observed
    }

    /// Current consecutive-repeat count of the last completed line.
    pub fn line_repeats(&self) -> usize {
        self.line_repeats
    }

    /// Fragments currently held in the lookback window.
    pub fn buffered_fragments(&self) -> usize {
        self.recent.len()
    }
}

/// Char-count comparison without walking the string when the byte length
/// already rules it out (bytes >= chars).
#[inline]
fn exceeds_chars(text: &str, max_chars: usize) -> bool {
    text.len() >= max_chars && text.chars().count() >= max_chars
}
