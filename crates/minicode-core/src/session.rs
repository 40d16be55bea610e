// ─────────────────────────────────────────────────────────────────────
// Minicode — Generation Session
// ─────────────────────────────────────────────────────────────────────
//! One in-flight generation: output buffer, stop signal, safety monitor
//! and final classification.
//!
//! A session is created `Running` and is driven from a single worker.
//! Only the `StopSignal` is shared with other threads.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use minicode_types::{
    GenerationResult, MinicodeResult, PromptBudget, SafetyVerdict, SessionState, StopReason,
};

use crate::monitor::SafetyMonitor;

const SIGNAL_UNSET: u8 = 0;
const SIGNAL_SAFETY: u8 = 1;
const SIGNAL_USER: u8 = 2;

/// Cancellation flag plus reason, in one atomic.
///
/// Monotonic: goes from unset to a reason exactly once; the first writer
/// wins and later raises are no-ops.
#[derive(Debug, Default)]
pub struct StopSignal {
    state: AtomicU8,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns true if this call set it.
    pub fn raise(&self, reason: StopReason) -> bool {
        let code = match reason {
            StopReason::SafetyLimit => SIGNAL_SAFETY,
            StopReason::UserCancelled => SIGNAL_USER,
        };
        self.state
            .compare_exchange(SIGNAL_UNSET, code, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_raised(&self) -> bool {
        self.state.load(Ordering::SeqCst) != SIGNAL_UNSET
    }

    pub fn reason(&self) -> Option<StopReason> {
        match self.state.load(Ordering::SeqCst) {
            SIGNAL_SAFETY => Some(StopReason::SafetyLimit),
            SIGNAL_USER => Some(StopReason::UserCancelled),
            _ => None,
        }
    }
}

/// Map trimmed engine output to `TooComplex` or `Success`.
///
/// `TooComplex` when the output is exactly the sentinel, or contains it
/// with at most one non-blank line. A sentinel buried in a multi-line
/// file is ordinary content.
pub fn classify_output(trimmed: &str, sentinel: &str) -> GenerationResult {
    let declined = trimmed == sentinel
        || (trimmed.contains(sentinel)
            && trimmed.lines().filter(|l| !l.trim().is_empty()).count() <= 1);
    if declined {
        GenerationResult::TooComplex
    } else {
        GenerationResult::Success(trimmed.to_string())
    }
}

/// State of one generation, owned by the worker that drives it.
pub struct GenerationSession {
    id: u64,
    state: SessionState,
    output: String,
    monitor: SafetyMonitor,
    signal: Arc<StopSignal>,
    started: Instant,
    sentinel: String,
    safety_verdict: Option<SafetyVerdict>,
    accepted: usize,
    ignored: usize,
}

impl GenerationSession {
    pub fn new(
        id: u64,
        budget: &PromptBudget,
        signal: Arc<StopSignal>,
        sentinel: impl Into<String>,
    ) -> Self {
        Self {
            id,
            state: SessionState::Running,
            output: String::new(),
            monitor: SafetyMonitor::new(budget),
            signal,
            started: Instant::now(),
            sentinel: sentinel.into(),
            safety_verdict: None,
            accepted: 0,
            ignored: 0,
        }
    }

    /// Append a fragment and run the safety monitor on it.
    ///
    /// Returns `None` when the fragment arrived after the stop signal was
    /// raised; such fragments are dropped.
    pub fn ingest(&mut self, fragment: &str) -> Option<SafetyVerdict> {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.ingest_at(fragment, elapsed_ms)
    }

    pub(crate) fn ingest_at(&mut self, fragment: &str, elapsed_ms: u64) -> Option<SafetyVerdict> {
        if self.state != SessionState::Running || self.signal.is_raised() {
            self.ignored += 1;
            return None;
        }

        self.output.push_str(fragment);
        self.accepted += 1;

        let verdict = self.monitor.observe(&self.output, fragment, elapsed_ms);
        if verdict.is_stop() && self.signal.raise(StopReason::SafetyLimit) {
            log::warn!(
                "session {}: safety stop ({}) after {} fragments, {} chars",
                self.id,
                verdict.as_str(),
                self.accepted,
                self.output.len()
            );
            self.safety_verdict = Some(verdict);
        }
        Some(verdict)
    }

    /// Terminal transition and classification. Consumes the session.
    pub fn finish(mut self, engine_result: MinicodeResult<()>) -> GenerationResult {
        let reason = self.signal.reason();
        self.state = match (reason, &engine_result) {
            (Some(StopReason::SafetyLimit), _) => SessionState::Stopped,
            (Some(StopReason::UserCancelled), _) => SessionState::Cancelled,
            (None, Err(_)) => SessionState::Failed,
            (None, Ok(())) => SessionState::Completed,
        };

        let result = match (reason, engine_result) {
            (Some(StopReason::SafetyLimit), _) => GenerationResult::SafetyLimitStopped(
                self.safety_verdict.unwrap_or(SafetyVerdict::StopCharLimit),
            ),
            (Some(StopReason::UserCancelled), _) => GenerationResult::Cancelled,
            (None, Err(e)) => {
                log::error!("session {}: engine failure: {e}", self.id);
                GenerationResult::EngineFailure(e.to_string())
            }
            (None, Ok(())) => classify_output(self.output.trim(), &self.sentinel),
        };

        log::info!(
            "session {} finished: {:?} ({} fragments accepted, {} ignored, {} ms)",
            self.id,
            self.state,
            self.accepted,
            self.ignored,
            self.started.elapsed().as_millis()
        );
        result
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn ignored(&self) -> usize {
        self.ignored
    }
}
