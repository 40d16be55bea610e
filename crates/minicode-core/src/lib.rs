// ─────────────────────────────────────────────────────────────────────
// Minicode — Generation Controller Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Streaming generation controller for a local, single-model
//! text-generation engine: bounded prompts, a per-fragment safety
//! monitor, single-flight sessions and cooperative cancellation.
//!
//! # Invariants
//!
//! 1. **Single flight**: at most one session runs per controller. The slot
//!    is claimed with a compare-and-set and released exactly once by the
//!    worker's guard, on every terminal path including adapter panics.
//!
//! 2. **Stop is monotonic**: a session's `StopSignal` moves from unset to
//!    `safety_limit` or `user_cancelled` once and never back. Fragments
//!    that arrive after it is raised are dropped, not classified.
//!
//! 3. **Fixed check order**: char limit, time limit, line repetition,
//!    token repetition. The first violated check is the reported reason.
//!
//! 4. **Ordered delivery**: fragments and the terminal result share one
//!    channel; the result is always the last event of a stream.

pub mod controller;
pub mod engine;
pub mod monitor;
pub mod prompt;
pub mod session;

pub use controller::{GenerationStream, SessionController, StreamEvent};
pub use engine::{ModelAdapter, ScriptedEngine};
pub use monitor::SafetyMonitor;
pub use prompt::{build_prompt, PromptBuilder, SYSTEM_PREAMBLE, TOO_COMPLEX_SENTINEL};
pub use session::{classify_output, GenerationSession, StopSignal};
