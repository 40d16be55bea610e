// ─────────────────────────────────────────────────────────────────────
// Minicode — Generation Controller Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! Minicode generation controller: the single-flight streaming gate
//! between a caller and a local text-generation engine.

pub mod config;
pub mod error;
pub mod outcome;

pub use config::{PromptBudget, SamplingParams};
pub use error::{MinicodeError, MinicodeResult};
pub use outcome::{
    GenerationRequest, GenerationResult, RejectReason, SafetyVerdict, SessionState, StopReason,
    StyleDirective,
};
