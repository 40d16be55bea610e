// ─────────────────────────────────────────────────────────────────────
// Minicode — Model Adapter Interface
// ─────────────────────────────────────────────────────────────────────
//! Model adapter trait and a scripted implementation.
//!
//! The real engine (llama.cpp or similar) lives behind `ModelAdapter`.
//! It owns weights, tokenization and sampling; the controller only hands
//! it a prompt, opaque sampling parameters, a fragment sink and a
//! cancellation poll. The scripted adapter replays a fixed fragment list
//! for tests and benchmarks.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use minicode_types::{MinicodeError, MinicodeResult, SamplingParams};

/// Trait for local text-generation engines.
pub trait ModelAdapter: Send + Sync {
    fn load_model(&self, path: &Path) -> MinicodeResult<()>;

    fn unload_model(&self);

    fn is_loaded(&self) -> bool;

    /// Produce fragments into `sink` until done or until `should_stop`
    /// returns true. Implementations poll `should_stop` before and after
    /// each fragment.
    fn generate_streaming(
        &self,
        prompt: &str,
        params: &SamplingParams,
        sink: &mut dyn FnMut(&str),
        should_stop: &dyn Fn() -> bool,
    ) -> MinicodeResult<()>;
}

/// Deterministic adapter that replays a fixed list of fragments.
///
/// Honors `SamplingParams::max_tokens`. Optionally fails after a given
/// number of fragments, and can sleep between fragments.
pub struct ScriptedEngine {
    fragments: Vec<String>,
    loaded: AtomicBool,
    fail_after: Option<(usize, String)>,
    delay: Option<Duration>,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedEngine {
    /// A loaded engine that will emit `fragments` in order.
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            loaded: AtomicBool::new(true),
            fail_after: None,
            delay: None,
            last_prompt: Mutex::new(None),
        }
    }

    /// Start unloaded; `load_model` must be called first.
    pub fn unloaded(mut self) -> Self {
        self.loaded = AtomicBool::new(false);
        self
    }

    /// Fail with `message` once `count` fragments have been emitted.
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((count, message.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Prompt passed to the most recent `generate_streaming` call.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().clone()
    }
}

impl ModelAdapter for ScriptedEngine {
    fn load_model(&self, path: &Path) -> MinicodeResult<()> {
        if path.as_os_str().is_empty() {
            return Err(MinicodeError::ModelLoad("empty model path".to_string()));
        }
        self.loaded.store(true, Ordering::SeqCst);
        log::info!("scripted model loaded from {}", path.display());
        Ok(())
    }

    fn unload_model(&self) {
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn generate_streaming(
        &self,
        prompt: &str,
        params: &SamplingParams,
        sink: &mut dyn FnMut(&str),
        should_stop: &dyn Fn() -> bool,
    ) -> MinicodeResult<()> {
        if !self.is_loaded() {
            return Err(MinicodeError::Engine("no model loaded".to_string()));
        }
        *self.last_prompt.lock() = Some(prompt.to_string());

        let limit = params.max_tokens as usize;
        for (emitted, fragment) in self.fragments.iter().take(limit).enumerate() {
            if should_stop() {
                break;
            }
            if let Some((count, message)) = &self.fail_after {
                if emitted >= *count {
                    return Err(MinicodeError::Engine(message.clone()));
                }
            }
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            sink(fragment);
            if should_stop() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn collect(engine: &ScriptedEngine, params: &SamplingParams) -> (Vec<String>, MinicodeResult<()>) {
        let mut out = Vec::new();
        let result = engine.generate_streaming("p", params, &mut |f| out.push(f.to_string()), &|| false);
        (out, result)
    }

    #[test]
    fn test_replays_fragments() {
        let engine = ScriptedEngine::new(["a", "b", "c"]);
        let (out, result) = collect(&engine, &SamplingParams::default());
        assert!(result.is_ok());
        assert_eq!(out, vec!["a", "b", "c"]);
        assert_eq!(engine.last_prompt().as_deref(), Some("p"));
    }

    #[test]
    fn test_respects_max_tokens() {
        let engine = ScriptedEngine::new(["a", "b", "c"]);
        let params = SamplingParams {
            max_tokens: 2,
            ..Default::default()
        };
        let (out, _) = collect(&engine, &params);
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn test_stops_when_polled_true() {
        let engine = ScriptedEngine::new(["a", "b", "c", "d"]);
        let seen = Cell::new(0usize);
        let mut out = Vec::new();
        engine
            .generate_streaming(
                "p",
                &SamplingParams::default(),
                &mut |f| {
                    out.push(f.to_string());
                    seen.set(seen.get() + 1);
                },
                &|| seen.get() >= 2,
            )
            .unwrap();
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn test_fails_after_count() {
        let engine = ScriptedEngine::new(["a", "b", "c"]).failing_after(1, "kv cache full");
        let (out, result) = collect(&engine, &SamplingParams::default());
        assert_eq!(out, vec!["a"]);
        assert_eq!(result, Err(MinicodeError::Engine("kv cache full".into())));
    }

    #[test]
    fn test_unloaded_refuses() {
        let engine = ScriptedEngine::new(["a"]).unloaded();
        assert!(!engine.is_loaded());
        let (_, result) = collect(&engine, &SamplingParams::default());
        assert!(result.is_err());

        engine.load_model(Path::new("model.gguf")).unwrap();
        assert!(engine.is_loaded());
        engine.unload_model();
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_empty_path_rejected() {
        let engine = ScriptedEngine::new(Vec::<String>::new()).unloaded();
        assert!(matches!(
            engine.load_model(Path::new("")),
            Err(MinicodeError::ModelLoad(_))
        ));
    }
}
