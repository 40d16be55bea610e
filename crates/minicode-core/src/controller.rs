// ─────────────────────────────────────────────────────────────────────
// Minicode — Session Controller (Single-Flight Facade)
// ─────────────────────────────────────────────────────────────────────
//! Caller-facing entry point.
//!
//! `start` validates the request, claims the single-flight slot with a
//! compare-and-set, builds the prompt and spawns one worker thread that
//! drives the model adapter. Fragments and the terminal result travel to
//! the caller over one channel, so they arrive in emission order and the
//! result is always last.
//!
//! The slot is released by an RAII guard owned by the worker, on every
//! terminal path (success, stop, cancel, engine error, engine panic),
//! before the terminal result is sent.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use minicode_types::{
    GenerationRequest, GenerationResult, MinicodeError, MinicodeResult, PromptBudget,
    RejectReason, SamplingParams, StopReason,
};

use crate::engine::ModelAdapter;
use crate::prompt::{PromptBuilder, SYSTEM_PREAMBLE, TOO_COMPLEX_SENTINEL};
use crate::session::{GenerationSession, StopSignal};

/// One item of a generation stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Next output fragment, in emission order.
    Token(String),
    /// Terminal result. Always the last event.
    Done(GenerationResult),
}

/// Receiving end of one generation.
pub struct GenerationStream {
    id: u64,
    events: Receiver<StreamEvent>,
    signal: Arc<StopSignal>,
    finished: bool,
}

impl GenerationStream {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Request cancellation of this generation. Idempotent.
    pub fn cancel(&self) {
        if self.signal.raise(StopReason::UserCancelled) {
            log::debug!("session {}: cancel requested by caller", self.id);
        }
    }

    /// Block for the next event. `None` after the terminal result.
    pub fn recv(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        let event = match self.events.recv() {
            Ok(event) => event,
            Err(_) => {
                log::error!("session {}: worker exited without a result", self.id);
                StreamEvent::Done(GenerationResult::EngineFailure(
                    "generation worker exited without a result".to_string(),
                ))
            }
        };
        if matches!(event, StreamEvent::Done(_)) {
            self.finished = true;
        }
        Some(event)
    }

    /// Drain the stream, handing each fragment to `on_token`, and return
    /// the terminal result.
    pub fn wait(mut self, mut on_token: impl FnMut(&str)) -> GenerationResult {
        while let Some(event) = self.recv() {
            match event {
                StreamEvent::Token(fragment) => on_token(&fragment),
                StreamEvent::Done(result) => return result,
            }
        }
        GenerationResult::EngineFailure("generation stream already drained".to_string())
    }
}

impl Iterator for GenerationStream {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        self.recv()
    }
}

/// Claim on the single-flight slot. Dropping it releases the slot.
struct SlotGuard {
    running: Arc<AtomicBool>,
    active: Arc<Mutex<Option<Arc<StopSignal>>>>,
}

impl SlotGuard {
    fn claim(
        running: &Arc<AtomicBool>,
        active: &Arc<Mutex<Option<Arc<StopSignal>>>>,
    ) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                running: Arc::clone(running),
                active: Arc::clone(active),
            })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        // Clear the signal first: once `running` is false a new session
        // may install its own.
        self.active.lock().take();
        self.running.store(false, Ordering::Release);
    }
}

/// Single-flight streaming generation controller.
pub struct SessionController {
    engine: Arc<dyn ModelAdapter>,
    budget: PromptBudget,
    sampling: SamplingParams,
    prompts: PromptBuilder,
    sentinel: String,
    running: Arc<AtomicBool>,
    active: Arc<Mutex<Option<Arc<StopSignal>>>>,
    next_id: AtomicU64,
}

impl SessionController {
    pub fn new(engine: Arc<dyn ModelAdapter>, budget: PromptBudget) -> MinicodeResult<Self> {
        budget.validate()?;
        Ok(Self {
            engine,
            prompts: PromptBuilder::new(SYSTEM_PREAMBLE, budget.max_input_chars),
            budget,
            sampling: SamplingParams::default(),
            sentinel: TOO_COMPLEX_SENTINEL.to_string(),
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.prompts = PromptBuilder::new(preamble, self.budget.max_input_chars);
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn budget(&self) -> &PromptBudget {
        &self.budget
    }

    pub fn load_model(&self, path: impl AsRef<Path>) -> MinicodeResult<()> {
        if self.is_generating() {
            return Err(MinicodeError::Busy(
                "cannot load a model while generating".to_string(),
            ));
        }
        self.engine.load_model(path.as_ref())
    }

    pub fn unload_model(&self) -> MinicodeResult<()> {
        if self.is_generating() {
            return Err(MinicodeError::Busy(
                "cannot unload the model while generating".to_string(),
            ));
        }
        self.engine.unload_model();
        Ok(())
    }

    pub fn is_model_loaded(&self) -> bool {
        self.engine.is_loaded()
    }

    /// True iff a session is running.
    pub fn is_generating(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cancel the running session, if any. Idempotent; a no-op when idle.
    pub fn cancel(&self) {
        if let Some(signal) = self.active.lock().as_ref() {
            if signal.raise(StopReason::UserCancelled) {
                log::debug!("cancel requested");
            }
        }
    }

    /// Start a generation.
    ///
    /// Rejections are reported synchronously and leave no trace: no
    /// session exists, the slot is free, the engine was never called.
    pub fn start(&self, request: GenerationRequest) -> Result<GenerationStream, RejectReason> {
        self.check_preconditions(&request).map_err(|reason| {
            log::warn!("generation rejected: {reason}");
            reason
        })?;

        let guard = SlotGuard::claim(&self.running, &self.active).ok_or_else(|| {
            log::warn!("generation rejected: {}", RejectReason::GenerationInProgress);
            RejectReason::GenerationInProgress
        })?;

        let prompt = match self.prompts.build(&request) {
            Ok(prompt) => prompt,
            Err(e) => {
                log::warn!("generation rejected: {e}");
                drop(guard);
                return Err(RejectReason::InputTooLong);
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let signal = Arc::new(StopSignal::new());
        *self.active.lock() = Some(Arc::clone(&signal));

        let session = GenerationSession::new(id, &self.budget, Arc::clone(&signal), &*self.sentinel);
        let params = SamplingParams {
            max_tokens: self.budget.max_output_tokens,
            ..self.sampling.clone()
        };
        let (tx, rx) = mpsc::channel();

        log::info!(
            "session {id} started ({} prompt chars, max {} tokens)",
            prompt.chars().count(),
            params.max_tokens
        );

        let worker = Worker {
            engine: Arc::clone(&self.engine),
            prompt,
            params,
            session,
            signal: Arc::clone(&signal),
            events: tx.clone(),
            guard,
        };
        let spawned = thread::Builder::new()
            .name(format!("minicode-gen-{id}"))
            .spawn(move || worker.run());
        if let Err(e) = spawned {
            // The worker (and its guard) was dropped with the closure.
            log::error!("session {id}: failed to spawn worker: {e}");
            let _ = tx.send(StreamEvent::Done(GenerationResult::EngineFailure(format!(
                "failed to spawn generation worker: {e}"
            ))));
        }

        Ok(GenerationStream {
            id,
            events: rx,
            signal,
            finished: false,
        })
    }

    /// Run one generation to completion on the calling thread's behalf.
    ///
    /// Rejections come back as `GenerationResult::Rejected`.
    pub fn generate(
        &self,
        request: GenerationRequest,
        on_token: impl FnMut(&str),
    ) -> GenerationResult {
        match self.start(request) {
            Ok(stream) => stream.wait(on_token),
            Err(reason) => GenerationResult::Rejected(reason),
        }
    }

    fn check_preconditions(&self, request: &GenerationRequest) -> Result<(), RejectReason> {
        if request.instruction.trim().is_empty() {
            return Err(RejectReason::EmptyInstruction);
        }
        if !self.engine.is_loaded() {
            return Err(RejectReason::ModelNotLoaded);
        }
        let context = &request.context;
        if context.chars().count() > self.budget.max_context_chars
            || context.matches('\n').count() >= self.budget.max_context_lines
        {
            return Err(RejectReason::ContextTooLarge);
        }
        Ok(())
    }
}

/// Everything the worker thread owns for one session.
struct Worker {
    engine: Arc<dyn ModelAdapter>,
    prompt: String,
    params: SamplingParams,
    session: GenerationSession,
    signal: Arc<StopSignal>,
    events: Sender<StreamEvent>,
    guard: SlotGuard,
}

impl Worker {
    fn run(self) {
        let Worker {
            engine,
            prompt,
            params,
            mut session,
            signal,
            events,
            guard,
        } = self;
        let id = session.id();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut sink = |fragment: &str| {
                if session.ingest(fragment).is_some()
                    && events.send(StreamEvent::Token(fragment.to_string())).is_err()
                    && signal.raise(StopReason::UserCancelled)
                {
                    log::debug!("session {id}: stream dropped, cancelling");
                }
            };
            let should_stop = || signal.is_raised();
            engine.generate_streaming(&prompt, &params, &mut sink, &should_stop)
        }));

        let engine_result = match outcome {
            Ok(result) => result,
            Err(_) => {
                log::error!("session {id}: model adapter panicked");
                Err(MinicodeError::Engine("model adapter panicked".to_string()))
            }
        };

        let result = session.finish(engine_result);
        drop(guard);
        let _ = events.send(StreamEvent::Done(result));
    }
}
