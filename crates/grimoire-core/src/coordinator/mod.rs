//! Admission & streaming coordinator.
//!
//! The concurrency core in front of the engine: the exclusive gate with its
//! bounded wait queue, the cancellation tracker, the token-stream delivery
//! loop, and the orchestration that ties them together around one blocking
//! generation call. HTTP handlers and the embedded Horde worker are both
//! plain clients of this module; neither touches the engine directly for
//! generation.

pub mod cancel;
pub mod gate;
pub mod stream;
pub mod utf8;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;
use tracing::debug;

pub use cancel::{AbortOutcome, CancelTracker};
pub use gate::{Admission, EngineGate, GatePermit};
pub use stream::{AbortGuard, token_stream};

use crate::domain::GenerationRequest;
use crate::ports::{GenerationInputs, TextEngine};

/// Errors from the coordinator itself. Engine-reported failures are not
/// errors here — they surface as an empty result.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The blocking generation task panicked or was torn down.
    #[error("generation task failed: {0}")]
    TaskFailed(String),
}

/// Process-wide coordination state around the single-flight engine.
///
/// One instance lives for the process lifetime and is shared by every
/// handler and the Horde worker; there is no other mutable shared state.
pub struct Coordinator {
    engine: Arc<dyn TextEngine>,
    gate: EngineGate,
    cancel: CancelTracker,
    total_requests: AtomicU64,
    ready: AtomicBool,
    allocated_ctx: u32,
}

impl Coordinator {
    #[must_use]
    pub fn new(engine: Arc<dyn TextEngine>, multiuser_limit: u32, allocated_ctx: u32) -> Self {
        Self {
            engine,
            gate: EngineGate::new(multiuser_limit),
            cancel: CancelTracker::new(),
            total_requests: AtomicU64::new(0),
            ready: AtomicBool::new(false),
            allocated_ctx,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn TextEngine> {
        &self.engine
    }

    #[must_use]
    pub const fn gate(&self) -> &EngineGate {
        &self.gate
    }

    #[must_use]
    pub const fn cancel(&self) -> &CancelTracker {
        &self.cancel
    }

    /// Requests that have entered generation since startup.
    #[must_use]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Context size the engine was allocated with.
    #[must_use]
    pub const fn allocated_ctx(&self) -> u32 {
        self.allocated_ctx
    }

    /// Flip once serving begins; the Horde worker waits on this.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Attempt admission, waiting in the bounded queue when configured.
    pub async fn admit(&self) -> Admission {
        self.gate.admit(true).await
    }

    /// Abort either the running job or a queued one, per the tracker rules.
    pub fn abort(&self, genkey: &crate::domain::GenKey) -> AbortOutcome {
        self.cancel
            .abort(genkey, self.gate.waiting(), self.engine.as_ref())
    }

    /// Run one admitted generation to completion.
    ///
    /// Records the current key and consumes a matching deferred abort
    /// *before* the blocking call, so a queued job can never start after its
    /// own cancellation. The permit is held for the whole call and released
    /// on every path when it drops.
    pub async fn run(
        &self,
        permit: GatePermit,
        request: GenerationRequest,
    ) -> Result<String, CoordinatorError> {
        let genkey = request.genkey.clone();
        self.cancel.record_current(&genkey);
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if self.cancel.take_deferred(&genkey) {
            drop(permit);
            return Ok(String::new());
        }

        let trim_stop = request.trim_stop;
        let stop_sequences = request.stop_sequences.clone();
        let inputs = GenerationInputs::lower(request, self.allocated_ctx);
        let engine = Arc::clone(&self.engine);

        let outputs = tokio::task::spawn_blocking(move || engine.generate(&inputs))
            .await
            .map_err(|err| CoordinatorError::TaskFailed(err.to_string()))?;
        drop(permit);

        let mut text = if outputs.ok {
            outputs.text
        } else {
            String::new()
        };
        if trim_stop {
            for stop in &stop_sequences {
                if !stop.is_empty() {
                    if let Some(index) = text.find(stop.as_str()) {
                        text.truncate(index);
                    }
                }
            }
        }
        debug!(genkey = %genkey, chars = text.len(), "generation finished");
        Ok(text)
    }
}
