//! Deterministic engine test double.
//!
//! `StubEngine` plays back a scripted token sequence through the stream
//! buffer and returns the concatenated text from `generate`. It doubles as
//! the built-in echo backend for running the server without a real model.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};

use crate::ports::{EngineTelemetry, GenerationInputs, GenerationOutputs, TextEngine};

/// Scripted in-memory engine.
#[derive(Debug, Default)]
pub struct StubEngine {
    tokens: Mutex<Vec<Vec<u8>>>,
    finished: AtomicBool,
    fail: AtomicBool,
    echo: AtomicBool,
    generate_calls: AtomicUsize,
    abort_calls: AtomicUsize,
    total_gens: AtomicU64,
    last_seed: AtomicI64,
}

impl StubEngine {
    /// Engine whose `generate` succeeds with `text` (also exposed through
    /// the stream buffer as a single token).
    #[must_use]
    pub fn completing_with(text: &str) -> Self {
        let stub = Self::default();
        *stub.lock_tokens() = vec![text.as_bytes().to_vec()];
        stub
    }

    /// Engine with a pre-scripted stream buffer; call
    /// [`StubEngine::finish_stream`] once the script is complete.
    #[must_use]
    pub fn with_tokens(tokens: Vec<Vec<u8>>) -> Self {
        let stub = Self::default();
        *stub.lock_tokens() = tokens;
        stub
    }

    /// Engine whose `generate` reports failure.
    #[must_use]
    pub fn failing() -> Self {
        let stub = Self::default();
        stub.fail.store(true, Ordering::Relaxed);
        stub
    }

    /// Engine that echoes the request prompt back, for the built-in
    /// no-model backend.
    #[must_use]
    pub fn echoing() -> Self {
        let stub = Self::default();
        stub.echo.store(true, Ordering::Relaxed);
        stub
    }

    /// Append a token to the stream buffer mid-flight.
    pub fn push_token(&self, bytes: Vec<u8>) {
        self.lock_tokens().push(bytes);
    }

    /// Mark the scripted stream as finished.
    pub fn finish_stream(&self) {
        self.finished.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn generate_count(&self) -> usize {
        self.generate_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn abort_count(&self) -> usize {
        self.abort_calls.load(Ordering::Relaxed)
    }

    fn lock_tokens(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        self.tokens
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TextEngine for StubEngine {
    fn generate(&self, inputs: &GenerationInputs) -> GenerationOutputs {
        self.generate_calls.fetch_add(1, Ordering::Relaxed);
        self.total_gens.fetch_add(1, Ordering::Relaxed);
        self.last_seed.store(inputs.seed, Ordering::Relaxed);

        if self.fail.load(Ordering::Relaxed) {
            self.finished.store(true, Ordering::Release);
            return GenerationOutputs {
                ok: false,
                text: String::new(),
            };
        }

        if self.echo.load(Ordering::Relaxed) {
            let text = inputs.prompt.clone();
            *self.lock_tokens() = vec![text.as_bytes().to_vec()];
            self.finished.store(true, Ordering::Release);
            return GenerationOutputs { ok: true, text };
        }

        let text = {
            let tokens = self.lock_tokens();
            let bytes: Vec<u8> = tokens.iter().flatten().copied().collect();
            String::from_utf8_lossy(&bytes).into_owned()
        };
        self.finished.store(true, Ordering::Release);
        GenerationOutputs { ok: true, text }
    }

    fn stream_token_count(&self) -> usize {
        self.lock_tokens().len()
    }

    fn stream_token(&self, idx: usize) -> Option<Vec<u8>> {
        self.lock_tokens().get(idx).cloned()
    }

    fn has_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    fn abort(&self) -> bool {
        self.abort_calls.fetch_add(1, Ordering::Relaxed);
        !self.finished.swap(true, Ordering::AcqRel)
    }

    fn pending_output(&self) -> String {
        let tokens = self.lock_tokens();
        let bytes: Vec<u8> = tokens.iter().flatten().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn token_count(&self, prompt: &str) -> Vec<i32> {
        prompt.chars().map(|c| c as i32).collect()
    }

    fn telemetry(&self) -> EngineTelemetry {
        EngineTelemetry {
            total_gens: self.total_gens.load(Ordering::Relaxed),
            last_seed: self.last_seed.load(Ordering::Relaxed),
            ..Default::default()
        }
    }
}
