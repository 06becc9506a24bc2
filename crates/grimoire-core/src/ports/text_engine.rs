//! Text engine port.
//!
//! The generation engine is an external collaborator consumed through a
//! narrow request/response contract: a blocking `generate` call over a
//! fixed-layout record, a pollable token buffer for streaming, a best-effort
//! abort, and scalar telemetry getters. The engine has no internal
//! concurrency — only one generation may be in flight at a time, and it is
//! the coordinator's job to enforce that, never the engine's.

use serde::Serialize;

use crate::domain::limits::{
    IMAGES_MAX, LOGIT_BIAS_MAX, SAMPLER_ORDER_MAX, STOP_SEQUENCE_MAX,
};
use crate::domain::request::{GenerationRequest, LogitBias};

/// Fixed-layout generation record handed to the engine.
///
/// Bounded arrays use empty strings (or [`LogitBias::UNUSED`]) as the
/// unused-slot sentinel. Built from a [`GenerationRequest`] by
/// [`GenerationInputs::lower`], which applies every clamp and truncation.
#[derive(Debug, Clone)]
pub struct GenerationInputs {
    pub prompt: String,
    pub memory: String,
    pub images: [String; IMAGES_MAX],
    pub max_context_length: u32,
    pub max_length: u32,
    pub temperature: f32,
    pub top_k: i32,
    pub top_a: f32,
    pub top_p: f32,
    pub min_p: f32,
    pub typical_p: f32,
    pub tfs: f32,
    pub rep_pen: f32,
    pub rep_pen_range: i32,
    pub presence_penalty: f32,
    pub mirostat: i32,
    pub mirostat_tau: f32,
    pub mirostat_eta: f32,
    pub dynatemp_range: f32,
    pub dynatemp_exponent: f32,
    pub smoothing_factor: f32,
    pub sampler_order: [u8; SAMPLER_ORDER_MAX],
    pub sampler_len: usize,
    pub seed: i64,
    pub stop_sequence: [String; STOP_SEQUENCE_MAX],
    pub logit_biases: [LogitBias; LOGIT_BIAS_MAX],
    pub unban_tokens: bool,
    pub grammar: String,
    pub grammar_retain_state: bool,
    pub stream_sse: bool,
    pub quiet: bool,
}

impl GenerationInputs {
    /// Lower a canonical request into the engine record.
    ///
    /// Length fields are clamped against `allocated_ctx`, bounded lists are
    /// truncated to their array sizes, bias values are clamped, and a
    /// mirostat mode outside {1, 2} zeroes the whole mirostat triple.
    #[must_use]
    pub fn lower(mut request: GenerationRequest, allocated_ctx: u32) -> Self {
        request.clamp_lengths(allocated_ctx);

        let mut images: [String; IMAGES_MAX] = Default::default();
        for (slot, image) in images.iter_mut().zip(request.images.iter()) {
            slot.clone_from(image);
        }

        let mut stop_sequence: [String; STOP_SEQUENCE_MAX] = Default::default();
        for (slot, stop) in stop_sequence.iter_mut().zip(request.stop_sequences.iter()) {
            slot.clone_from(stop);
        }

        let mut logit_biases = [LogitBias::UNUSED; LOGIT_BIAS_MAX];
        for (slot, bias) in logit_biases.iter_mut().zip(request.logit_biases.iter()) {
            *slot = LogitBias::clamped(bias.token_id, bias.bias);
        }

        let mut sampler_order = [0u8; SAMPLER_ORDER_MAX];
        let sampler_len = request.sampler_order.len().min(SAMPLER_ORDER_MAX);
        sampler_order[..sampler_len].copy_from_slice(&request.sampler_order[..sampler_len]);

        let mirostat_active = matches!(request.sampling.mirostat, 1 | 2);
        let sampling = &request.sampling;

        Self {
            prompt: request.prompt.clone(),
            memory: request.memory.clone(),
            images,
            max_context_length: request.max_context_length,
            max_length: request.max_length,
            temperature: sampling.temperature,
            top_k: sampling.top_k,
            top_a: sampling.top_a,
            top_p: sampling.top_p,
            min_p: sampling.min_p,
            typical_p: sampling.typical_p,
            tfs: sampling.tfs,
            rep_pen: sampling.rep_pen,
            rep_pen_range: sampling.rep_pen_range,
            presence_penalty: sampling.presence_penalty,
            mirostat: if mirostat_active { sampling.mirostat } else { 0 },
            mirostat_tau: if mirostat_active { sampling.mirostat_tau } else { 0.0 },
            mirostat_eta: if mirostat_active { sampling.mirostat_eta } else { 0.0 },
            dynatemp_range: sampling.dynatemp_range,
            dynatemp_exponent: sampling.dynatemp_exponent,
            smoothing_factor: sampling.smoothing_factor,
            sampler_order,
            sampler_len,
            seed: request.seed,
            stop_sequence,
            logit_biases,
            unban_tokens: !request.use_default_badwords,
            grammar: request.grammar.clone(),
            grammar_retain_state: request.grammar_retain_state,
            stream_sse: request.stream,
            quiet: request.quiet,
        }
    }
}

/// Result of a blocking generation call.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutputs {
    /// True when the engine produced usable text. A false status is not an
    /// error to surface: callers return an empty result instead, preserving
    /// compatibility with clients that never check status.
    pub ok: bool,
    pub text: String,
}

/// Scalar telemetry snapshot for the perf endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EngineTelemetry {
    pub last_process_ms: f32,
    pub last_eval_ms: f32,
    pub last_token_count: i32,
    pub last_seed: i64,
    pub total_gens: u64,
    pub last_stop_reason: i32,
}

/// The single-flight text generation engine.
///
/// Methods are synchronous because the engine offers no non-blocking
/// interface; async callers isolate `generate` behind
/// `tokio::task::spawn_blocking`. Implementations must tolerate the token
/// buffer being polled concurrently with a `generate` call in flight.
#[cfg_attr(test, mockall::automock)]
pub trait TextEngine: Send + Sync {
    /// Run one generation to completion. Blocking.
    fn generate(&self, inputs: &GenerationInputs) -> GenerationOutputs;

    /// Number of tokens currently available in the stream buffer.
    fn stream_token_count(&self) -> usize;

    /// Raw bytes of the token at `idx`, or `None` when it is not ready yet.
    /// Token bytes may end mid-way through a multi-byte UTF-8 sequence.
    fn stream_token(&self, idx: usize) -> Option<Vec<u8>>;

    /// True once the in-flight generation has finished.
    fn has_finished(&self) -> bool;

    /// Best-effort abort of the in-flight generation. Returns whether
    /// anything was actually running.
    fn abort(&self) -> bool;

    /// Partial output accumulated so far, for polled checking.
    fn pending_output(&self) -> String;

    /// Tokenize a prompt, for the token-count endpoint.
    fn token_count(&self, prompt: &str) -> Vec<i32>;

    fn telemetry(&self) -> EngineTelemetry;
}
