//! Canonical generation request.
//!
//! Every inbound API dialect is translated into `GenerationRequest` before it
//! touches the admission gate, and lowered into the engine's fixed-layout
//! `GenerationInputs` record just before the blocking call. All bounded
//! fields truncate silently and all out-of-range sampling values are
//! clamped; translation never rejects a request for a bad optional field.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::genkey::GenKey;
use super::limits::{
    BIAS_MAX_VALUE, BIAS_MIN_VALUE, DEFAULT_SAMPLER_ORDER, SAMPLER_ORDER_MAX,
};

/// One per-token logit bias, keyed by token id.
///
/// `token_id` of -1 marks an unused slot in the engine record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogitBias {
    pub token_id: i32,
    pub bias: f32,
}

impl LogitBias {
    /// The empty-slot sentinel for unused bias entries.
    pub const UNUSED: Self = Self {
        token_id: -1,
        bias: 0.0,
    };

    /// Build a bias entry, clamping the value to the accepted range and
    /// normalizing negative token ids to the unused sentinel id.
    #[must_use]
    pub fn clamped(token_id: i32, bias: f32) -> Self {
        Self {
            token_id: if token_id < 0 { -1 } else { token_id },
            bias: bias.clamp(BIAS_MIN_VALUE, BIAS_MAX_VALUE),
        }
    }
}

/// Sampling parameters, canonical names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerParams {
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
    /// Mirostat mode; only 1 and 2 are meaningful, anything else disables
    /// mirostat entirely (tau and eta are zeroed at lowering).
    pub mirostat: i32,
    pub mirostat_tau: f32,
    pub mirostat_eta: f32,
    pub dynatemp_range: f32,
    pub dynatemp_exponent: f32,
    pub smoothing_factor: f32,
}

impl Default for SamplerParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 100,
            top_a: 0.0,
            top_p: 0.92,
            min_p: 0.0,
            typical_p: 1.0,
            tfs: 1.0,
            rep_pen: 1.0,
            rep_pen_range: 256,
            presence_penalty: 0.0,
            mirostat: 0,
            mirostat_tau: 5.0,
            mirostat_eta: 0.1,
            dynatemp_range: 0.0,
            dynatemp_exponent: 1.0,
            smoothing_factor: 0.0,
        }
    }
}

/// The normalized generation request all dialects translate into.
///
/// Constructed per inbound call, consumed once by the coordinator,
/// then discarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Context-prefix text prepended by the engine ahead of the prompt.
    pub memory: String,
    /// Base64 image payloads; truncated to [`super::limits::IMAGES_MAX`].
    pub images: Vec<String>,
    pub max_length: u32,
    pub max_context_length: u32,
    pub sampling: SamplerParams,
    /// Explicit sampler ordering; empty means the engine default.
    pub sampler_order: Vec<u8>,
    pub seed: i64,
    /// Truncated to [`super::limits::STOP_SEQUENCE_MAX`].
    pub stop_sequences: Vec<String>,
    /// Truncated to [`super::limits::LOGIT_BIAS_MAX`].
    pub logit_biases: Vec<LogitBias>,
    /// When set, the engine keeps its default bad-words filter active
    /// (the "ignore EOS" behavior of the OpenAI dialect).
    pub use_default_badwords: bool,
    /// Grammar constraint text; empty means unconstrained.
    pub grammar: String,
    pub grammar_retain_state: bool,
    /// Client requested incremental token delivery.
    pub stream: bool,
    pub genkey: GenKey,
    /// Cut the final text at the first stop sequence occurrence.
    pub trim_stop: bool,
    pub quiet: bool,
}

impl GenerationRequest {
    /// Sanity-clamp the length fields against the allocated context size.
    ///
    /// `max_length` must leave at least one slot of context, and a request
    /// cannot ask for more context than the engine has allocated.
    pub fn clamp_lengths(&mut self, allocated_ctx: u32) {
        if self.max_context_length > allocated_ctx {
            warn!(
                requested = self.max_context_length,
                allocated = allocated_ctx,
                "requested max_context_length exceeds allocated context, reducing to fit"
            );
            self.max_context_length = allocated_ctx;
        }
        if self.max_context_length > 0 && self.max_length >= self.max_context_length - 1 {
            warn!(
                max_length = self.max_length,
                max_context_length = self.max_context_length,
                "max_length near or exceeding max_context_length, output may be incoherent"
            );
            self.max_length = self.max_context_length - 1;
        }
        let order_len = self.sampler_order.len().min(SAMPLER_ORDER_MAX);
        self.sampler_order.truncate(order_len);
    }

    /// The default sampler ordering as a vector, for callers that want an
    /// explicit order rather than the engine default.
    #[must_use]
    pub fn default_sampler_order() -> Vec<u8> {
        DEFAULT_SAMPLER_ORDER.to_vec()
    }
}
