//! Kobold-native dialect.
//!
//! Field names match the canonical model closely, so this translator is the
//! base the other text dialects build on: they rewrite their own field names
//! into a `KoboldGenerationRequest` and then share `into_request`.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::domain::limits::{IMAGES_MAX, LOGIT_BIAS_MAX, STOP_SEQUENCE_MAX};
use crate::domain::{GenKey, GenerationRequest, LogitBias, SamplerParams};

/// Wire shape of `/api/v1/generate` and the Horde job payload.
///
/// Every field is optional; missing fields fall back to documented defaults
/// rather than erroring. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KoboldGenerationRequest {
    pub prompt: String,
    pub memory: String,
    pub images: Vec<String>,
    pub max_context_length: Option<u32>,
    pub max_length: Option<u32>,
    pub temperature: Option<f32>,
    pub top_k: Option<i32>,
    pub top_a: Option<f32>,
    pub top_p: Option<f32>,
    pub min_p: Option<f32>,
    #[serde(rename = "typical")]
    pub typical_p: Option<f32>,
    pub tfs: Option<f32>,
    // Three alias spellings for the same parameter; resolved by max.
    pub rep_pen: Option<f32>,
    pub repeat_penalty: Option<f32>,
    pub repetition_penalty: Option<f32>,
    pub rep_pen_range: Option<i32>,
    pub presence_penalty: Option<f32>,
    pub mirostat: Option<i32>,
    pub mirostat_tau: Option<f32>,
    pub mirostat_eta: Option<f32>,
    pub dynatemp_range: Option<f32>,
    pub dynatemp_exponent: Option<f32>,
    pub smoothing_factor: Option<f32>,
    pub sampler_order: Option<Vec<u8>>,
    pub sampler_seed: Option<i64>,
    /// Entries may be null; null slots become empty sentinels.
    pub stop_sequence: Vec<Option<String>>,
    pub use_default_badwordsids: Option<bool>,
    pub grammar: String,
    pub grammar_retain_state: bool,
    pub genkey: String,
    pub trim_stop: bool,
    /// Token id (as a JSON object key) to bias value.
    pub logit_bias: HashMap<String, f32>,
}

impl KoboldGenerationRequest {
    /// Resolve the repetition penalty from its three alias spellings by
    /// taking the maximum supplied value.
    #[must_use]
    pub fn resolved_rep_pen(&self) -> f32 {
        self.rep_pen
            .unwrap_or(1.0)
            .max(self.repeat_penalty.unwrap_or(1.0))
            .max(self.repetition_penalty.unwrap_or(1.0))
    }

    /// Build the canonical request, applying defaults and bounds.
    ///
    /// `default_max_context` is the engine's allocated context size, used
    /// when the request does not specify one.
    #[must_use]
    pub fn into_request(self, default_max_context: u32, quiet: bool) -> GenerationRequest {
        let rep_pen = self.resolved_rep_pen();

        let mut logit_biases = Vec::with_capacity(self.logit_bias.len().min(LOGIT_BIAS_MAX));
        for (key, value) in &self.logit_bias {
            match key.parse::<i32>() {
                Ok(token_id) => logit_biases.push(LogitBias::clamped(token_id, *value)),
                Err(err) => warn!(key = %key, %err, "skipped unparsable logit bias"),
            }
        }
        logit_biases.truncate(LOGIT_BIAS_MAX);

        let mut stop_sequences: Vec<String> = self
            .stop_sequence
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        stop_sequences.truncate(STOP_SEQUENCE_MAX);

        let mut images = self.images;
        images.truncate(IMAGES_MAX);

        GenerationRequest {
            prompt: self.prompt,
            memory: self.memory,
            images,
            max_length: self.max_length.unwrap_or(100),
            max_context_length: self.max_context_length.unwrap_or(default_max_context),
            sampling: SamplerParams {
                temperature: self.temperature.unwrap_or(0.7),
                top_k: self.top_k.unwrap_or(100),
                top_a: self.top_a.unwrap_or(0.0),
                top_p: self.top_p.unwrap_or(0.92),
                min_p: self.min_p.unwrap_or(0.0),
                typical_p: self.typical_p.unwrap_or(1.0),
                tfs: self.tfs.unwrap_or(1.0),
                rep_pen,
                rep_pen_range: self.rep_pen_range.unwrap_or(256),
                presence_penalty: self.presence_penalty.unwrap_or(0.0),
                mirostat: self.mirostat.unwrap_or(0),
                mirostat_tau: self.mirostat_tau.unwrap_or(5.0),
                mirostat_eta: self.mirostat_eta.unwrap_or(0.1),
                dynatemp_range: self.dynatemp_range.unwrap_or(0.0),
                dynatemp_exponent: self.dynatemp_exponent.unwrap_or(1.0),
                smoothing_factor: self.smoothing_factor.unwrap_or(0.0),
            },
            sampler_order: self
                .sampler_order
                .unwrap_or_else(GenerationRequest::default_sampler_order),
            seed: self.sampler_seed.unwrap_or(-1),
            stop_sequences,
            logit_biases,
            use_default_badwords: self.use_default_badwordsids.unwrap_or(false),
            grammar: self.grammar,
            grammar_retain_state: self.grammar_retain_state,
            stream: false,
            genkey: GenKey::from(self.genkey),
            trim_stop: self.trim_stop,
            quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_missing_field() {
        let req: KoboldGenerationRequest = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        let canonical = req.into_request(2048, false);
        assert_eq!(canonical.prompt, "hi");
        assert_eq!(canonical.max_length, 100);
        assert_eq!(canonical.max_context_length, 2048);
        assert_eq!(canonical.sampling.top_k, 100);
        assert_eq!(canonical.sampling.top_p, 0.92);
        assert_eq!(canonical.seed, -1);
        assert!(canonical.genkey.is_none());
    }

    #[test]
    fn rep_pen_aliases_resolve_by_maximum() {
        let req: KoboldGenerationRequest = serde_json::from_str(
            r#"{"rep_pen":1.05,"repetition_penalty":1.3,"repeat_penalty":1.1}"#,
        )
        .unwrap();
        assert!((req.resolved_rep_pen() - 1.3).abs() < f32::EPSILON);
    }

    #[test]
    fn null_stop_sequences_become_empty_strings() {
        let req: KoboldGenerationRequest =
            serde_json::from_str("{\"stop_sequence\":[\"###\",null,\"end\"]}").unwrap();
        let canonical = req.into_request(2048, false);
        assert_eq!(canonical.stop_sequences, vec!["###", "", "end"]);
    }

    #[test]
    fn unparsable_logit_bias_keys_are_skipped() {
        let req: KoboldGenerationRequest =
            serde_json::from_str(r#"{"logit_bias":{"42":5.0,"abc":1.0}}"#).unwrap();
        let canonical = req.into_request(2048, false);
        assert_eq!(canonical.logit_biases.len(), 1);
        assert_eq!(canonical.logit_biases[0].token_id, 42);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let req: Result<KoboldGenerationRequest, _> =
            serde_json::from_str(r#"{"prompt":"x","some_future_field":true}"#);
        assert!(req.is_ok());
    }
}
