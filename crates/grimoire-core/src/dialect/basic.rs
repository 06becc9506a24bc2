//! Legacy "basic" dialect (`/request`).
//!
//! The oldest inbound shape: `text` instead of `prompt`, `max` instead of
//! `max_length`, and a higher default top-k preserved for compatibility.

use serde::Deserialize;

use super::kobold::KoboldGenerationRequest;
use crate::domain::GenerationRequest;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BasicGenerationRequest {
    pub text: String,
    pub max: Option<u32>,
    pub top_k: Option<i32>,
    #[serde(flatten)]
    pub base: KoboldGenerationRequest,
}

/// Map the legacy shape onto the kobold base and translate.
#[must_use]
pub fn translate(request: BasicGenerationRequest, default_max_context: u32, quiet: bool) -> GenerationRequest {
    let mut base = request.base;
    base.prompt = request.text;
    base.max_length = Some(request.max.unwrap_or(100));
    base.top_k = Some(request.top_k.unwrap_or(120));
    base.into_request(default_max_context, quiet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_max_map_to_canonical_names() {
        let request: BasicGenerationRequest =
            serde_json::from_str(r#"{"text":"once","max":42}"#).unwrap();
        let canonical = translate(request, 2048, false);
        assert_eq!(canonical.prompt, "once");
        assert_eq!(canonical.max_length, 42);
    }

    #[test]
    fn top_k_defaults_to_120() {
        let request: BasicGenerationRequest = serde_json::from_str(r#"{"text":"x"}"#).unwrap();
        let canonical = translate(request, 2048, false);
        assert_eq!(canonical.sampling.top_k, 120);
        assert_eq!(canonical.max_length, 100);
    }

    #[test]
    fn supplied_top_k_wins_over_default() {
        let request: BasicGenerationRequest =
            serde_json::from_str(r#"{"text":"x","top_k":7}"#).unwrap();
        assert_eq!(translate(request, 2048, false).sampling.top_k, 7);
    }
}
