//! Image interrogate (captioning) dialect.
//!
//! A fixed short instruction prompt over a single image, with a small fixed
//! output budget. The caption is trimmed back to the last complete sentence
//! before it leaves the server.

use serde::Deserialize;

use crate::domain::GenerationRequest;

/// Instruction prompt used for every caption request.
pub const CAPTION_PROMPT: &str =
    "### Instruction: In one sentence, write a descriptive caption for this image.\n### Response:";

/// Output budget for captions.
pub const CAPTION_MAX_LENGTH: u32 = 32;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterrogateRequest {
    pub image: String,
}

/// Build the canonical caption request.
#[must_use]
pub fn translate(request: InterrogateRequest, default_max_context: u32, quiet: bool) -> GenerationRequest {
    GenerationRequest {
        prompt: CAPTION_PROMPT.to_string(),
        images: vec![request.image],
        max_length: CAPTION_MAX_LENGTH,
        max_context_length: default_max_context,
        quiet,
        ..Default::default()
    }
}

/// Trim trailing text back to the last sentence-ending character (or
/// newline). Text with no such boundary is only whitespace-trimmed.
#[must_use]
pub fn end_trim_to_sentence(input: &str) -> String {
    const ENDERS: [char; 11] = ['.', '!', '?', '*', '"', ')', '}', '`', ']', ';', '…'];
    let mut last = None;
    for (idx, ch) in input.char_indices() {
        if ENDERS.contains(&ch) || ch == '\n' {
            last = Some(idx + ch.len_utf8());
        }
    }
    match last {
        Some(end) if end > 0 => input[..end].trim().to_string(),
        _ => input.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_request_is_fixed_shape() {
        let request: InterrogateRequest = serde_json::from_str(r#"{"image":"QUJD"}"#).unwrap();
        let canonical = translate(request, 2048, true);
        assert_eq!(canonical.images, vec!["QUJD"]);
        assert_eq!(canonical.max_length, CAPTION_MAX_LENGTH);
        assert!(canonical.prompt.starts_with("### Instruction:"));
    }

    #[test]
    fn trims_back_to_last_sentence_end() {
        assert_eq!(
            end_trim_to_sentence("A cat. It sits on a ma"),
            "A cat."
        );
        assert_eq!(end_trim_to_sentence("A dog! And then"), "A dog!");
    }

    #[test]
    fn text_without_boundary_is_whitespace_trimmed() {
        assert_eq!(end_trim_to_sentence("  just words  "), "just words");
    }

    #[test]
    fn multibyte_enders_are_respected() {
        assert_eq!(end_trim_to_sentence("waiting… more"), "waiting…");
    }
}
