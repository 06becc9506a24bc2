//! OpenAI-compatible dialects: completions and chat.
//!
//! Both rewrite their field names onto the kobold base. Chat additionally
//! folds the role-tagged message array into one prompt string using
//! per-role start/end templates (overridable through the request's
//! `adapter` object) and extracts inline image parts.

use serde::Deserialize;

use super::kobold::KoboldGenerationRequest;
use crate::domain::GenerationRequest;

/// OpenAI allows `stop` to be either a single string or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StopField {
    One(String),
    Many(Vec<String>),
}

impl StopField {
    fn into_vec(self) -> Vec<Option<String>> {
        match self {
            Self::One(stop) => vec![Some(stop)],
            Self::Many(stops) => stops.into_iter().map(Some).collect(),
        }
    }
}

/// Request shape of `/v1/completions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub stop: Option<StopField>,
    pub seed: Option<i64>,
    pub ignore_eos: bool,
    pub mirostat_mode: Option<i32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub stream: bool,
    #[serde(flatten)]
    pub base: KoboldGenerationRequest,
}

/// One chat turn. Content is either a plain string or an array of typed
/// parts (text and image_url).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: ChatContent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image_url: Option<ImageUrlRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageUrlRef {
    pub url: String,
}

/// Per-role prompt templates for folding a conversation into one string.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatAdapter {
    pub system_start: String,
    pub system_end: String,
    pub user_start: String,
    pub user_end: String,
    pub assistant_start: String,
    pub assistant_end: String,
}

impl Default for ChatAdapter {
    fn default() -> Self {
        Self {
            system_start: "\n### Instruction:\n".into(),
            system_end: String::new(),
            user_start: "\n### Instruction:\n".into(),
            user_end: String::new(),
            assistant_start: "\n### Response:\n".into(),
            assistant_end: String::new(),
        }
    }
}

/// Request shape of `/v1/chat/completions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub adapter: ChatAdapter,
    pub max_tokens: Option<u32>,
    pub stop: Option<StopField>,
    pub seed: Option<i64>,
    pub ignore_eos: bool,
    pub mirostat_mode: Option<i32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub stream: bool,
    #[serde(flatten)]
    pub base: KoboldGenerationRequest,
}

/// Field renames shared by both OpenAI dialects.
fn apply_openai_common(
    base: &mut KoboldGenerationRequest,
    max_tokens: Option<u32>,
    stop: Option<StopField>,
    seed: Option<i64>,
    ignore_eos: bool,
    mirostat_mode: Option<i32>,
    presence_penalty: Option<f32>,
    frequency_penalty: Option<f32>,
) {
    base.max_length = Some(max_tokens.unwrap_or(100));
    base.presence_penalty = Some(presence_penalty.or(frequency_penalty).unwrap_or(0.0));
    if let Some(stop) = stop {
        base.stop_sequence = stop.into_vec();
    }
    base.sampler_seed = Some(seed.unwrap_or(-1));
    base.use_default_badwordsids = Some(ignore_eos);
    base.mirostat = Some(mirostat_mode.unwrap_or(0));
}

/// Translate `/v1/completions`.
#[must_use]
pub fn translate_completions(
    request: CompletionRequest,
    default_max_context: u32,
    quiet: bool,
) -> GenerationRequest {
    let mut base = request.base;
    base.prompt = request.prompt;
    apply_openai_common(
        &mut base,
        request.max_tokens,
        request.stop,
        request.seed,
        request.ignore_eos,
        request.mirostat_mode,
        request.presence_penalty,
        request.frequency_penalty,
    );
    let mut canonical = base.into_request(default_max_context, quiet);
    canonical.stream = request.stream;
    canonical
}

/// Translate `/v1/chat/completions`, folding messages into one prompt.
#[must_use]
pub fn translate_chat(
    request: ChatCompletionRequest,
    default_max_context: u32,
    quiet: bool,
) -> GenerationRequest {
    let adapter = &request.adapter;
    let mut prompt = String::new();
    let mut images = Vec::new();

    for message in &request.messages {
        let (start, end): (&str, &str) = match message.role.as_str() {
            "system" => (&adapter.system_start, &adapter.system_end),
            "user" => (&adapter.user_start, &adapter.user_end),
            "assistant" => (&adapter.assistant_start, &adapter.assistant_end),
            // Unknown roles contribute content without templates.
            _ => ("", ""),
        };
        prompt.push_str(start);
        match &message.content {
            ChatContent::Text(text) => prompt.push_str(text),
            ChatContent::Parts(parts) => {
                for part in parts {
                    match part.kind.as_str() {
                        "text" => prompt.push_str(&part.text),
                        "image_url" => {
                            if let Some(image_url) = &part.image_url {
                                if image_url.url.starts_with("data:image") {
                                    if let Some((_, payload)) = image_url.url.split_once(',') {
                                        images.push(payload.to_string());
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        prompt.push_str(end);
    }
    // The model continues from an assistant turn opener.
    prompt.push_str(&adapter.assistant_start);

    let mut base = request.base;
    base.prompt = prompt;
    if !images.is_empty() {
        base.images = images;
    }
    apply_openai_common(
        &mut base,
        request.max_tokens,
        request.stop,
        request.seed,
        request.ignore_eos,
        request.mirostat_mode,
        request.presence_penalty,
        request.frequency_penalty,
    );
    let mut canonical = base.into_request(default_max_context, quiet);
    canonical.stream = request.stream;
    canonical
}
