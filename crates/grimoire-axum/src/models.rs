//! Wire response envelopes and error bodies.
//!
//! Response shapes are part of the compatibility surface: field names,
//! placeholder ids, and the fixed usage block are all load-bearing for
//! existing clients, so they are built here in one place.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};

/// Inbound dialect of a generation request; decides the response envelope
/// and the streaming frame shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Basic,
    Kobold,
    OaiCompletions,
    OaiChat,
}

impl Dialect {
    /// Whether the dialect terminates its event stream with a `[DONE]`
    /// sentinel frame.
    #[must_use]
    pub const fn wants_done_sentinel(self) -> bool {
        matches!(self, Self::OaiCompletions | Self::OaiChat)
    }
}

/// Error body in the `{"detail": {...}}` shape clients expect.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: Value,
}

impl ErrorResponse {
    /// 503 returned when admission is refused.
    #[must_use]
    pub fn busy() -> (StatusCode, Json<Self>) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Self {
                detail: json!({
                    "msg": "Server is busy; please try again later.",
                    "type": "service_unavailable",
                }),
            }),
        )
    }

    /// 401 returned when the bearer token is missing or wrong.
    #[must_use]
    pub fn unauthorized() -> (StatusCode, Json<Self>) {
        (
            StatusCode::UNAUTHORIZED,
            Json(Self {
                detail: json!({
                    "error": "Unauthorized",
                    "msg": "Authentication key is missing or invalid.",
                    "type": "unauthorized",
                }),
            }),
        )
    }

    /// 400 for an unreadable request body.
    pub fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self {
                detail: json!({
                    "msg": msg.into(),
                    "type": "bad_request",
                }),
            }),
        )
    }

    /// 503 for endpoints whose backing model is not loaded.
    pub fn not_loaded(msg: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Self {
                detail: json!({
                    "msg": msg.into(),
                    "type": "service_unavailable",
                }),
            }),
        )
    }
}

/// Final (non-streamed) envelope for a completed generation.
#[must_use]
pub fn completion_envelope(dialect: Dialect, model_name: &str, text: String) -> Value {
    match dialect {
        Dialect::Basic => json!({"data": {"seqs": [text]}}),
        Dialect::Kobold => json!({"results": [{"text": text}]}),
        Dialect::OaiCompletions => json!({
            "id": "cmpl-1",
            "object": "text_completion",
            "created": 1,
            "model": model_name,
            "usage": {"prompt_tokens": 100, "completion_tokens": 100, "total_tokens": 200},
            "choices": [{"text": text, "index": 0, "finish_reason": "length"}],
        }),
        Dialect::OaiChat => json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": model_name,
            "usage": {"prompt_tokens": 100, "completion_tokens": 100, "total_tokens": 200},
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": text},
                "finish_reason": "length",
            }],
        }),
    }
}

/// One streamed chunk payload (the JSON inside the SSE frame).
#[must_use]
pub fn stream_chunk(dialect: Dialect, model_name: &str, token: &str) -> Value {
    match dialect {
        Dialect::OaiChat => json!({
            "id": "grimoire",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": model_name,
            "choices": [{
                "index": 0,
                "finish_reason": "length",
                "delta": {"role": "assistant", "content": token},
            }],
        }),
        Dialect::OaiCompletions => json!({
            "id": "grimoire",
            "object": "text_completion",
            "created": 1,
            "model": model_name,
            "choices": [{"index": 0, "finish_reason": "length", "text": token}],
        }),
        Dialect::Basic | Dialect::Kobold => json!({"token": token}),
    }
}

/// Abort / check style `{"success", "done"}` body, with string booleans for
/// compatibility.
#[must_use]
pub fn success_done(success: bool, done: bool) -> Json<Value> {
    let s = |b: bool| if b { "true" } else { "false" };
    Json(json!({"success": s(success), "done": s(done)}))
}

/// Wrap a value into an axum 200 JSON response.
pub fn ok_json(value: Value) -> Response {
    Json(value).into_response()
}
