//! Text generation handlers for every inbound dialect.
//!
//! Each handler authenticates, translates its wire shape into the canonical
//! request, and funnels through the same admission/run path. Streaming
//! responses split the work in two: a driver task owns the gate permit and
//! runs the blocking generation, while the response body is fed from the
//! engine's token buffer.

use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use tracing::{debug, error};

use grimoire_core::coordinator::{AbortGuard, Admission, GatePermit, token_stream};
use grimoire_core::dialect::{
    BasicGenerationRequest, ChatCompletionRequest, CompletionRequest, KoboldGenerationRequest,
    basic, openai,
};
use grimoire_core::domain::GenerationRequest;

use crate::auth::require_auth;
use crate::models::{Dialect, ErrorResponse, completion_envelope, ok_json, stream_chunk};
use crate::sse::{DONE_FRAME, encode_frame};
use crate::state::AppState;

/// POST /api/v1/generate
pub async fn kobold_generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    match parse::<KoboldGenerationRequest>(&body) {
        Ok(wire) => {
            let request = wire.into_request(state.coordinator.allocated_ctx(), state.config.quiet);
            run_dialect(state, Dialect::Kobold, request, false).await
        }
        Err(bad) => bad,
    }
}

/// POST /api/extra/generate/stream
pub async fn kobold_generate_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    match parse::<KoboldGenerationRequest>(&body) {
        Ok(wire) => {
            let mut request =
                wire.into_request(state.coordinator.allocated_ctx(), state.config.quiet);
            request.stream = true;
            run_dialect(state, Dialect::Kobold, request, true).await
        }
        Err(bad) => bad,
    }
}

/// POST /request (legacy single-field dialect)
pub async fn basic_generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    match parse::<BasicGenerationRequest>(&body) {
        Ok(wire) => {
            let request =
                basic::translate(wire, state.coordinator.allocated_ctx(), state.config.quiet);
            run_dialect(state, Dialect::Basic, request, false).await
        }
        Err(bad) => bad,
    }
}

/// POST /v1/completions
pub async fn oai_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    match parse::<CompletionRequest>(&body) {
        Ok(wire) => {
            let request = openai::translate_completions(
                wire,
                state.coordinator.allocated_ctx(),
                state.config.quiet,
            );
            let streaming = request.stream;
            run_dialect(state, Dialect::OaiCompletions, request, streaming).await
        }
        Err(bad) => bad,
    }
}

/// POST /v1/chat/completions
pub async fn oai_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    match parse::<ChatCompletionRequest>(&body) {
        Ok(wire) => {
            let request = openai::translate_chat(
                wire,
                state.coordinator.allocated_ctx(),
                state.config.quiet,
            );
            let streaming = request.stream;
            run_dialect(state, Dialect::OaiChat, request, streaming).await
        }
        Err(bad) => bad,
    }
}

fn parse<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body).map_err(|err| {
        debug!(%err, "rejecting unparsable generation body");
        ErrorResponse::bad_request("Error parsing input.").into_response()
    })
}

/// Admission plus generation for one translated request.
async fn run_dialect(
    state: AppState,
    dialect: Dialect,
    request: GenerationRequest,
    streaming: bool,
) -> Response {
    let permit = match state.coordinator.admit().await {
        Admission::Admitted(permit) => permit,
        Admission::Rejected => return ErrorResponse::busy().into_response(),
    };

    if streaming {
        return stream_generation(state, permit, dialect, request);
    }

    let text = match state.coordinator.run(permit, request).await {
        Ok(text) => text,
        Err(err) => {
            error!(%err, "generation task failed");
            String::new()
        }
    };
    ok_json(completion_envelope(dialect, &state.config.model_name, text))
}

/// Build the SSE response for an admitted streaming request.
///
/// The driver task carries the permit, so the engine slot is released when
/// the blocking call returns even if the client has gone away. Dropping the
/// body mid-stream trips the abort guard, which cancels the engine; the
/// driver then unblocks and cleans up on its own.
fn stream_generation(
    state: AppState,
    permit: GatePermit,
    dialect: Dialect,
    request: GenerationRequest,
) -> Response {
    let coordinator = Arc::clone(&state.coordinator);
    let engine = Arc::clone(coordinator.engine());
    let model_name = state.config.model_name.clone();

    let driver = tokio::spawn(async move { coordinator.run(permit, request).await });

    let frames = stream! {
        let mut guard = AbortGuard::new(Arc::clone(&engine));
        let tokens = token_stream(engine);
        futures_util::pin_mut!(tokens);
        while let Some(token) = tokens.next().await {
            let payload = stream_chunk(dialect, &model_name, &token);
            yield Ok::<Bytes, Infallible>(encode_frame(dialect, &payload));
        }
        if dialect.wants_done_sentinel() {
            yield Ok(Bytes::from_static(DONE_FRAME));
        }
        guard.disarm();
        // The blocking result stays authoritative even though the tokens
        // already went out; surface its failures in the log.
        match driver.await {
            Ok(Ok(text)) => debug!(chars = text.len(), "stream completed"),
            Ok(Err(err)) => error!(%err, "streamed generation failed"),
            Err(err) => error!(%err, "stream driver task failed"),
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|err| {
            error!(%err, "failed to build streaming response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
}
