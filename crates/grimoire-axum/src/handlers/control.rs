//! Control endpoints: abort, progress checks, token counting.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tracing::warn;

use grimoire_core::coordinator::AbortOutcome;
use grimoire_core::domain::GenKey;

use crate::auth::require_auth;
use crate::models::{ok_json, success_done};
use crate::state::AppState;

/// Pull a `genkey` out of a possibly-malformed JSON body. Unreadable bodies
/// degrade to the empty key rather than an error, matching clients that send
/// no body at all.
fn genkey_from(body: &Bytes) -> GenKey {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("genkey").and_then(Value::as_str).map(GenKey::from))
        .unwrap_or_else(GenKey::none)
}

/// POST /api/extra/abort
pub async fn abort(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    let genkey = genkey_from(&body);
    let outcome = state.coordinator.abort(&genkey);

    // Give an accepted abort a moment to take effect before replying.
    let (success, done) = match outcome {
        AbortOutcome::Accepted { hit } => {
            tokio::time::sleep(Duration::from_millis(100)).await;
            (hit, true)
        }
        AbortOutcome::Deferred => (true, false),
        AbortOutcome::Rejected => (false, false),
    };
    success_done(success, done).into_response()
}

/// GET /api/extra/generate/check
///
/// Keyless polling only answers when nothing is queued and no keyed job
/// holds the engine, so one client can never read another's output.
pub async fn check_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    let coordinator = &state.coordinator;
    let answerable = coordinator.gate().waiting() == 0
        && coordinator.total_requests() > 0
        && coordinator.cancel().current().is_none();

    let text = if answerable {
        coordinator.engine().pending_output()
    } else {
        String::new()
    };
    ok_json(json!({"results": [{"text": text}]}))
}

/// POST /api/extra/generate/check
///
/// Keyed polling answers only the owner of the running generation; the
/// legacy keyless form additionally requires an empty queue.
pub async fn check_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    let genkey = genkey_from(&body);
    let coordinator = &state.coordinator;
    let current = coordinator.cancel().current();

    let matches_current = genkey == current;
    let answerable = coordinator.total_requests() > 0
        && ((genkey.is_none() && matches_current && coordinator.gate().waiting() == 0)
            || (!genkey.is_none() && matches_current));

    let text = if answerable {
        coordinator.engine().pending_output()
    } else {
        String::new()
    };
    ok_json(json!({"results": [{"text": text}]}))
}

/// POST /api/extra/tokencount
pub async fn tokencount(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = require_auth(&state, &headers) {
        return denied;
    }
    let Ok(value) = serde_json::from_slice::<Value>(&body) else {
        warn!("tokencount received an unreadable body");
        return (StatusCode::BAD_REQUEST, ok_json(json!({"value": -1}))).into_response();
    };
    let prompt = value
        .get("prompt")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let engine = Arc::clone(state.coordinator.engine());
    match tokio::task::spawn_blocking(move || engine.token_count(&prompt)).await {
        Ok(ids) => ok_json(json!({"value": ids.len(), "ids": ids})),
        Err(err) => {
            warn!(%err, "tokenization task failed");
            (StatusCode::BAD_REQUEST, ok_json(json!({"value": -1}))).into_response()
        }
    }
}
