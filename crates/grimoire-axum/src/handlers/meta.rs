//! Read-only metadata endpoints. None of these require authentication.

use axum::extract::State;
use axum::response::Response;
use serde_json::json;

use crate::models::ok_json;
use crate::state::AppState;

/// Kobold API protocol version reported on the versioned info endpoint.
const KAI_PROTOCOL_VERSION: &str = "1.2.5";

/// GET /
pub async fn root() -> &'static str {
    "grimoire is running! For API usage, see /api or /v1."
}

/// GET /api/v1/model
pub async fn model(State(state): State<AppState>) -> Response {
    ok_json(json!({"result": state.config.model_name}))
}

/// GET /api/v1/info/version
pub async fn info_version() -> Response {
    ok_json(json!({"result": KAI_PROTOCOL_VERSION}))
}

/// GET /api/extra/version
pub async fn extra_version(State(state): State<AppState>) -> Response {
    ok_json(json!({
        "result": "grimoire",
        "version": env!("CARGO_PKG_VERSION"),
        "protected": state.config.password.is_some(),
        "txt2img": state.image_engine.is_some(),
        "vision": state.config.vision,
    }))
}

/// GET /api/v1/config/max_length
pub async fn config_max_length(State(state): State<AppState>) -> Response {
    ok_json(json!({"value": state.config.max_length}))
}

/// GET /api/v1/config/max_context_length
///
/// Advertises the *configured* budget, never the allocation; remote workers
/// size their payloads from this.
pub async fn config_max_context_length(State(state): State<AppState>) -> Response {
    ok_json(json!({"value": state.advertised_max_context()}))
}

/// GET /api/extra/true_max_context_length
pub async fn true_max_context_length(State(state): State<AppState>) -> Response {
    ok_json(json!({"value": state.coordinator.allocated_ctx()}))
}

/// GET /api/v1/config/soft_prompt
pub async fn config_soft_prompt() -> Response {
    ok_json(json!({"value": ""}))
}

/// GET /api/v1/config/soft_prompts_list
pub async fn config_soft_prompts_list() -> Response {
    ok_json(json!({"values": []}))
}

/// GET /api/extra/perf
pub async fn perf(State(state): State<AppState>) -> Response {
    let telemetry = state.coordinator.engine().telemetry();
    ok_json(json!({
        "last_process": telemetry.last_process_ms,
        "last_eval": telemetry.last_eval_ms,
        "last_token_count": telemetry.last_token_count,
        "last_seed": telemetry.last_seed,
        "total_gens": telemetry.total_gens,
        "stop_reason": telemetry.last_stop_reason,
        "queue": state.coordinator.gate().waiting(),
        "idle": i32::from(!state.coordinator.gate().is_busy()),
        "hordeexitcounter": state.horde_exit_level(),
        "uptime": state.uptime_secs(),
    }))
}

/// GET /v1/models
pub async fn oai_models(State(state): State<AppState>) -> Response {
    ok_json(json!({
        "object": "list",
        "data": [{
            "id": state.config.model_name,
            "object": "model",
            "created": 1,
            "owned_by": "grimoire",
            "permission": [],
            "root": "grimoire",
        }],
    }))
}
