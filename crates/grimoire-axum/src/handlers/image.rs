//! Image endpoints: captioning and text-to-image.
//!
//! Both share the engine gate with text generation, so a busy server answers
//! them with the same 503 body. Neither is password-protected.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error};

use grimoire_core::coordinator::Admission;
use grimoire_core::dialect::{InterrogateRequest, Txt2ImgRequest, interrogate, txt2img};

use crate::models::{ErrorResponse, ok_json};
use crate::state::{AppState, IMAGE_RES_LIMIT};

/// POST /sdapi/v1/interrogate
pub async fn interrogate_image(State(state): State<AppState>, body: Bytes) -> Response {
    if !state.config.vision {
        return ErrorResponse::not_loaded("No LLaVA model loaded").into_response();
    }
    let Ok(wire) = serde_json::from_slice::<InterrogateRequest>(&body) else {
        return ErrorResponse::bad_request("Error parsing input.").into_response();
    };
    let request =
        interrogate::translate(wire, state.coordinator.allocated_ctx(), state.config.quiet);

    let permit = match state.coordinator.admit().await {
        Admission::Admitted(permit) => permit,
        Admission::Rejected => return ErrorResponse::busy().into_response(),
    };
    let text = match state.coordinator.run(permit, request).await {
        Ok(text) => text,
        Err(err) => {
            error!(%err, "caption generation failed");
            String::new()
        }
    };
    ok_json(json!({"caption": interrogate::end_trim_to_sentence(&text)}))
}

/// POST /sdapi/v1/txt2img
pub async fn generate_image(State(state): State<AppState>, body: Bytes) -> Response {
    let Some(engine) = state.image_engine.clone() else {
        return ErrorResponse::not_loaded("No image model loaded.").into_response();
    };
    let Ok(wire) = serde_json::from_slice::<Txt2ImgRequest>(&body) else {
        return ErrorResponse::bad_request("Error parsing input.").into_response();
    };
    let inputs = txt2img::translate(wire, IMAGE_RES_LIMIT, state.config.quiet);

    let permit = match state.coordinator.admit().await {
        Admission::Admitted(permit) => permit,
        Admission::Rejected => return ErrorResponse::busy().into_response(),
    };
    let outputs = match tokio::task::spawn_blocking(move || engine.generate(&inputs)).await {
        Ok(outputs) => outputs,
        Err(err) => {
            error!(%err, "image generation task failed");
            drop(permit);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    drop(permit);

    // A failed render still answers with the standard envelope; the image
    // payload is just empty.
    let data = if outputs.ok {
        outputs.data
    } else {
        String::new()
    };
    debug!(bytes = data.len(), "image generation finished");
    ok_json(json!({"images": [data], "parameters": {}, "info": ""}))
}
