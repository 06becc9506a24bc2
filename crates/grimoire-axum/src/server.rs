//! Axum HTTP server for the generation API.
//!
//! This module provides the `serve()` function that runs the API server
//! using a pre-bound TcpListener, plus the router constructor used by tests.

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{control, generate, image, meta};
use crate::state::AppState;

/// Build the full route table over shared state.
///
/// The kobold surface answers under both `/api/v1` and `/api/latest`, which
/// older clients still use interchangeably.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(meta::root))
        .route("/api/v1/model", get(meta::model))
        .route("/api/latest/model", get(meta::model))
        .route("/api/v1/info/version", get(meta::info_version))
        .route("/api/latest/info/version", get(meta::info_version))
        .route("/api/v1/config/max_length", get(meta::config_max_length))
        .route("/api/latest/config/max_length", get(meta::config_max_length))
        .route(
            "/api/v1/config/max_context_length",
            get(meta::config_max_context_length),
        )
        .route(
            "/api/latest/config/max_context_length",
            get(meta::config_max_context_length),
        )
        .route("/api/v1/config/soft_prompt", get(meta::config_soft_prompt))
        .route(
            "/api/v1/config/soft_prompts_list",
            get(meta::config_soft_prompts_list),
        )
        .route(
            "/api/extra/true_max_context_length",
            get(meta::true_max_context_length),
        )
        .route("/api/extra/version", get(meta::extra_version))
        .route("/api/extra/perf", get(meta::perf))
        .route("/v1/models", get(meta::oai_models))
        .route("/api/v1/generate", post(generate::kobold_generate))
        .route("/api/latest/generate", post(generate::kobold_generate))
        .route(
            "/api/extra/generate/stream",
            post(generate::kobold_generate_stream),
        )
        .route("/request", post(generate::basic_generate))
        .route("/v1/completions", post(generate::oai_completions))
        .route("/v1/chat/completions", post(generate::oai_chat))
        .route("/api/extra/abort", post(control::abort))
        .route(
            "/api/extra/generate/check",
            get(control::check_get).post(control::check_post),
        )
        .route("/api/extra/tokencount", post(control::tokencount))
        .route("/sdapi/v1/interrogate", post(image::interrogate_image))
        .route("/sdapi/v1/txt2img", post(image::generate_image))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server with a pre-bound listener.
///
/// Runs until the cancellation token is triggered, then shuts down
/// gracefully. Marks the coordinator ready once the router is up so the
/// embedded Horde worker can start polling.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("API server starting on {addr}");

    let coordinator = state.coordinator.clone();
    let app = router(state);

    coordinator.mark_ready();
    info!("Serving on http://{addr}/ (kobold, OpenAI, and sdapi surfaces)");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("API server shut down");
    Ok(())
}
