//! End-to-end router tests over an in-memory engine.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use grimoire_axum::{ServerConfig, ServerContext, router};
use grimoire_core::Coordinator;
use grimoire_core::coordinator::Admission;
use grimoire_core::testing::StubEngine;

fn app_with(engine: StubEngine, multiuser_limit: u32, config: ServerConfig) -> (Router, Arc<Coordinator>) {
    let coordinator = Arc::new(Coordinator::new(Arc::new(engine), multiuser_limit, 2048));
    let state = Arc::new(ServerContext::new(coordinator.clone(), None, config));
    (router(state), coordinator)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn model_endpoint_reports_friendly_name() {
    let config = ServerConfig {
        model_name: "test-model-7b".into(),
        ..Default::default()
    };
    let (app, _) = app_with(StubEngine::echoing(), 1, config);

    let response = app.oneshot(get("/api/v1/model")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"result": "test-model-7b"}));
}

#[tokio::test]
async fn kobold_generate_returns_results_envelope() {
    let (app, _) = app_with(
        StubEngine::completing_with("once upon a time"),
        1,
        ServerConfig::default(),
    );

    let response = app
        .oneshot(post_json("/api/v1/generate", json!({"prompt": "story:"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"results": [{"text": "once upon a time"}]})
    );
}

#[tokio::test]
async fn busy_server_answers_with_legacy_503_body() {
    let (app, coordinator) = app_with(StubEngine::echoing(), 0, ServerConfig::default());

    // Hold the engine slot; with no wait queue the next request bounces.
    let Admission::Admitted(_permit) = coordinator.admit().await else {
        panic!("expected admission");
    };

    let response = app
        .oneshot(post_json("/api/v1/generate", json!({"prompt": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(
        body["detail"]["msg"],
        "Server is busy; please try again later."
    );
    assert_eq!(body["detail"]["type"], "service_unavailable");
}

#[tokio::test]
async fn generation_requires_token_but_metadata_stays_open() {
    let config = ServerConfig {
        password: Some("hunter2".into()),
        ..Default::default()
    };
    let (app, _) = app_with(StubEngine::echoing(), 1, config);

    let denied = app
        .clone()
        .oneshot(post_json("/api/v1/generate", json!({"prompt": "hi"})))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(denied).await;
    assert_eq!(body["detail"]["error"], "Unauthorized");

    let open = app.oneshot(get("/api/v1/model")).await.unwrap();
    assert_eq!(open.status(), StatusCode::OK);

    let config = ServerConfig {
        password: Some("hunter2".into()),
        ..Default::default()
    };
    let (app, _) = app_with(StubEngine::completing_with("ok"), 1, config);
    let allowed = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer hunter2")
                .body(Body::from(json!({"prompt": "hi"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn abort_with_no_job_running_still_succeeds() {
    let (app, _) = app_with(StubEngine::echoing(), 1, ServerConfig::default());

    let response = app
        .oneshot(post_json("/api/extra/abort", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    // Nothing was running, so the abort lands but reports a miss or hit
    // depending on engine state; done is always terminal here.
    assert_eq!(body["done"], "true");
}

#[tokio::test]
async fn check_leaks_nothing_before_first_generation() {
    let (app, _) = app_with(
        StubEngine::completing_with("secret partial output"),
        1,
        ServerConfig::default(),
    );

    let response = app.oneshot(get("/api/extra/generate/check")).await.unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"results": [{"text": ""}]})
    );
}

#[tokio::test]
async fn keyed_check_rejects_a_stranger_key() {
    let (app, coordinator) = app_with(
        StubEngine::completing_with("private"),
        2,
        ServerConfig::default(),
    );

    // Run one keyed generation to completion.
    let Admission::Admitted(permit) = coordinator.admit().await else {
        panic!("expected admission");
    };
    let request = grimoire_core::GenerationRequest {
        prompt: "p".into(),
        max_length: 8,
        max_context_length: 512,
        genkey: "KCPP1234".into(),
        ..Default::default()
    };
    coordinator.run(permit, request).await.unwrap();

    let stranger = app
        .clone()
        .oneshot(post_json(
            "/api/extra/generate/check",
            json!({"genkey": "KCPP9999"}),
        ))
        .await
        .unwrap();
    assert_eq!(
        body_json(stranger).await,
        json!({"results": [{"text": ""}]})
    );

    let owner = app
        .oneshot(post_json(
            "/api/extra/generate/check",
            json!({"genkey": "KCPP1234"}),
        ))
        .await
        .unwrap();
    assert_eq!(
        body_json(owner).await,
        json!({"results": [{"text": "private"}]})
    );
}

#[tokio::test]
async fn tokencount_reports_ids_and_rejects_bad_bodies() {
    let (app, _) = app_with(StubEngine::echoing(), 1, ServerConfig::default());

    let counted = app
        .clone()
        .oneshot(post_json("/api/extra/tokencount", json!({"prompt": "abc"})))
        .await
        .unwrap();
    let body = body_json(counted).await;
    assert_eq!(body["value"], 3);
    assert_eq!(body["ids"].as_array().unwrap().len(), 3);

    let bad = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/extra/tokencount")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(bad).await, json!({"value": -1}));
}

#[tokio::test]
async fn oai_completions_envelope_matches_contract() {
    let config = ServerConfig {
        model_name: "test-model".into(),
        ..Default::default()
    };
    let (app, _) = app_with(StubEngine::completing_with("done"), 1, config);

    let response = app
        .oneshot(post_json("/v1/completions", json!({"prompt": "go"})))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["id"], "cmpl-1");
    assert_eq!(body["object"], "text_completion");
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["choices"][0]["text"], "done");
    assert_eq!(body["choices"][0]["finish_reason"], "length");
    assert_eq!(body["usage"]["total_tokens"], 200);
}

#[tokio::test]
async fn kobold_stream_frames_tokens_as_message_events() {
    let (app, _) = app_with(
        StubEngine::completing_with("hello"),
        1,
        ServerConfig::default(),
    );

    let response = app
        .oneshot(post_json(
            "/api/extra/generate/stream",
            json!({"prompt": "hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("event: message\n"));
    assert!(text.contains(r#"data: {"token":"hello"}"#));
    assert!(!text.contains("[DONE]"));
}

#[tokio::test]
async fn oai_stream_terminates_with_done_sentinel() {
    let (app, _) = app_with(
        StubEngine::completing_with("hi"),
        1,
        ServerConfig::default(),
    );

    let response = app
        .oneshot(post_json(
            "/v1/completions",
            json!({"prompt": "go", "stream": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#""object":"text_completion""#));
    assert!(text.ends_with("data: [DONE]"));
}

#[tokio::test]
async fn txt2img_without_image_backend_is_unavailable() {
    let (app, _) = app_with(StubEngine::echoing(), 1, ServerConfig::default());

    let response = app
        .oneshot(post_json("/sdapi/v1/txt2img", json!({"prompt": "a cat"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn perf_endpoint_reports_queue_and_idle() {
    let (app, coordinator) = app_with(StubEngine::echoing(), 2, ServerConfig::default());

    let idle = app.clone().oneshot(get("/api/extra/perf")).await.unwrap();
    let body = body_json(idle).await;
    assert_eq!(body["idle"], 1);
    assert_eq!(body["queue"], 0);

    let Admission::Admitted(_permit) = coordinator.admit().await else {
        panic!("expected admission");
    };
    let busy = app.oneshot(get("/api/extra/perf")).await.unwrap();
    assert_eq!(body_json(busy).await["idle"], 0);
}
