//! Bearer-token checks for generation and control endpoints.
//!
//! Metadata reads, interrogation, and image generation stay open even when a
//! password is configured; only endpoints that accept a prompt or steer the
//! engine are protected.

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::models::ErrorResponse;
use crate::state::AppState;

/// Check the `Authorization: Bearer` header against the configured password.
///
/// Returns the ready-to-send 401 response on failure so handlers can use `?`
/// style early returns via `match`.
pub fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = state.config.password.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err(ErrorResponse::unauthorized().into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ServerConfig, ServerContext};
    use axum::http::StatusCode;
    use grimoire_core::Coordinator;
    use grimoire_core::testing::StubEngine;
    use std::sync::Arc;

    fn state_with_password(password: Option<&str>) -> AppState {
        let coordinator = Arc::new(Coordinator::new(Arc::new(StubEngine::echoing()), 1, 2048));
        let config = ServerConfig {
            password: password.map(String::from),
            ..Default::default()
        };
        Arc::new(ServerContext::new(coordinator, None, config))
    }

    fn headers_with(token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                axum::http::header::AUTHORIZATION,
                format!("Bearer {token}").parse().unwrap(),
            );
        }
        headers
    }

    #[test]
    fn open_server_accepts_anything() {
        let state = state_with_password(None);
        assert!(require_auth(&state, &headers_with(None)).is_ok());
        assert!(require_auth(&state, &headers_with(Some("whatever"))).is_ok());
    }

    #[test]
    fn wrong_or_missing_token_is_unauthorized() {
        let state = state_with_password(Some("sekrit"));
        let missing = require_auth(&state, &headers_with(None)).unwrap_err();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        let wrong = require_auth(&state, &headers_with(Some("nope"))).unwrap_err();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn correct_token_passes() {
        let state = state_with_password(Some("sekrit"));
        assert!(require_auth(&state, &headers_with(Some("sekrit"))).is_ok());
    }
}
