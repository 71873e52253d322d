use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::proxy::common::utils::constant_time_str_eq;
use crate::proxy::handlers::errors::authentication_error_response;
use crate::proxy::state::AppState;

fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or(Some(s)))
        .or_else(|| {
            request
                .headers()
                .get("x-api-key")
                .and_then(|h| h.to_str().ok())
        })
}

// Translation clients present the local API key as a bearer token.
pub async fn client_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.config.snapshot().local_api_key.clone();

    if expected.is_empty() {
        tracing::error!("Local API key is empty; denying request");
        return authentication_error_response("gateway has no local API key configured");
    }

    match bearer_token(&request) {
        Some(provided) if constant_time_str_eq(provided, &expected) => next.run(request).await,
        Some(_) => authentication_error_response("invalid API key"),
        None => authentication_error_response("missing Authorization bearer token"),
    }
}

// Admin routes carry a short-lived session token issued by login.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get("x-session-token")
        .and_then(|h| h.to_str().ok());

    match token {
        Some(token) if state.core.sessions.validate(token) => next.run(request).await,
        Some(_) => authentication_error_response("session expired or unknown"),
        None => authentication_error_response("missing x-session-token header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_header(name: &str, value: &str) -> Request {
        Request::builder()
            .uri("/v1/messages")
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let req = request_with_header("Authorization", "Bearer sk-local");
        assert_eq!(bearer_token(&req), Some("sk-local"));
    }

    #[test]
    fn bare_authorization_value_is_accepted() {
        let req = request_with_header("Authorization", "sk-local");
        assert_eq!(bearer_token(&req), Some("sk-local"));
    }

    #[test]
    fn x_api_key_is_a_fallback() {
        let req = request_with_header("x-api-key", "sk-local");
        assert_eq!(bearer_token(&req), Some("sk-local"));
    }

    #[test]
    fn absent_credentials_return_none() {
        let req = Request::builder()
            .uri("/v1/messages")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), None);
    }
}
