use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

// All client-visible failures share one envelope:
// {"type":"error","error":{"type","message","details","hint"}}.
pub fn error_envelope(
    kind: &str,
    message: impl Into<String>,
    details: Option<String>,
    hint: Option<String>,
) -> Value {
    let mut error = json!({
        "type": kind,
        "message": message.into(),
    });
    if let Some(details) = details {
        error["details"] = json!(details);
    }
    if let Some(hint) = hint {
        error["hint"] = json!(hint);
    }

    json!({ "type": "error", "error": error })
}

pub fn error_response(
    status: StatusCode,
    kind: &str,
    message: impl Into<String>,
    details: Option<String>,
    hint: Option<String>,
) -> Response {
    (status, Json(error_envelope(kind, message, details, hint))).into_response()
}

pub fn authentication_error_response(message: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "authentication_error",
        message,
        None,
        None,
    )
}

pub fn validation_error_response(message: impl Into<String>, details: Option<String>) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "validation_error",
        message,
        details,
        None,
    )
}

pub fn translation_error_response(message: impl Into<String>) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "translation_error",
        message,
        None,
        None,
    )
}

pub fn map_upstream_status(status: u16) -> &'static str {
    match status {
        400 => "invalid_request_error",
        401 => "authentication_error",
        403 => "permission_error",
        429 => "rate_limit_error",
        500 => "api_error",
        503 => "overloaded_error",
        _ => "api_error",
    }
}

fn upstream_hint(kind: &str) -> Option<String> {
    match kind {
        "authentication_error" | "permission_error" => {
            Some("check the upstream API key in the gateway configuration".to_string())
        }
        "rate_limit_error" => Some("reduce request rate or raise the upstream quota".to_string()),
        "overloaded_error" => Some("the upstream is temporarily unavailable; retry".to_string()),
        _ => None,
    }
}

// Upstream failure bodies are carried as `details`, never replayed verbatim
// as the gateway's own reply.
pub fn upstream_error_response(upstream_status: u16, body: &str) -> Response {
    let kind = map_upstream_status(upstream_status);
    error_response(
        StatusCode::BAD_GATEWAY,
        kind,
        format!("upstream rejected the request with status {}", upstream_status),
        Some(body.to_string()),
        upstream_hint(kind),
    )
}

pub fn upstream_network_error_response(error: &reqwest::Error) -> Response {
    if error.is_timeout() {
        return error_response(
            StatusCode::GATEWAY_TIMEOUT,
            "timeout_error",
            "upstream did not answer within the 60s deadline",
            None,
            None,
        );
    }

    error_response(
        StatusCode::BAD_GATEWAY,
        "api_error",
        format!("failed to reach upstream: {}", error),
        None,
        Some("verify the upstream base URL and network connectivity".to_string()),
    )
}

pub fn upstream_shape_error_response(message: impl Into<String>) -> Response {
    error_response(
        StatusCode::BAD_GATEWAY,
        "upstream_error",
        message,
        None,
        None,
    )
}

pub fn server_error_response(message: impl Into<String>) -> Response {
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "server_error",
        message,
        None,
        None,
    )
}
