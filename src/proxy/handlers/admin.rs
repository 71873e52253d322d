use axum::{
    extract::{Json, State},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::constants::MIN_BCRYPT_COST;
use crate::models::config::generate_local_api_key;
use crate::models::GatewayConfig;
use crate::modules::system::validation::validate_gateway_config;
use crate::proxy::common::utils::constant_time_str_eq;
use crate::proxy::handlers::errors::{
    authentication_error_response, server_error_response, validation_error_response,
};
use crate::proxy::state::AppState;
use crate::proxy::upstream::client::{build_generate_url, GenerateOp};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "currentPassword")]
    pub current_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

fn verify_admin_secret(config: &GatewayConfig, candidate: &str) -> bool {
    if config.admin_secret_is_hashed() {
        bcrypt::verify(candidate, &config.admin_secret).unwrap_or(false)
    } else {
        constant_time_str_eq(candidate, &config.admin_secret)
    }
}

fn hash_admin_secret(plaintext: &str) -> Result<String, String> {
    let cost = bcrypt::DEFAULT_COST.max(MIN_BCRYPT_COST);
    bcrypt::hash(plaintext, cost).map_err(|e| format!("password hashing failed: {}", e))
}

fn sanitized_config(config: &GatewayConfig) -> Value {
    let mut value = serde_json::to_value(config).unwrap_or_else(|_| json!({}));
    if let Some(map) = value.as_object_mut() {
        map.remove("admin_secret");
    }
    value
}

pub async fn handle_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Response {
    let config = state.config.snapshot();

    if !verify_admin_secret(&config, &body.password) {
        tracing::warn!("Admin login rejected");
        return authentication_error_response("invalid password");
    }

    // A bootstrap plaintext secret is upgraded to a hash on first use.
    if !config.admin_secret_is_hashed() {
        match hash_admin_secret(&body.password) {
            Ok(hashed) => {
                if let Err(e) = state
                    .config
                    .update(|cfg| cfg.admin_secret = hashed)
                    .await
                {
                    tracing::error!("Failed to persist upgraded admin secret: {}", e);
                }
            }
            Err(e) => tracing::error!("{}", e),
        }
    }

    let token = state.core.sessions.issue();
    tracing::info!("Admin login succeeded");
    Json(json!({ "token": token })).into_response()
}

pub async fn handle_get_config(State(state): State<AppState>) -> Response {
    Json(sanitized_config(&state.config.snapshot())).into_response()
}

// Merge-patch semantics: provided keys overwrite, absent keys keep their
// current values, and the secrets can only move through their dedicated
// endpoints.
pub async fn handle_put_config(
    State(state): State<AppState>,
    Json(patch): Json<Value>,
) -> Response {
    let Some(patch) = patch.as_object() else {
        return validation_error_response("configuration patch must be a JSON object", None);
    };

    let current = state.config.snapshot();
    let mut merged_value = serde_json::to_value(&*current).unwrap_or_else(|_| json!({}));
    if let Some(target) = merged_value.as_object_mut() {
        for (key, value) in patch {
            if key == "admin_secret" || key == "local_api_key" {
                continue;
            }
            target.insert(key.clone(), value.clone());
        }
    }

    let merged: GatewayConfig = match serde_json::from_value(merged_value) {
        Ok(config) => config,
        Err(e) => {
            return validation_error_response(
                "configuration patch has the wrong shape",
                Some(e.to_string()),
            )
        }
    };

    if let Err(errors) = validate_gateway_config(&merged) {
        let details = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return validation_error_response("configuration rejected", Some(details));
    }

    match state.config.update(|cfg| *cfg = merged).await {
        Ok(updated) => {
            tracing::info!("Configuration updated via admin surface");
            Json(sanitized_config(&updated)).into_response()
        }
        Err(e) => server_error_response(format!("failed to persist configuration: {}", e)),
    }
}

// One minimal generation against the default model; never raises, always
// reports `{connected, status, error}`.
pub async fn handle_test_connection(State(state): State<AppState>) -> Response {
    let config = state.config.snapshot();
    let url = build_generate_url(
        &config.upstream_base_url,
        &config.default_model,
        &config.upstream_api_key,
        GenerateOp::Sync,
    );
    let probe_body = json!({
        "contents": [{"role": "user", "parts": [{"text": "ping"}]}],
        "generationConfig": {"maxOutputTokens": 16}
    });

    match state
        .core
        .upstream
        .generate(&url, &probe_body, GenerateOp::Sync)
        .await
    {
        Ok(response) => {
            let status = response.status().as_u16();
            let connected = response.status().is_success();
            let error = if connected {
                None
            } else {
                Some(
                    response
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(500)
                        .collect::<String>(),
                )
            };
            Json(json!({ "connected": connected, "status": status, "error": error }))
                .into_response()
        }
        Err(e) => Json(json!({
            "connected": false,
            "status": 0,
            "error": e.to_string()
        }))
        .into_response(),
    }
}

pub async fn handle_generate_key(State(state): State<AppState>) -> Response {
    let new_key = generate_local_api_key();
    match state
        .config
        .update(|cfg| cfg.local_api_key = new_key.clone())
        .await
    {
        Ok(_) => {
            tracing::info!("Local API key rotated");
            Json(json!({ "local_api_key": new_key })).into_response()
        }
        Err(e) => server_error_response(format!("failed to persist rotated key: {}", e)),
    }
}

pub async fn handle_change_password(
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> Response {
    let config = state.config.snapshot();

    if !verify_admin_secret(&config, &body.current_password) {
        return authentication_error_response("current password is incorrect");
    }

    if body.new_password.trim().len() < 8 {
        return validation_error_response("new password must be at least 8 characters", None);
    }

    let hashed = match hash_admin_secret(&body.new_password) {
        Ok(hashed) => hashed,
        Err(e) => return server_error_response(e),
    };

    match state.config.update(|cfg| cfg.admin_secret = hashed).await {
        Ok(_) => {
            state.core.sessions.clear_all();
            tracing::info!("Admin password changed, all sessions invalidated");
            Json(json!({ "success": true })).into_response()
        }
        Err(e) => server_error_response(format!("failed to persist new password: {}", e)),
    }
}

// Minimal landing page; the full management UI is deployed separately.
pub async fn handle_index() -> Response {
    Html(concat!(
        "<!doctype html><html><head><title>trestle</title></head>",
        "<body><h1>trestle gateway</h1>",
        "<p>Translation endpoint: <code>POST /v1/messages</code></p>",
        "<p>Health: <code>GET /health</code> &middot; Stats: <code>GET /api/stats</code></p>",
        "</body></html>"
    ))
    .into_response()
}
