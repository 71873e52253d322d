use axum::{
    body::Body,
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::constants::UPSTREAM_REQUEST_TIMEOUT_SECS;
use crate::proxy::cache::fingerprint;
use crate::proxy::classifier::classify;
use crate::proxy::handlers::errors::{
    error_response, server_error_response, translation_error_response, upstream_error_response,
    upstream_network_error_response, upstream_shape_error_response,
};
use crate::proxy::mappers::claude::{
    create_claude_sse_stream, merge_consecutive_messages, transform_claude_request_in,
    transform_response, ClaudeRequest, ClaudeSseStreamInput, GeminiResponse,
};
use crate::proxy::state::AppState;
use crate::proxy::upstream::client::{build_generate_url, resolve_model, GenerateOp};

fn generate_trace_id() -> String {
    crate::proxy::common::utils::generate_random_id(6).to_lowercase()
}

// The translation endpoint. Auth has already run in middleware; from here:
// classify, consult the cache, wait for a dispatch slot, translate, forward,
// and translate the reply back.
pub async fn handle_messages(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let trace_id = generate_trace_id();

    let request: ClaudeRequest = match serde_json::from_value(body.clone()) {
        Ok(request) => request,
        Err(e) => {
            state.core.monitor.record_error();
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                format!("invalid request body: {}", e),
                None,
                None,
            );
        }
    };

    let class = classify(&request);
    state.core.monitor.record_request(class);

    let config = state.config.snapshot();
    let is_streaming = request.is_streaming();
    let model = resolve_model(request.model.as_deref(), &config.default_model).to_string();

    tracing::info!(
        "[{}] {} request, model={}, stream={}, messages={}",
        trace_id,
        class.as_str(),
        model,
        is_streaming,
        request.messages.len()
    );

    // Auxiliary prompts travel without the tool catalog.
    let mut outbound = request.clone();
    if class.strips_tools() {
        if outbound.tools.is_some() {
            tracing::debug!("[{}] Stripping tool catalog for {} request", trace_id, class.as_str());
        }
        outbound.tools = None;
        outbound.tool_choice = None;
    }

    let request_fingerprint = fingerprint(&body);
    if !is_streaming {
        if let Some(cached) = state.core.cache.get(&request_fingerprint) {
            state.core.monitor.record_cached_response();
            tracing::info!("[{}] Cache hit", trace_id);
            return ([("X-Cache", "HIT")], Json(cached)).into_response();
        }
    }

    // Translate before dispatch so a bad request never burns a queue slot.
    merge_consecutive_messages(&mut outbound.messages);
    let gemini_body = match transform_claude_request_in(&outbound) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("[{}] Translation failed: {}", trace_id, e);
            state.core.monitor.record_error();
            return translation_error_response(e);
        }
    };

    let op = if is_streaming {
        GenerateOp::Stream
    } else {
        GenerateOp::Sync
    };
    let url = build_generate_url(
        &config.upstream_base_url,
        &model,
        &config.upstream_api_key,
        op,
    );

    let permit = state.core.queue.admit().await;

    let send_result = match op {
        GenerateOp::Sync => state.core.upstream.generate(&url, &gemini_body, op).await,
        // The sync path times out inside reqwest; for streams only the wait
        // for response headers is bounded here.
        GenerateOp::Stream => {
            match tokio::time::timeout(
                std::time::Duration::from_secs(UPSTREAM_REQUEST_TIMEOUT_SECS),
                state.core.upstream.generate(&url, &gemini_body, op),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => {
                    state.core.monitor.record_error();
                    return error_response(
                        StatusCode::GATEWAY_TIMEOUT,
                        "timeout_error",
                        "upstream did not answer within the 60s deadline",
                        None,
                        None,
                    );
                }
            }
        }
    };

    let upstream_response = match send_result {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("[{}] Upstream dispatch failed: {}", trace_id, e);
            state.core.monitor.record_error();
            return upstream_network_error_response(&e);
        }
    };

    let status = upstream_response.status();
    if !status.is_success() {
        let body_text = upstream_response.text().await.unwrap_or_default();
        tracing::warn!(
            "[{}] Upstream returned {}: {}",
            trace_id,
            status,
            body_text.chars().take(200).collect::<String>()
        );
        state.core.monitor.record_error();
        return upstream_error_response(status.as_u16(), &body_text);
    }

    if is_streaming {
        let stream = create_claude_sse_stream(ClaudeSseStreamInput {
            gemini_stream: Box::pin(upstream_response.bytes_stream()),
            trace_id,
            requested_model: model,
            permit: Some(permit),
        });

        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(Body::from_stream(stream))
            .unwrap_or_else(|e| server_error_response(format!("stream assembly failed: {}", e)));
    }

    let bytes = match upstream_response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            state.core.monitor.record_error();
            return upstream_network_error_response(&e);
        }
    };
    drop(permit);

    let gemini_response: GeminiResponse = match serde_json::from_slice(&bytes) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("[{}] Upstream reply is not valid JSON: {}", trace_id, e);
            state.core.monitor.record_error();
            return error_response(
                StatusCode::BAD_GATEWAY,
                "api_error",
                format!("upstream returned a malformed reply: {}", e),
                None,
                None,
            );
        }
    };

    let claude_response = match transform_response(&gemini_response, &model) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("[{}] {}", trace_id, e);
            state.core.monitor.record_error();
            return upstream_shape_error_response(e);
        }
    };

    let response_json = match serde_json::to_value(&claude_response) {
        Ok(value) => value,
        Err(e) => {
            state.core.monitor.record_error();
            return server_error_response(format!("response serialisation failed: {}", e));
        }
    };

    state
        .core
        .cache
        .insert(request_fingerprint, response_json.clone());
    tracing::info!(
        "[{}] Completed | In: {} tokens | Out: {} tokens",
        trace_id,
        claude_response.usage.input_tokens,
        claude_response.usage.output_tokens
    );

    ([("X-Cache", "MISS")], Json(response_json)).into_response()
}
