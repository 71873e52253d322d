// Cross-component scenarios: classifier + translator + cache + admin flows
// wired the way the controller wires them.

use crate::models::GatewayConfig;
use crate::proxy::cache::{fingerprint, ResponseCache};
use crate::proxy::classifier::{classify, RequestClass};
use crate::proxy::handlers::admin::{
    handle_change_password, handle_login, ChangePasswordRequest, LoginRequest,
};
use crate::proxy::mappers::claude::{
    transform_claude_request_in, transform_response, ClaudeRequest, GeminiResponse, ResponseBlock,
};
use crate::proxy::state::AppState;
use crate::test_utils::{lock_env, ScopedEnvVar};
use axum::extract::{Json, State};
use serde_json::{json, Value};

fn parse_request(value: Value) -> ClaudeRequest {
    serde_json::from_value(value).unwrap()
}

async fn response_json(response: axum::response::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        json!(null)
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[test]
fn title_request_is_stripped_before_translation() {
    let request = parse_request(json!({
        "messages": [{
            "role": "user",
            "content": "Please write a 5-10 word title for this conversation: ..."
        }],
        "tools": [
            {"name": "read_file"}, {"name": "write_file"}, {"name": "run_tests"}
        ]
    }));

    let class = classify(&request);
    assert_eq!(class, RequestClass::Title);

    // The controller forwards a stripped shallow copy.
    let mut outbound = request.clone();
    if class.strips_tools() {
        outbound.tools = None;
        outbound.tool_choice = None;
    }

    let body = transform_claude_request_in(&outbound).unwrap();
    assert!(body.get("tools").is_none());
    assert!(body.get("toolConfig").is_none());
}

#[test]
fn tool_use_round_trip_across_two_turns() {
    // Turn 1: the client asks, upstream answers with a function call.
    let upstream_reply: GeminiResponse = serde_json::from_value(json!({
        "candidates": [{
            "content": {"parts": [{
                "functionCall": {"name": "get_weather", "args": {"city": "Paris"}}
            }]},
            "finishReason": "STOP"
        }]
    }))
    .unwrap();
    let assistant_message = transform_response(&upstream_reply, "gemini-2.5-flash").unwrap();
    let ResponseBlock::ToolUse { id, name, input } = &assistant_message.content[0] else {
        panic!("expected tool_use block");
    };
    assert_eq!(name, "get_weather");
    assert_eq!(input["city"], "Paris");

    // Turn 2: the client echoes the tool_use and adds its result.
    let follow_up = parse_request(json!({
        "messages": [
            {"role": "user", "content": "get weather for Paris"},
            {"role": "assistant", "content": [
                {"type": "tool_use", "id": id, "name": "get_weather",
                 "input": {"city": "Paris"}}
            ]},
            {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": id, "content": "sunny"}
            ]}
        ],
        "tools": [{"name": "get_weather", "input_schema": {"type": "object", "properties": {}}}]
    }));

    let body = transform_claude_request_in(&follow_up).unwrap();
    assert!(body.get("tools").is_none());

    let function_responses: Vec<&Value> = body["contents"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|c| c["parts"].as_array().unwrap())
        .filter_map(|p| p.get("functionResponse"))
        .collect();
    assert_eq!(function_responses.len(), 1);
    assert_eq!(function_responses[0]["name"], "get_weather");
    assert_eq!(
        function_responses[0]["response"],
        json!({"result": "sunny"})
    );
}

#[test]
fn identical_requests_share_a_cache_entry() {
    let cache = ResponseCache::new(60);
    let body_first = json!({
        "model": "gemini-2.5-flash",
        "messages": [{"role": "user", "content": "2+2?"}]
    });
    // Same request arriving again, different key order in the object.
    let body_second = json!({
        "messages": [{"role": "user", "content": "2+2?"}],
        "model": "gemini-2.5-flash"
    });

    let first_key = fingerprint(&body_first);
    assert!(cache.get(&first_key).is_none());

    let reply = json!({"id": "msg_x", "content": [{"type": "text", "text": "4"}]});
    cache.insert(first_key, reply.clone());

    let second_key = fingerprint(&body_second);
    let cached = cache.get(&second_key).expect("second request must hit");
    assert_eq!(
        serde_json::to_vec(&cached).unwrap(),
        serde_json::to_vec(&reply).unwrap()
    );
}

#[tokio::test]
async fn password_change_invalidates_sessions_and_rotates_hash() {
    let _guard = lock_env();
    let dir = tempfile::tempdir().unwrap();
    let _data_dir = ScopedEnvVar::set("TRESTLE_DATA_DIR", dir.path().to_str().unwrap());

    let mut config = GatewayConfig::new();
    config.admin_secret = "bootstrap-secret".to_string();
    let state = AppState::new(config);

    // Login with the bootstrap plaintext; it must be upgraded to a hash.
    let login = handle_login(
        State(state.clone()),
        Json(LoginRequest {
            password: "bootstrap-secret".to_string(),
        }),
    )
    .await;
    let (status, body) = response_json(login).await;
    assert_eq!(status, 200);
    let token = body["token"].as_str().unwrap().to_string();
    assert!(state.core.sessions.validate(&token));
    assert!(state.config.snapshot().admin_secret_is_hashed());

    // Changing the password clears every outstanding session.
    let change = handle_change_password(
        State(state.clone()),
        Json(ChangePasswordRequest {
            current_password: "bootstrap-secret".to_string(),
            new_password: "a-brand-new-password".to_string(),
        }),
    )
    .await;
    let (status, _) = response_json(change).await;
    assert_eq!(status, 200);
    assert!(!state.core.sessions.validate(&token));

    // Old password is dead, the new one logs in.
    let stale = handle_login(
        State(state.clone()),
        Json(LoginRequest {
            password: "bootstrap-secret".to_string(),
        }),
    )
    .await;
    assert_eq!(stale.status().as_u16(), 401);

    let fresh = handle_login(
        State(state.clone()),
        Json(LoginRequest {
            password: "a-brand-new-password".to_string(),
        }),
    )
    .await;
    assert_eq!(fresh.status().as_u16(), 200);
}

#[tokio::test]
async fn wrong_login_issues_no_session() {
    let _guard = lock_env();
    let dir = tempfile::tempdir().unwrap();
    let _data_dir = ScopedEnvVar::set("TRESTLE_DATA_DIR", dir.path().to_str().unwrap());

    let state = AppState::new(GatewayConfig::new());
    let login = handle_login(
        State(state.clone()),
        Json(LoginRequest {
            password: "nope".to_string(),
        }),
    )
    .await;
    assert_eq!(login.status().as_u16(), 401);
    assert_eq!(state.core.sessions.active_count(), 0);
}

#[test]
fn sanitised_tool_schemas_carry_no_rejected_keywords() {
    // Invariant 1: any catalog, however hostile, is clean after translation.
    let request = parse_request(json!({
        "messages": [{"role": "user", "content": "go"}],
        "tools": [
            {"name": "a", "input_schema": {
                "type": "object",
                "$schema": "http://json-schema.org/draft-07/schema#",
                "definitions": {"x": {"type": "string", "pattern": ".*"}},
                "properties": {
                    "deep": {"allOf": [{"minimum": 1}], "properties": {
                        "deeper": {"type": "string", "format": "uri", "maxLength": 9}
                    }}
                }
            }},
            {"name": "b", "input_schema": {
                "oneOf": [{"type": "string"}],
                "items": {"uniqueItems": true, "type": "array"}
            }}
        ]
    }));

    let body = transform_claude_request_in(&request).unwrap();
    for declaration in body["tools"][0]["functionDeclarations"].as_array().unwrap() {
        let survivors =
            crate::proxy::common::json_schema::find_rejected_keywords(&declaration["parameters"]);
        assert!(survivors.is_empty(), "found {:?}", survivors);
    }
}
