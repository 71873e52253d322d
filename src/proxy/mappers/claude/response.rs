use super::models::*;
use crate::proxy::common::utils::generate_random_id;

pub fn map_finish_reason(finish_reason: Option<&str>) -> &'static str {
    match finish_reason {
        Some("MAX_TOKENS") => "max_tokens",
        Some("SAFETY") | Some("RECITATION") => "stop_sequence",
        // STOP and anything the upstream invents later read as a clean stop.
        _ => "end_turn",
    }
}

pub fn to_claude_usage(usage_metadata: Option<&UsageMetadata>) -> Usage {
    let metadata = usage_metadata.cloned().unwrap_or_default();
    Usage {
        input_tokens: metadata.prompt_token_count.unwrap_or(0),
        output_tokens: metadata.candidates_token_count.unwrap_or(0),
    }
}

pub fn generate_message_id() -> String {
    format!("msg_{}", generate_random_id(29))
}

pub fn generate_tool_use_id() -> String {
    format!("toolu_{}", generate_random_id(12))
}

// Translate an upstream reply into a client assistant message. Only the
// first candidate is consulted; its absence is an upstream fault.
pub fn transform_response(
    gemini_response: &GeminiResponse,
    requested_model: &str,
) -> Result<ClaudeResponse, String> {
    let candidate = gemini_response
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .ok_or_else(|| "upstream reply contains no candidates".to_string())?;

    let mut content = Vec::new();
    if let Some(candidate_content) = &candidate.content {
        for part in &candidate_content.parts {
            if let Some(text) = &part.text {
                content.push(ResponseBlock::Text {
                    text: text.clone(),
                    citations: None,
                });
            }
            if let Some(function_call) = &part.function_call {
                content.push(ResponseBlock::ToolUse {
                    id: generate_tool_use_id(),
                    name: function_call.name.clone(),
                    input: function_call
                        .args
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({})),
                });
            }
        }
    }

    let model = gemini_response
        .model_version
        .clone()
        .unwrap_or_else(|| requested_model.to_string());

    Ok(ClaudeResponse {
        id: generate_message_id(),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model,
        stop_reason: Some(map_finish_reason(candidate.finish_reason.as_deref()).to_string()),
        stop_sequence: None,
        usage: to_claude_usage(gemini_response.usage_metadata.as_ref()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gemini_reply(value: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn text_reply_translates_to_assistant_message() {
        let reply = gemini_reply(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello world"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3},
            "modelVersion": "gemini-2.5-flash"
        }));

        let message = transform_response(&reply, "fallback-model").unwrap();
        assert!(message.id.starts_with("msg_"));
        assert_eq!(message.id.len(), "msg_".len() + 29);
        assert_eq!(message.response_type, "message");
        assert_eq!(message.role, "assistant");
        assert_eq!(message.model, "gemini-2.5-flash");
        assert_eq!(message.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(message.usage.input_tokens, 12);
        assert_eq!(message.usage.output_tokens, 3);

        let ResponseBlock::Text { text, citations } = &message.content[0] else {
            panic!("expected text block");
        };
        assert_eq!(text, "Hello world");
        assert!(citations.is_none());
    }

    #[test]
    fn function_call_becomes_tool_use_block() {
        let reply = gemini_reply(json!({
            "candidates": [{
                "content": {"parts": [{
                    "functionCall": {"name": "get_weather", "args": {"city": "Paris"}}
                }]},
                "finishReason": "STOP"
            }]
        }));

        let message = transform_response(&reply, "m").unwrap();
        let ResponseBlock::ToolUse { id, name, input } = &message.content[0] else {
            panic!("expected tool_use block");
        };
        assert!(id.starts_with("toolu_"));
        assert_eq!(id.len(), "toolu_".len() + 12);
        assert_eq!(name, "get_weather");
        assert_eq!(input["city"], "Paris");
    }

    #[test]
    fn finish_reasons_map_per_contract() {
        assert_eq!(map_finish_reason(Some("STOP")), "end_turn");
        assert_eq!(map_finish_reason(Some("MAX_TOKENS")), "max_tokens");
        assert_eq!(map_finish_reason(Some("SAFETY")), "stop_sequence");
        assert_eq!(map_finish_reason(Some("RECITATION")), "stop_sequence");
        assert_eq!(map_finish_reason(Some("SOMETHING_NEW")), "end_turn");
        assert_eq!(map_finish_reason(None), "end_turn");
    }

    #[test]
    fn missing_candidates_is_an_error() {
        let reply = gemini_reply(json!({"candidates": []}));
        assert!(transform_response(&reply, "m").is_err());
        let reply = gemini_reply(json!({}));
        assert!(transform_response(&reply, "m").is_err());
    }

    #[test]
    fn missing_model_version_falls_back_to_request_model() {
        let reply = gemini_reply(json!({
            "candidates": [{"content": {"parts": [{"text": "x"}]}}]
        }));
        let message = transform_response(&reply, "requested").unwrap();
        assert_eq!(message.model, "requested");
        assert_eq!(message.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(message.usage.input_tokens, 0);
    }
}
