use super::models::*;
use crate::constants::{CLAMPED_MAX_TOKENS, MIN_MAX_TOKENS};
use crate::proxy::common::json_schema;
use serde_json::{json, Value};
use std::collections::HashMap;

// Collapse consecutive same-role turns before translation. Upstream rejects
// adjacent turns with identical roles, and several coding clients emit them.
pub fn merge_consecutive_messages(messages: &mut Vec<Message>) {
    if messages.len() <= 1 {
        return;
    }

    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
    let old_messages = std::mem::take(messages);
    let mut messages_iter = old_messages.into_iter();

    if let Some(mut current) = messages_iter.next() {
        for next in messages_iter {
            if current.role == next.role {
                match (&mut current.content, next.content) {
                    (MessageContent::Array(current_blocks), MessageContent::Array(next_blocks)) => {
                        current_blocks.extend(next_blocks);
                    }
                    (MessageContent::Array(current_blocks), MessageContent::String(next_text)) => {
                        current_blocks.push(ContentBlock::Text { text: next_text });
                    }
                    (MessageContent::String(current_text), MessageContent::String(next_text)) => {
                        *current_text = format!("{}\n\n{}", current_text, next_text);
                    }
                    (MessageContent::String(current_text), MessageContent::Array(next_blocks)) => {
                        let mut new_blocks = vec![ContentBlock::Text {
                            text: current_text.clone(),
                        }];
                        new_blocks.extend(next_blocks);
                        current.content = MessageContent::Array(new_blocks);
                    }
                }
            } else {
                merged.push(current);
                current = next;
            }
        }
        merged.push(current);
    }

    *messages = merged;
}

// Translate a client request into the upstream request body. The input is
// never mutated; callers pass the classifier-stripped copy.
pub fn transform_claude_request_in(claude_req: &ClaudeRequest) -> Result<Value, String> {
    if claude_req.messages.is_empty() {
        return Err("request contains no messages".to_string());
    }
    if claude_req.messages.iter().all(|m| m.role.trim().is_empty()) {
        return Err("no message carries a role".to_string());
    }

    let mut tool_id_to_name: HashMap<String, String> = HashMap::new();
    let (contents, has_function_response) =
        build_google_contents(&claude_req.messages, &mut tool_id_to_name)?;

    let mut body = json!({
        "contents": contents,
        "safetySettings": build_safety_settings(),
    });

    if let Some(system_instruction) = build_system_instruction(&claude_req.system) {
        body["systemInstruction"] = system_instruction;
    }

    body["generationConfig"] = build_generation_config(claude_req);

    // Upstream rejects a tool catalog alongside function responses, so the
    // catalog is dropped for tool-result turns.
    if !has_function_response {
        if let Some(tools) = build_tools(&claude_req.tools) {
            body["tools"] = tools;
            body["toolConfig"] = json!({
                "functionCallingConfig": {
                    "mode": tool_choice_mode(&claude_req.tool_choice)
                }
            });
        }
    } else if claude_req.tools.is_some() {
        tracing::debug!(
            "[Claude-Request] Omitting tool catalog: request carries function responses"
        );
    }

    Ok(body)
}

fn build_google_contents(
    messages: &[Message],
    tool_id_to_name: &mut HashMap<String, String>,
) -> Result<(Vec<Value>, bool), String> {
    let mut contents = Vec::new();
    let mut has_function_response = false;

    for msg in messages {
        let role = if msg.role == "assistant" {
            "model"
        } else {
            "user"
        };

        let parts = build_parts(&msg.content, tool_id_to_name, &mut has_function_response);
        if parts.is_empty() {
            continue;
        }

        contents.push(json!({
            "role": role,
            "parts": parts
        }));
    }

    Ok((merge_adjacent_roles(contents), has_function_response))
}

fn build_parts(
    content: &MessageContent,
    tool_id_to_name: &mut HashMap<String, String>,
    has_function_response: &mut bool,
) -> Vec<Value> {
    let mut parts = Vec::new();

    match content {
        MessageContent::String(text) => {
            if !text.trim().is_empty() {
                parts.push(json!({"text": text}));
            }
        }
        MessageContent::Array(blocks) => {
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => {
                        if !text.is_empty() {
                            parts.push(json!({"text": text}));
                        }
                    }
                    ContentBlock::Image { source } => {
                        if source.source_type == "base64" {
                            parts.push(json!({
                                "inlineData": {
                                    "mimeType": source.media_type,
                                    "data": source.data
                                }
                            }));
                        }
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_id_to_name.insert(id.clone(), name.clone());
                        parts.push(json!({
                            "functionCall": {
                                "name": name,
                                "args": input
                            }
                        }));
                    }
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => {
                        let func_name = match tool_id_to_name.get(tool_use_id) {
                            Some(name) => name.clone(),
                            None => {
                                tracing::error!(
                                    "[Claude-Request] tool_result references unknown tool_use_id {}; forwarding raw id",
                                    tool_use_id
                                );
                                tool_use_id.clone()
                            }
                        };

                        *has_function_response = true;
                        parts.push(json!({
                            "functionResponse": {
                                "name": func_name,
                                "response": build_tool_result_response(
                                    content,
                                    is_error.unwrap_or(false)
                                )
                            }
                        }));
                    }
                }
            }
        }
    }

    parts
}

// Upstream expects a JSON object for every function response. Strings and
// arrays are wrapped, objects pass through, everything else is stringified.
fn build_tool_result_response(content: &Value, is_error: bool) -> Value {
    let mut response = match content {
        Value::String(s) => json!({"result": s}),
        Value::Array(items) => json!({"result": items}),
        Value::Object(_) => content.clone(),
        other => json!({"result": other.to_string()}),
    };

    if is_error {
        let message = match content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        response["error"] = json!(true);
        response["error_message"] = json!(message);
    }

    response
}

fn merge_adjacent_roles(mut contents: Vec<Value>) -> Vec<Value> {
    if contents.is_empty() {
        return contents;
    }

    let mut merged = Vec::new();
    let mut current_msg = contents.remove(0);

    for msg in contents {
        let current_role = current_msg["role"].as_str().unwrap_or_default();
        let next_role = msg["role"].as_str().unwrap_or_default();

        if current_role == next_role {
            if let Some(current_parts) = current_msg.get_mut("parts").and_then(|p| p.as_array_mut())
            {
                if let Some(next_parts) = msg.get("parts").and_then(|p| p.as_array()) {
                    current_parts.extend(next_parts.clone());
                }
            }
        } else {
            merged.push(current_msg);
            current_msg = msg;
        }
    }
    merged.push(current_msg);
    merged
}

fn build_system_instruction(system: &Option<SystemPrompt>) -> Option<Value> {
    let text = match system {
        Some(SystemPrompt::String(s)) => s.clone(),
        Some(SystemPrompt::Blocks(blocks)) => blocks
            .iter()
            .filter(|b| b.block_type == "text" && !b.text.is_empty())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        None => return None,
    };

    if text.trim().is_empty() {
        return None;
    }

    Some(json!({"parts": [{"text": text}]}))
}

fn build_generation_config(claude_req: &ClaudeRequest) -> Value {
    let mut config = json!({});

    if let Some(temp) = claude_req.temperature {
        config["temperature"] = json!(temp);
    }
    if let Some(top_p) = claude_req.top_p {
        config["topP"] = json!(top_p);
    }
    if let Some(top_k) = claude_req.top_k {
        config["topK"] = json!(top_k);
    }
    if let Some(stop) = &claude_req.stop_sequences {
        if !stop.is_empty() {
            config["stopSequences"] = json!(stop);
        }
    }

    config["maxOutputTokens"] = json!(effective_max_tokens(claude_req.max_tokens));

    if let Some(format) = &claude_req.response_format {
        if format.format_type == "json_object" || format.format_type == "json_schema" {
            config["responseMimeType"] = json!("application/json");
            if let Some(schema) = &format.schema {
                let mut cleaned = schema.clone();
                json_schema::clean_json_schema(&mut cleaned);
                json_schema::warn_on_rejected_keywords(&cleaned, "response_format.schema");
                config["responseJsonSchema"] = cleaned;
            }
        }
    }

    config
}

// Some clients probe with tiny max_tokens values that would truncate any
// real answer; widen those to a usable cap.
fn effective_max_tokens(requested: Option<u32>) -> u32 {
    match requested {
        Some(value) if value >= MIN_MAX_TOKENS => value,
        Some(value) => {
            tracing::debug!(
                "[Claude-Request] max_tokens {} below floor, widening to {}",
                value,
                CLAMPED_MAX_TOKENS
            );
            CLAMPED_MAX_TOKENS
        }
        None => CLAMPED_MAX_TOKENS,
    }
}

fn build_tools(tools: &Option<Vec<Tool>>) -> Option<Value> {
    let tools_list = tools.as_ref()?;

    let mut function_declarations: Vec<Value> = Vec::new();
    for tool in tools_list {
        let mut parameters = tool.input_schema.clone().unwrap_or(json!({
            "type": "object",
            "properties": {}
        }));
        json_schema::clean_json_schema(&mut parameters);
        json_schema::warn_on_rejected_keywords(&parameters, "tool.input_schema");

        function_declarations.push(json!({
            "name": tool.name,
            "description": tool.description,
            "parameters": parameters
        }));
    }

    if function_declarations.is_empty() {
        return None;
    }

    Some(json!([{"functionDeclarations": function_declarations}]))
}

fn tool_choice_mode(choice: &Option<ToolChoice>) -> &'static str {
    match choice {
        None | Some(ToolChoice::Auto) => "AUTO",
        Some(ToolChoice::Any) | Some(ToolChoice::Tool { .. }) => "ANY",
        Some(ToolChoice::None) => "NONE",
    }
}

// Content policy is delegated to the caller's account settings; the gateway
// always forwards the least restrictive vector.
fn build_safety_settings() -> Value {
    json!([
        { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE" },
        { "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": "BLOCK_NONE" },
    ])
}
