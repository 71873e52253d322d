use super::models::*;
use super::response::{generate_message_id, generate_tool_use_id, map_finish_reason, to_claude_usage};
use bytes::Bytes;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Init,
    Streaming,
    Done,
}

// One state machine per response. Text accumulates into a single block that
// stays open until finalisation; each upstream function call opens and
// closes its own block immediately.
pub struct StreamingState {
    phase: StreamPhase,
    requested_model: String,
    text_block_index: Option<usize>,
    next_block_index: usize,
    last_finish_reason: Option<String>,
    last_usage: Option<UsageMetadata>,
}

impl StreamingState {
    pub fn new(requested_model: &str) -> Self {
        Self {
            phase: StreamPhase::Init,
            requested_model: requested_model.to_string(),
            text_block_index: None,
            next_block_index: 0,
            last_finish_reason: None,
            last_usage: None,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    fn emit(&self, event_type: &str, data: serde_json::Value) -> Bytes {
        let sse = format!(
            "event: {}\ndata: {}\n\n",
            event_type,
            serde_json::to_string(&data).unwrap_or_default()
        );
        Bytes::from(sse)
    }

    fn emit_message_start(&mut self, chunk: &GeminiResponse) -> Bytes {
        let id = chunk
            .response_id
            .clone()
            .unwrap_or_else(generate_message_id);
        let model = chunk
            .model_version
            .clone()
            .unwrap_or_else(|| self.requested_model.clone());

        self.emit(
            "message_start",
            json!({
                "type": "message_start",
                "message": {
                    "id": id,
                    "type": "message",
                    "role": "assistant",
                    "content": [],
                    "model": model,
                    "stop_reason": null,
                    "stop_sequence": null,
                    "usage": to_claude_usage(chunk.usage_metadata.as_ref())
                }
            }),
        )
    }

    pub fn process_chunk(&mut self, chunk: &GeminiResponse) -> Vec<Bytes> {
        let mut events = Vec::new();

        if self.phase == StreamPhase::Init {
            events.push(self.emit_message_start(chunk));
            self.phase = StreamPhase::Streaming;
        }

        if let Some(candidate) = chunk.candidates.as_ref().and_then(|c| c.first()) {
            if let Some(content) = &candidate.content {
                for part in &content.parts {
                    if let Some(text) = &part.text {
                        events.extend(self.process_text(text));
                    }
                    if let Some(function_call) = &part.function_call {
                        events.extend(self.process_function_call(function_call));
                    }
                }
            }

            if let Some(finish_reason) = &candidate.finish_reason {
                self.last_finish_reason = Some(finish_reason.clone());
            }
        }

        if let Some(usage) = &chunk.usage_metadata {
            self.last_usage = Some(usage.clone());
        }

        events
    }

    fn process_text(&mut self, text: &str) -> Vec<Bytes> {
        if text.is_empty() {
            return vec![];
        }

        let mut events = Vec::new();
        let index = match self.text_block_index {
            Some(index) => index,
            None => {
                let index = self.allocate_block_index();
                self.text_block_index = Some(index);
                events.push(self.emit(
                    "content_block_start",
                    json!({
                        "type": "content_block_start",
                        "index": index,
                        "content_block": { "type": "text", "text": "" }
                    }),
                ));
                index
            }
        };

        events.push(self.emit(
            "content_block_delta",
            json!({
                "type": "content_block_delta",
                "index": index,
                "delta": { "type": "text_delta", "text": text }
            }),
        ));

        events
    }

    fn process_function_call(&mut self, function_call: &FunctionCall) -> Vec<Bytes> {
        let index = self.allocate_block_index();
        let args = function_call.args.clone().unwrap_or_else(|| json!({}));
        let partial_json = serde_json::to_string(&args).unwrap_or_else(|_| "{}".to_string());

        vec![
            self.emit(
                "content_block_start",
                json!({
                    "type": "content_block_start",
                    "index": index,
                    "content_block": {
                        "type": "tool_use",
                        "id": generate_tool_use_id(),
                        "name": function_call.name,
                        "input": {}
                    }
                }),
            ),
            self.emit(
                "content_block_delta",
                json!({
                    "type": "content_block_delta",
                    "index": index,
                    "delta": { "type": "input_json_delta", "partial_json": partial_json }
                }),
            ),
            self.emit(
                "content_block_stop",
                json!({ "type": "content_block_stop", "index": index }),
            ),
        ]
    }

    fn allocate_block_index(&mut self) -> usize {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }

    // Upstream end-of-stream: close the text block, report the stop reason
    // and output tokens, then terminate the message.
    pub fn finalize(&mut self) -> Vec<Bytes> {
        if self.phase != StreamPhase::Streaming {
            return vec![];
        }

        let mut events = Vec::new();

        if let Some(index) = self.text_block_index.take() {
            events.push(self.emit(
                "content_block_stop",
                json!({ "type": "content_block_stop", "index": index }),
            ));
        }

        let usage = to_claude_usage(self.last_usage.as_ref());
        events.push(self.emit(
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": {
                    "stop_reason": map_finish_reason(self.last_finish_reason.as_deref()),
                    "stop_sequence": null
                },
                "usage": { "output_tokens": usage.output_tokens }
            }),
        ));

        events.push(Bytes::from(
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        ));

        self.phase = StreamPhase::Done;
        events
    }

    pub fn error_event(&self, error_type: &str, message: &str) -> Bytes {
        self.emit(
            "error",
            json!({
                "type": "error",
                "error": { "type": error_type, "message": message }
            }),
        )
    }
}
