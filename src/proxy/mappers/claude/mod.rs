pub mod models;
pub mod request;
pub mod response;
pub mod streaming;

pub use models::*;
pub use request::{merge_consecutive_messages, transform_claude_request_in};
pub use response::transform_response;
pub use streaming::{StreamPhase, StreamingState};

use crate::constants::STREAM_IDLE_TIMEOUT_SECS;
use crate::proxy::queue::DispatchPermit;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use once_cell::sync::Lazy;
use std::pin::Pin;

// Upstream frames arrive as `data: <json>\n\n` (some servers terminate with
// CRLF pairs); anything in the buffer before the next frame is noise.
static DATA_FRAME_RE: Lazy<regex::bytes::Regex> = Lazy::new(|| {
    regex::bytes::Regex::new(r"(?s)data: (.*?)\r?\n\r?\n").expect("valid frame regex")
});

pub struct ClaudeSseStreamInput {
    pub gemini_stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    pub trace_id: String,
    pub requested_model: String,
    // Queue slot held for the lifetime of the stream; dropped on completion,
    // error, or client disconnect.
    pub permit: Option<DispatchPermit>,
}

pub fn create_claude_sse_stream(
    input: ClaudeSseStreamInput,
) -> Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>> {
    use async_stream::stream;
    use futures::StreamExt;

    let ClaudeSseStreamInput {
        mut gemini_stream,
        trace_id,
        requested_model,
        permit,
    } = input;

    Box::pin(stream! {
        let _permit = permit;
        let mut state = StreamingState::new(&requested_model);
        let mut buffer = BytesMut::new();

        loop {
            let next_chunk = tokio::time::timeout(
                std::time::Duration::from_secs(STREAM_IDLE_TIMEOUT_SECS),
                gemini_stream.next()
            ).await;

            match next_chunk {
                Ok(Some(Ok(chunk))) => {
                    buffer.extend_from_slice(&chunk);
                    for payload in drain_frames(&mut buffer) {
                        // Malformed JSON inside a frame is dropped silently.
                        if let Ok(parsed) = serde_json::from_str::<GeminiResponse>(&payload) {
                            for event in state.process_chunk(&parsed) {
                                yield Ok(event);
                            }
                        }
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!("[{}] Upstream stream error: {}", trace_id, e);
                    yield Ok(state.error_event(
                        "stream_error",
                        "upstream connection failed mid-stream",
                    ));
                    break;
                }
                Ok(None) => {
                    if state.phase() == StreamPhase::Init {
                        tracing::warn!("[{}] Upstream closed without sending data", trace_id);
                        yield Ok(state.error_event(
                            "upstream_error",
                            "upstream closed the stream without a reply",
                        ));
                    } else {
                        for event in state.finalize() {
                            yield Ok(event);
                        }
                        tracing::info!("[{}] Stream completed", trace_id);
                    }
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        "[{}] Upstream idle for {}s, closing stream",
                        trace_id,
                        STREAM_IDLE_TIMEOUT_SECS
                    );
                    yield Ok(state.error_event(
                        "stream_timeout",
                        "upstream produced no data within the idle window",
                    ));
                    break;
                }
            }
        }
    })
}

fn drain_frames(buffer: &mut BytesMut) -> Vec<String> {
    let mut frames = Vec::new();

    loop {
        let Some(captures) = DATA_FRAME_RE.captures(buffer) else {
            break;
        };
        let whole = captures.get(0).map(|m| m.end()).unwrap_or(buffer.len());
        if let Some(payload) = captures.get(1) {
            if let Ok(text) = std::str::from_utf8(payload.as_bytes()) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    frames.push(trimmed.to_string());
                }
            }
        }
        let _ = buffer.split_to(whole);
    }

    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn sse_frame(value: serde_json::Value) -> Bytes {
        Bytes::from(format!("data: {}\n\n", value))
    }

    async fn collect(
        mut stream: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
    ) -> String {
        let mut output = String::new();
        while let Some(result) = stream.next().await {
            output.push_str(&String::from_utf8(result.unwrap().to_vec()).unwrap());
        }
        output
    }

    #[test]
    fn drain_frames_extracts_complete_frames_only() {
        let mut buffer = BytesMut::from(&b"data: {\"a\":1}\n\ndata: {\"b\""[..]);
        let frames = drain_frames(&mut buffer);
        assert_eq!(frames, vec!["{\"a\":1}".to_string()]);
        assert_eq!(&buffer[..], b"data: {\"b\"");

        buffer.extend_from_slice(b":2}\n\n");
        let frames = drain_frames(&mut buffer);
        assert_eq!(frames, vec!["{\"b\":2}".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn drain_frames_accepts_crlf_terminators() {
        let mut buffer = BytesMut::from(&b"data: {\"a\":1}\r\n\r\ndata: {\"b\":2}\n\n"[..]);
        let frames = drain_frames(&mut buffer);
        assert_eq!(
            frames,
            vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]
        );
    }

    #[tokio::test]
    async fn three_text_chunks_produce_ordered_event_sequence() {
        let mock_stream = async_stream::stream! {
            yield Ok(sse_frame(json!({
                "candidates": [{"content": {"parts": [{"text": "Hel"}]}}]
            })));
            yield Ok(sse_frame(json!({
                "candidates": [{"content": {"parts": [{"text": "lo"}]}}]
            })));
            yield Ok(sse_frame(json!({
                "candidates": [{
                    "content": {"parts": [{"text": " world"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"candidatesTokenCount": 3}
            })));
        };

        let output = collect(create_claude_sse_stream(ClaudeSseStreamInput {
            gemini_stream: Box::pin(mock_stream),
            trace_id: "trace_test".to_string(),
            requested_model: "gemini-2.5-flash".to_string(),
            permit: None,
        }))
        .await;

        let positions: Vec<usize> = [
            "event: message_start",
            "event: content_block_start",
            r#""text":"Hel""#,
            r#""text":"lo""#,
            r#""text":" world""#,
            "event: content_block_stop",
            "event: message_delta",
            "event: message_stop",
        ]
        .iter()
        .map(|needle| output.find(needle).unwrap_or_else(|| panic!("missing {}", needle)))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(output.matches(r#""type":"text_delta""#).count(), 3);
        assert!(output.contains(r#""stop_reason":"end_turn""#));
    }

    #[tokio::test]
    async fn concatenated_deltas_match_sync_translation() {
        let upstream = json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello world"}]},
                "finishReason": "STOP"
            }]
        });

        // Same upstream data, chunked for the stream path.
        let mock_stream = async_stream::stream! {
            yield Ok(sse_frame(json!({
                "candidates": [{"content": {"parts": [{"text": "Hello"}]}}]
            })));
            yield Ok(sse_frame(json!({
                "candidates": [{
                    "content": {"parts": [{"text": " world"}]},
                    "finishReason": "STOP"
                }]
            })));
        };
        let output = collect(create_claude_sse_stream(ClaudeSseStreamInput {
            gemini_stream: Box::pin(mock_stream),
            trace_id: "t".to_string(),
            requested_model: "m".to_string(),
            permit: None,
        }))
        .await;

        let mut streamed_text = String::new();
        for line in output.lines() {
            let Some(payload) = line.strip_prefix("data: ") else {
                continue;
            };
            let event: serde_json::Value = serde_json::from_str(payload).unwrap();
            if event["delta"]["type"] == "text_delta" {
                streamed_text.push_str(event["delta"]["text"].as_str().unwrap());
            }
        }

        let sync = transform_response(&serde_json::from_value(upstream).unwrap(), "m").unwrap();
        let ResponseBlock::Text { text, .. } = &sync.content[0] else {
            panic!("expected text block");
        };
        assert_eq!(&streamed_text, text);
    }

    #[tokio::test]
    async fn malformed_frames_are_dropped_silently() {
        let mock_stream = async_stream::stream! {
            yield Ok(Bytes::from("data: {not json}\n\n"));
            yield Ok(sse_frame(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}, "finishReason": "STOP"}]
            })));
        };
        let output = collect(create_claude_sse_stream(ClaudeSseStreamInput {
            gemini_stream: Box::pin(mock_stream),
            trace_id: "t".to_string(),
            requested_model: "m".to_string(),
            permit: None,
        }))
        .await;
        assert!(output.contains(r#""text":"ok""#));
        assert!(!output.contains("not json"));
    }

    #[tokio::test]
    async fn empty_upstream_stream_yields_error_event() {
        let mock_stream = async_stream::stream! {
            if false {
                yield Ok(Bytes::new());
            }
        };
        let output = collect(create_claude_sse_stream(ClaudeSseStreamInput {
            gemini_stream: Box::pin(mock_stream),
            trace_id: "t".to_string(),
            requested_model: "m".to_string(),
            permit: None,
        }))
        .await;
        assert!(output.contains("event: error"));
        assert!(output.contains("upstream_error"));
    }

    #[tokio::test]
    async fn mid_stream_network_error_emits_stream_error() {
        let mock_stream = async_stream::stream! {
            yield Ok(sse_frame(json!({
                "candidates": [{"content": {"parts": [{"text": "partial"}]}}]
            })));
            yield Err(error_for_test().await);
        };
        let output = collect(create_claude_sse_stream(ClaudeSseStreamInput {
            gemini_stream: Box::pin(mock_stream),
            trace_id: "t".to_string(),
            requested_model: "m".to_string(),
            permit: None,
        }))
        .await;
        assert!(output.contains(r#""text":"partial""#));
        assert!(output.contains("stream_error"));
    }

    // Building a reqwest::Error requires an actual failed request.
    async fn error_for_test() -> reqwest::Error {
        reqwest::Client::new()
            .get("http://127.0.0.1:1/unreachable")
            .send()
            .await
            .unwrap_err()
    }
}
