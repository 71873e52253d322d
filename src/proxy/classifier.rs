use crate::proxy::mappers::claude::models::{ClaudeRequest, ContentBlock, MessageContent};

// Several coding clients fire auxiliary prompts (titles, topic probes,
// warm-up introductions) that carry the full tool catalog for no reason.
// Those labels strip the catalog before forwarding; NORMAL and TOOLS keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Title,
    Topic,
    Warmup,
    Tools,
    Normal,
}

const TITLE_TRIGGERS: &[&str] = &[
    "Please write a 5-10 word title",
    "Summarize this coding conversation",
];

const TOPIC_TRIGGER: &str = "Analyze if this message indicates a new conversation topic";

const WARMUP_MAX_LEN: usize = 500;
const MANY_TOOLS_THRESHOLD: usize = 10;

impl RequestClass {
    pub fn strips_tools(&self) -> bool {
        matches!(
            self,
            RequestClass::Title | RequestClass::Topic | RequestClass::Warmup
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Title => "TITLE",
            RequestClass::Topic => "TOPIC",
            RequestClass::Warmup => "WARMUP",
            RequestClass::Tools => "TOOLS",
            RequestClass::Normal => "NORMAL",
        }
    }
}

pub fn classify(request: &ClaudeRequest) -> RequestClass {
    let tool_count = request.tools.as_ref().map(|t| t.len()).unwrap_or(0);

    if let Some(text) = first_user_text(request) {
        if TITLE_TRIGGERS.iter().any(|t| text.contains(t)) {
            return RequestClass::Title;
        }
        if text.contains(TOPIC_TRIGGER) {
            return RequestClass::Topic;
        }
        if is_warmup_text(&text) {
            return RequestClass::Warmup;
        }
    }

    if tool_count > MANY_TOOLS_THRESHOLD {
        return RequestClass::Tools;
    }

    RequestClass::Normal
}

fn first_user_text(request: &ClaudeRequest) -> Option<String> {
    let msg = request.messages.iter().find(|m| m.role == "user")?;

    match &msg.content {
        MessageContent::String(s) => Some(s.clone()),
        MessageContent::Array(blocks) => blocks.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.clone()),
            _ => None,
        }),
    }
}

fn is_warmup_text(text: &str) -> bool {
    if text.len() >= WARMUP_MAX_LEN {
        return false;
    }
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();
    lowered.starts_with("i am ")
        || lowered.starts_with("i'm ")
        || lowered.contains("claude code")
}
