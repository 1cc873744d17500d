//! Core type definitions for messages, content blocks, and agent configuration.
//!
//! These types are plain data — tagged unions on a `type`/`kind` discriminant rather than
//! class hierarchies, so a session's history can be cloned, forked, and serialized without
//! walking a pointer graph. Wire-format structs for the OpenAI-compatible chat-completions
//! protocol (`OpenAI*`) live here too since they are consumed directly by [`crate::utils`].

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// MESSAGE ROLE
// ============================================================================

/// Role of a message participant.
///
/// `Tool` exists only for OpenAI-style wire serialization, where each tool result is sent
/// back to the API as its own message with `role: "tool"`. At the session-history level
/// (`SessionState::messages`) only `System`, `User`, and `Assistant` ever appear — tool
/// results travel inside a `User` message's content blocks (see `ContentBlock::ToolResult`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

// ============================================================================
// CONTENT BLOCKS
// ============================================================================

/// A single unit of content within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text(TextBlock),
    ToolUse(ToolUseBlock),
    ToolResult(ToolResultBlock),
    Image(ImageBlock),
}

impl ContentBlock {
    /// Returns the block as a tool-use reference, if it is one.
    pub fn as_tool_use(&self) -> Option<&ToolUseBlock> {
        match self {
            ContentBlock::ToolUse(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the block as a tool-result reference, if it is one.
    pub fn as_tool_result(&self) -> Option<&ToolResultBlock> {
        match self {
            ContentBlock::ToolResult(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the block's text, if it is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text(b) => Some(&b.text),
            _ => None,
        }
    }
}

/// Plain text produced by the model or supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUseBlock {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

impl ToolUseBlock {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }
}

/// The result of executing a tool, matched back to its `ToolUseBlock` by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResultBlock {
    pub fn new(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: None,
        }
    }

    pub fn error(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// Detail level requested for an image, mirroring the OpenAI Vision API's `detail` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

impl Default for ImageDetail {
    fn default() -> Self {
        ImageDetail::Auto
    }
}

/// An image, passed through by the engine and never interpreted.
///
/// Holds either a remote URL or a `data:` URI built from base64-encoded bytes; both forms
/// are stored as one `url` string so serialization is uniform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageBlock {
    url: String,
    detail: ImageDetail,
}

impl ImageBlock {
    /// Wrap a remote URL or an existing `data:` URI.
    pub fn from_url(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.is_empty() {
            return Err(Error::invalid_input("image url must not be empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:"))
        {
            return Err(Error::invalid_input(
                "image url must start with http://, https://, or data:",
            ));
        }
        Ok(Self {
            url,
            detail: ImageDetail::default(),
        })
    }

    /// Build a `data:` URI from base64-encoded image bytes and a MIME type.
    pub fn from_base64(base64_data: impl Into<String>, mime_type: impl Into<String>) -> Result<Self> {
        let base64_data = base64_data.into();
        let mime_type = mime_type.into();
        if base64_data.is_empty() {
            return Err(Error::invalid_input("base64 image data must not be empty"));
        }
        if !mime_type.starts_with("image/") {
            return Err(Error::invalid_input("mime type must start with image/"));
        }
        let url = format!("data:{};base64,{}", mime_type, base64_data);
        Ok(Self {
            url,
            detail: ImageDetail::default(),
        })
    }

    pub fn with_detail(mut self, detail: ImageDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn detail(&self) -> ImageDetail {
        self.detail
    }
}

// ============================================================================
// USAGE & STOP REASON
// ============================================================================

/// Token usage, either for a single assistant message or a session's running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u64,
    pub output: u64,
}

impl Usage {
    pub fn new(input: u64, output: u64) -> Self {
        Self { input, output }
    }

    pub fn add(&mut self, other: Usage) {
        self.input += other.input;
        self.output += other.output;
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.add(rhs);
    }
}

/// Why the model (or the turn loop) stopped generating.
///
/// `Other` preserves any provider-specific reason string that doesn't map onto a known
/// variant, so forward-compatible providers never force a hard parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    ToolUse,
    MaxTurns,
    #[serde(untagged)]
    Other(String),
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
            StopReason::ToolUse => write!(f, "tool_use"),
            StopReason::MaxTurns => write!(f, "max_turns"),
            StopReason::Other(s) => write!(f, "{}", s),
        }
    }
}

impl StopReason {
    /// Map a raw provider finish-reason string onto a known variant, falling back to `Other`.
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "end_turn" | "stop" => StopReason::EndTurn,
            "max_tokens" | "length" => StopReason::MaxTokens,
            "stop_sequence" => StopReason::StopSequence,
            "tool_use" | "tool_calls" | "function_call" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// A single message in conversation history.
///
/// `content` is always a vector of content blocks; the `user`/`system`/`assistant`
/// constructors are the "plain string" shortcut from the data model, producing a
/// single-element `Text` block vector rather than a separate string variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: Vec<ContentBlock>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            stop_reason: None,
            usage: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![ContentBlock::Text(TextBlock::new(text))])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, vec![ContentBlock::Text(TextBlock::new(text))])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Tool-result blocks in this message's content, in order.
    pub fn tool_results(&self) -> Vec<&ToolResultBlock> {
        self.content.iter().filter_map(ContentBlock::as_tool_result).collect()
    }

    /// Tool-use blocks in this message's content, in order.
    pub fn tool_uses(&self) -> Vec<&ToolUseBlock> {
        self.content.iter().filter_map(ContentBlock::as_tool_use).collect()
    }

    /// Concatenated text across all text blocks, joined with `\n` (used by OpenAI wire
    /// serialization and by context-window token estimation).
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// OPENAI WIRE FORMAT — REQUEST CONTENT
// ============================================================================

/// Content of an OpenAI-style chat message as sent in a request body.
///
/// Serializes as a plain string when there is only text (the v0.5.0-compatible format),
/// or as an array of typed parts once an image is present (the Vision API format).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenAIContent {
    Text(String),
    Parts(Vec<OpenAIContentPart>),
}

/// One part of a multi-part OpenAI message content array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpenAIContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAIImageUrl },
}

impl OpenAIContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        OpenAIContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>, detail: ImageDetail) -> Self {
        OpenAIContentPart::ImageUrl {
            image_url: OpenAIImageUrl {
                url: url.into(),
                detail,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIImageUrl {
    pub url: String,
    pub detail: ImageDetail,
}

/// A single message as sent to an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAIMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: OpenAIFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,
    pub arguments: String,
}

// ============================================================================
// OPENAI WIRE FORMAT — STREAMING RESPONSE CHUNKS
// ============================================================================

/// One SSE chunk of an OpenAI-compatible streaming chat completion.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIChoice {
    pub index: u32,
    pub delta: OpenAIDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAIDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAIFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Flatten a session's internal messages into the OpenAI chat-completions wire format.
///
/// A `tool_result` block has no OpenAI analogue inside an assistant/user message — it
/// becomes its own `role: "tool"` message per result, consistent with how a tool-result
/// user message is defined to hold only `tool_result` blocks (see [`ContentBlock`]).
pub fn to_openai_messages(messages: &[Message]) -> Vec<OpenAIMessage> {
    let mut out = Vec::new();
    for message in messages {
        let tool_results: Vec<&ToolResultBlock> = message.tool_results();
        if !tool_results.is_empty() {
            for result in tool_results {
                out.push(OpenAIMessage {
                    role: "tool".to_string(),
                    content: Some(OpenAIContent::Text(result.content.clone())),
                    tool_calls: None,
                    tool_call_id: Some(result.tool_use_id.clone()),
                });
            }
            continue;
        }

        let tool_uses = message.tool_uses();
        let tool_calls = if tool_uses.is_empty() {
            None
        } else {
            Some(
                tool_uses
                    .iter()
                    .map(|t| OpenAIToolCall {
                        id: t.id.clone(),
                        call_type: "function".to_string(),
                        function: OpenAIFunctionCall {
                            name: t.name.clone(),
                            arguments: t.input.to_string(),
                        },
                    })
                    .collect(),
            )
        };

        let text = message.text();
        let content = if text.is_empty() { None } else { Some(OpenAIContent::Text(text)) };

        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        out.push(OpenAIMessage {
            role: role.to_string(),
            content,
            tool_calls,
            tool_call_id: None,
        });
    }
    out
}

// ============================================================================
// SYSTEM-PROMPT CONTEXT SUBSTITUTIONS
// ============================================================================

/// Template substitution values contributed to system-prompt assembly (`SystemPromptConfig::context`).
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub tool_names: Vec<String>,
    pub cwd: Option<String>,
    pub platform: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub shell_env: HashMap<String, String>,
}
