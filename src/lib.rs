//! # Open Agent SDK - Rust Implementation
//!
//! A production-ready, streaming-first Rust SDK for building agentic sessions on top of
//! Anthropic-style and OpenAI-compatible model servers.
//!
//! ## Overview
//!
//! This SDK provides a clean, ergonomic session engine for driving an LLM through a
//! recursive turn loop: send a message, stream the model's response, execute any
//! requested tool calls, and feed the results back for the next turn — with hooks,
//! truncation, and persistence wired in at the right seams.
//!
//! ## Key Features
//!
//! - **Dual Provider Support**: Anthropic-style streaming and OpenAI-compatible chat
//!   completions behind one `Provider` trait
//! - **Streaming Responses**: Real-time token-by-token streaming via a unified decoder
//! - **Tool Calling**: Define and execute tools with automatic schema generation, name
//!   repair, and MCP-namespaced proxying
//! - **Lifecycle Hooks**: Intercept and control execution at key points
//! - **Truncation Guard**: Oversized tool output is clipped and spilled to disk
//!   automatically
//! - **Session Persistence**: Pluggable storage for resuming and forking sessions
//! - **Interrupts**: Gracefully cancel long-running operations
//! - **Retry Logic**: Exponential backoff with jitter for reliability
//!
//! ## Two Interaction Modes
//!
//! ### 1. Simple Query Function (`query()`)
//! For single-turn interactions without conversation state:
//!
//! ```rust,no_run
//! use open_agent::{query, AgentOptions, ContentBlock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful assistant")
//!         .model("claude-sonnet-4-5")
//!         .base_url("https://api.anthropic.com")
//!         .provider(std::sync::Arc::new(open_agent::AnthropicProvider::new()))
//!         .build()?;
//!
//!     let blocks = query("What's the capital of France?", options).await?;
//!     for block in blocks {
//!         if let ContentBlock::Text(text) = block {
//!             print!("{}", text.text);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ### 2. Client Object (`Client`)
//! For multi-turn conversations with persistent state:
//!
//! ```rust,no_run
//! use open_agent::{Client, AgentOptions, ReceiveOptions, SessionEvent};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = AgentOptions::builder()
//!         .system_prompt("You are a helpful assistant")
//!         .model("claude-sonnet-4-5")
//!         .base_url("https://api.anthropic.com")
//!         .provider(std::sync::Arc::new(open_agent::AnthropicProvider::new()))
//!         .build()?;
//!
//!     let mut client = Client::new(options);
//!
//!     client.send("What's 2+2?").await?;
//!     let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await?);
//!     while let Some(event) = stream.next().await {
//!         if let SessionEvent::Text(text) = event {
//!             print!("{}", text);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The SDK is organized into several modules, each with a specific responsibility:
//!
//! - **client**: The turn loop, `AgentOptions`, `Client`, and `query()` (C5)
//! - **decoder**: Stream decoding from provider wire events to a unified event vocabulary (C1)
//! - **tools**: Tool definition, registry, and name resolution (C2)
//! - **hooks**: Lifecycle hook pipeline (C3)
//! - **truncation**: Oversized tool output guard (C4)
//! - **session**: Session state and pluggable storage (C6/C7)
//! - **system_prompt**: System prompt assembly from presets and project context (C8)
//! - **provider**: Pluggable LLM backends (Anthropic-style, OpenAI-compatible)
//! - **mcp**: MCP server proxy interface
//! - **skill**: Skill discovery, frontmatter parsing, and the built-in Skill tool
//! - **types**: Data structures for messages, content blocks, and wire formats
//! - **config**: Provider-specific configuration helpers
//! - **error**: Comprehensive error types and conversions
//! - **context**: Token estimation and message truncation utilities
//! - **cancel**: Cooperative cancellation tokens
//! - **retry**: Exponential backoff retry logic with jitter
//! - **utils**: Internal utilities for SSE parsing and tool aggregation

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
// These modules are private (internal implementation details) unless explicitly
// re-exported through `pub use` statements below.

/// The turn loop: `AgentOptions`, `Client`, `SessionEvent`, and the single-shot `query()`
/// function. The centerpiece of the session engine.
mod client;

/// Provider configuration helpers for resolving base URLs and model names.
mod config;

/// Context window management utilities for token estimation and history truncation.
mod context;

/// Error types and conversions for comprehensive error handling throughout the SDK.
mod error;

/// Lifecycle hooks system for intercepting and controlling execution at key points.
mod hooks;

/// Tool definition and execution system with automatic JSON schema generation.
mod tools;

/// Core type definitions for messages, content blocks, and wire formats.
mod types;

/// Internal utilities for Server-Sent Events (SSE) parsing and tool call aggregation.
mod utils;

/// Stream decoding from provider wire events into a unified decoder event vocabulary.
mod decoder;

/// Cooperative cancellation tokens.
mod cancel;

/// Oversized tool output truncation guard, with spill-to-disk and recovery hints.
mod truncation;

/// Session state, pluggable storage, and session lifecycle management.
mod session;

/// System prompt assembly from presets, prepend/append sections, and project context.
mod system_prompt;

/// Pluggable LLM provider adapters (Anthropic-style streaming, OpenAI-compatible chat).
mod provider;

/// MCP server proxy interface for namespaced tool calls.
mod mcp;

/// Skill discovery, frontmatter parsing, and the built-in Skill tool.
mod skill;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================
// These items form the public API of the SDK. Everything else is internal.

/// Retry utilities with exponential backoff and jitter.
pub mod retry;

// --- Core Client API ---

pub use client::{
    /// Configuration options for an agent session, built using the builder pattern.
    AgentOptions,

    /// Builder for constructing AgentOptions with type-safe validation.
    /// Required fields: system_prompt, model, base_url, provider.
    AgentOptionsBuilder,

    /// Stateful multi-turn conversation client driving the recursive turn loop.
    Client,

    /// Caller-supplied options for a single `receive()` call.
    ReceiveOptions,

    /// One event emitted by the turn loop: text deltas, tool uses, finalized
    /// messages, tool results, stop, or error.
    SessionEvent,

    /// Simple single-turn query function returning the assistant's finalized content blocks.
    query,
};

// --- Provider Configuration ---

pub use config::{
    /// Enum representing supported LLM endpoint conventions.
    Provider as ProviderKind,

    /// Get the base URL for API requests, with support for environment variable overrides.
    get_base_url,

    /// Get the model name for requests, with optional environment variable override.
    get_model,
};

// --- Providers (C1 adapters) ---

pub use provider::{
    /// Anthropic-style Messages API adapter, feeding the unified stream decoder.
    AnthropicProvider,

    /// OpenAI-compatible chat-completions adapter, feeding the unified stream decoder.
    OpenAiProvider,

    /// Pluggable LLM backend trait implemented by the adapters above.
    Provider,

    /// Model and request-shaping knobs passed to a provider on every call.
    ProviderConfig,

    /// Everything a provider needs to produce the next assistant turn.
    ProviderRequest,
};

pub use decoder::DecoderEvent;

// --- Context Management ---

pub use context::{
    /// Estimate the number of tokens in a message history using a character-based approximation.
    estimate_tokens,

    /// Check if a message history is approaching a token limit.
    is_approaching_limit,

    /// Truncate message history to keep only the most recent turns.
    truncate_messages,
};

// --- Error Handling ---

pub use error::{
    /// Comprehensive error type covering HTTP, JSON, API, streaming, and configuration errors.
    Error,

    /// Type alias for Result<T, Error> used throughout the SDK.
    Result,
};

// --- Lifecycle Hooks ---

pub use hooks::{
    /// Constant string identifier for the PreToolUse hook type.
    HOOK_PRE_TOOL_USE,

    /// Constant string identifier for the PostToolUse hook type.
    HOOK_POST_TOOL_USE,

    /// Constant string identifier for the UserPromptSubmit hook type.
    HOOK_USER_PROMPT_SUBMIT,

    /// Decision object returned by hooks to control execution flow.
    HookDecision,

    /// Container for registering and managing lifecycle hooks.
    Hooks,

    /// Allow, deny, or ask (treated as allow) for a pending tool call.
    PermissionDecision,

    /// Event data passed to PostToolUse hooks after tool execution.
    PostToolUseEvent,

    /// Event data passed to PreToolUse hooks before tool execution.
    PreToolUseEvent,

    /// Event data passed to UserPromptSubmit hooks before sending prompts to the provider.
    UserPromptSubmitEvent,
};

// --- Tool System ---

pub use tools::{
    /// Context passed to a tool's execute method (session id, cancellation).
    ToolContext,

    /// Outcome of resolving a model-emitted tool name against the registry.
    ResolvedTool,

    /// Allow/deny policy for which tools are exposed to the model.
    ToolFilter,

    /// The result of executing a tool: content plus an error flag.
    ToolOutput,

    /// Exact and case-insensitive name to tool registry, with MCP proxying.
    ToolRegistry,

    /// A tool the model can invoke, implemented by hand or via ToolBuilder.
    Tool,

    /// Builder for constructing tools with fluent parameter definition.
    ToolBuilder,

    /// A tool the model can invoke, as an async trait for hand-rolled implementations.
    ToolDefinition,

    /// Convenience function to start building a tool with name and description.
    tool,

    /// Validate a tool's input against its JSON-Schema-lite description.
    validate_input,
};

// --- Truncation Guard ---

pub use truncation::{
    /// Which end of oversized content to keep when truncating.
    Keep,

    /// Configuration for the truncation guard.
    TruncationConfig,

    /// Check content against the configured limits, spilling to disk if either is exceeded.
    guard,
};

// --- Session State & Storage ---

pub use session::{
    /// Cumulative token usage across a session's assistant messages.
    CumulativeUsage,

    /// Configuration controlling how SessionManager::create resolves a session.
    CreateConfig,

    /// In-memory session storage backend, for tests and ephemeral sessions.
    InMemoryStorage,

    /// File-backed session storage backend: one JSON file per session.
    FileStorage,

    /// The persisted, cloneable state of a session.
    SessionState,

    /// Owns the set of live sessions by id, coordinating with a Storage backend.
    SessionManager,

    /// Pluggable persistence backend for session snapshots.
    Storage,
};

// --- System Prompt Assembly ---

pub use system_prompt::{
    /// Built-in prompt templates selectable via SystemPromptConfig::preset.
    Preset,

    /// Structured configuration for building a system prompt.
    SystemPromptConfig,

    /// Either a plain string used verbatim, or a SystemPromptConfig.
    SystemPromptInput,
};

// --- MCP Proxy ---

pub use mcp::McpServer;

// --- Skills ---

pub use skill::{
    /// Result of evaluating whether a skill should activate for the current turn.
    ActivationResult,

    /// Options controlling where and how deep skill discovery searches.
    DiscoverOptions,

    /// A parsed frontmatter scalar or array value.
    FrontmatterValue,

    /// A discovered skill: name, description, filesystem path, and frontmatter metadata.
    Skill,

    /// Pluggable skill discovery and activation-check backend.
    SkillLoader,

    /// Parse a `---`-delimited frontmatter block, for `SkillLoader` implementers.
    parse_frontmatter,
};

// --- Core Types ---

pub use types::{
    /// Enum representing a unit of content in a message (Text, ToolUse, ToolResult, Image).
    ContentBlock,

    /// An image content block, holding either a remote URL or a base64 data URI.
    ImageBlock,

    /// Detail level requested for an image.
    ImageDetail,

    /// A single message in a conversation with a role and content blocks.
    Message,

    /// Role of a message participant (System, User, Assistant, or Tool).
    MessageRole,

    /// Ambient context substituted into system-prompt templates.
    PromptContext,

    /// Why the model (or the turn loop) stopped generating.
    StopReason,

    /// Content block containing plain text.
    TextBlock,

    /// Content block containing the result of a tool execution.
    ToolResultBlock,

    /// Content block representing a tool call made by the model.
    ToolUseBlock,

    /// Token usage for a single assistant message or a running total.
    Usage,

    /// OpenAI-wire message content: either a plain string or an array of parts.
    OpenAIContent,

    /// One part of an OpenAI-wire multi-part message content array.
    OpenAIContentPart,

    /// OpenAI-wire chat message, produced by `to_openai_messages`.
    OpenAIMessage,

    /// OpenAI-wire streamed chat-completion chunk.
    OpenAIChunk,
};

// --- Cancellation ---

pub use cancel::{
    /// A cloneable, cooperative cancellation flag.
    CancellationToken,

    /// The OR-combination of a session's own cancellation token and an optional caller one.
    CombinedToken,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types and functions.
/// Import with `use open_agent::prelude::*;` to get everything you need for typical usage.
pub mod prelude {
    pub use crate::{
        AgentOptions, AgentOptionsBuilder, AnthropicProvider, CancellationToken, Client,
        ContentBlock, Error, HookDecision, Hooks, OpenAiProvider, PostToolUseEvent,
        PreToolUseEvent, Provider, ReceiveOptions, Result, SessionEvent, TextBlock, Tool,
        ToolUseBlock, UserPromptSubmitEvent, query, tool,
    };
}
