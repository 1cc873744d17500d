//! The turn loop: `Client`, `AgentOptions`, and the single-shot `query()` helper
//! (engine component C5, the centerpiece of the session engine).
//!
//! `Client` owns one session's state and drives the recursive
//! "assistant → (tool calls) → tool results → assistant" loop described in the engine
//! spec: each call to [`Client::receive`] spawns the loop as a background task that
//! streams [`SessionEvent`]s back over a bounded channel, giving the caller
//! consumer-driven backpressure without blocking the loop on slow consumers.

use crate::cancel::CancellationToken;
use crate::decoder::DecoderEvent;
use crate::error::{Error, Result};
use crate::hooks::{Hooks, PostToolUseEvent, PreToolUseEvent, UserPromptSubmitEvent};
use crate::provider::{Provider, ProviderConfig, ProviderRequest};
use crate::session::{CumulativeUsage, SessionState};
use crate::system_prompt::{self, SystemPromptInput};
use crate::tools::{ResolvedTool, ToolContext, ToolFilter, ToolOutput, ToolRegistry, ToolSpec};
use crate::truncation::{self, TruncationConfig};
use crate::types::{ContentBlock, Message, MessageRole, StopReason, TextBlock, ToolResultBlock, ToolUseBlock, Usage};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tokio::sync::{mpsc, Mutex, RwLock};

const DEFAULT_MAX_TURNS: usize = 50;
const DEFAULT_CHANNEL_CAPACITY: usize = 32;

// ============================================================================
// AGENT OPTIONS
// ============================================================================

/// Configuration for a [`Client`], built with [`AgentOptionsBuilder`].
pub struct AgentOptions {
    pub system_prompt: SystemPromptInput,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub max_turns: usize,
    pub provider: Arc<dyn Provider>,
    pub registry: ToolRegistry,
    pub tool_filter: Option<ToolFilter>,
    pub hooks: Arc<Hooks>,
    pub truncation: TruncationConfig,
    pub temp_dir: PathBuf,
    pub request_timeout: std::time::Duration,
}

impl AgentOptions {
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::default()
    }
}

/// Builder for [`AgentOptions`]. Required fields: `system_prompt`, `model`, `base_url`,
/// `provider`; `build()` validates them are non-empty before returning.
#[derive(Default)]
pub struct AgentOptionsBuilder {
    system_prompt: Option<SystemPromptInput>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    max_turns: Option<usize>,
    provider: Option<Arc<dyn Provider>>,
    registry: ToolRegistry,
    tool_filter: Option<ToolFilter>,
    hooks: Option<Hooks>,
    truncation: Option<TruncationConfig>,
    temp_dir: Option<PathBuf>,
    request_timeout: Option<std::time::Duration>,
}

impl AgentOptionsBuilder {
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(SystemPromptInput::Plain(prompt.into()));
        self
    }

    pub fn system_prompt_config(mut self, config: crate::system_prompt::SystemPromptConfig) -> Self {
        self.system_prompt = Some(SystemPromptInput::Config(config));
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool(mut self, tool: crate::tools::Tool) -> Self {
        self.registry.register(Arc::new(tool));
        self
    }

    pub fn tool_filter(mut self, filter: ToolFilter) -> Self {
        self.tool_filter = Some(filter);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn truncation(mut self, config: TruncationConfig) -> Self {
        self.truncation = Some(config);
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Register a skill-source directory, synthesizing and registering the `Skill` tool
    /// the first time this is called (§4.2's "automatic injection").
    pub fn skill_loader(mut self, loader: Arc<dyn crate::skill::SkillLoader>) -> Self {
        self.registry.register(Arc::new(crate::skill::skill_tool(loader)));
        self
    }

    pub fn build(mut self) -> Result<AgentOptions> {
        let system_prompt = self
            .system_prompt
            .take()
            .ok_or_else(|| Error::config("system_prompt is required"))?;
        let model = self.model.take().ok_or_else(|| Error::config("model is required"))?;
        if model.is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        let base_url = self
            .base_url
            .take()
            .ok_or_else(|| Error::config("base_url is required"))?;
        if base_url.is_empty() {
            return Err(Error::config("base_url must not be empty"));
        }
        let provider = self
            .provider
            .take()
            .ok_or_else(|| Error::config("provider is required"))?;

        let mut registry = self.registry;
        if let Some(filter) = &self.tool_filter {
            registry.apply_filter(filter);
        }

        Ok(AgentOptions {
            system_prompt,
            model,
            base_url,
            api_key: self.api_key,
            max_tokens: self.max_tokens.unwrap_or(4096),
            temperature: self.temperature,
            max_turns: self.max_turns.unwrap_or(DEFAULT_MAX_TURNS),
            provider,
            registry,
            tool_filter: self.tool_filter,
            hooks: Arc::new(self.hooks.unwrap_or_default()),
            truncation: self.truncation.unwrap_or_default(),
            temp_dir: self.temp_dir.unwrap_or_else(std::env::temp_dir),
            request_timeout: self.request_timeout.unwrap_or(std::time::Duration::from_secs(120)),
        })
    }
}

// ============================================================================
// SESSION EVENTS
// ============================================================================

/// One event emitted by the turn loop, in the exact per-turn order documented in
/// the engine spec: text deltas, then finalized tool_use blocks, then the full
/// assistant message, then tool_result events, then stop or recurse.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Text(String),
    ToolUse(ToolUseBlock),
    Message(Message),
    ToolResult(ToolResultBlock),
    Stop { reason: StopReason, usage: Usage },
    Error(String),
    /// A hook's `system_message`, forwarded out-of-band to the caller rather than mixed
    /// into the model-visible conversation.
    SystemMessage(String),
}

/// Caller-supplied options for a single `receive()` call.
#[derive(Default, Clone)]
pub struct ReceiveOptions {
    /// Resume an interrupted loop without requiring a new pending user message.
    pub continue_: bool,
    /// An additional cancellation token OR'd with the session's own.
    pub cancel: Option<CancellationToken>,
}

// ============================================================================
// CLIENT
// ============================================================================

/// Stateful, single-session turn loop driver.
pub struct Client {
    model: String,
    base_url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: Option<f32>,
    max_turns: usize,
    provider: Arc<dyn Provider>,
    registry: Arc<Mutex<ToolRegistry>>,
    hooks: Arc<Hooks>,
    truncation: TruncationConfig,
    temp_dir: PathBuf,
    request_timeout: std::time::Duration,
    system_prompt: Arc<Mutex<SystemPromptSlot>>,

    state: Arc<RwLock<SessionState>>,
    pending: Arc<RwLock<Option<Message>>>,
    /// This session's own cancellation source. `close()` trips it; `receive()` OR's it
    /// with a caller-supplied token for that one call.
    cancellation: CancellationToken,
    closed: Arc<AtomicBool>,
    receiving: Arc<AtomicBool>,
}

impl Client {
    /// Build a fresh, in-memory-only client session from `options`.
    pub fn new(options: AgentOptions) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        let state = SessionState::new(uuid::Uuid::new_v4().to_string(), now);
        Self::from_state(options, state)
    }

    /// Build a client from an existing snapshot, as used by `SessionManager::resume`/`fork`.
    pub fn from_state(options: AgentOptions, state: SessionState) -> Self {
        Self {
            model: options.model,
            base_url: options.base_url,
            api_key: options.api_key,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            max_turns: options.max_turns,
            provider: options.provider,
            registry: Arc::new(Mutex::new(options.registry)),
            hooks: options.hooks,
            truncation: options.truncation,
            temp_dir: options.temp_dir,
            request_timeout: options.request_timeout,
            system_prompt: Arc::new(Mutex::new(SystemPromptSlot::Pending(options.system_prompt))),
            state: Arc::new(RwLock::new(state)),
            pending: Arc::new(RwLock::new(None)),
            cancellation: CancellationToken::new(),
            closed: Arc::new(AtomicBool::new(false)),
            receiving: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A shallow clone of the current session state.
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.read().await.messages.clone()
    }

    pub async fn usage(&self) -> CumulativeUsage {
        self.state.read().await.usage
    }

    /// Push a new user message and mark it pending for the next `receive()`.
    pub async fn send(&self, text: impl Into<String>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        if self.receiving.load(Ordering::SeqCst) {
            return Err(Error::AlreadyReceiving);
        }
        let message = Message::user(text);
        *self.pending.write().await = Some(message);
        Ok(())
    }

    /// Idempotent: aborts any in-flight turn and marks the session closed.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancellation.cancel();
    }

    /// Drive the turn loop, returning a stream of [`SessionEvent`]s.
    ///
    /// Spawns the loop as a background task writing into a bounded channel so a slow
    /// consumer naturally applies backpressure rather than having the loop race ahead.
    pub async fn receive(&mut self, options: ReceiveOptions) -> Result<impl Stream<Item = SessionEvent>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::SessionClosed);
        }
        if self.receiving.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyReceiving);
        }

        let pending = self.pending.write().await.take();
        if pending.is_none() && !options.continue_ {
            self.receiving.store(false, Ordering::SeqCst);
            return Err(Error::NoPendingMessage);
        }

        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let combined = self.cancellation.or(options.cancel.as_ref());

        let loop_state = TurnLoopState {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            max_turns: self.max_turns,
            provider: self.provider.clone(),
            registry: self.registry.clone(),
            hooks: self.hooks.clone(),
            truncation: self.truncation,
            temp_dir: self.temp_dir.clone(),
            request_timeout: self.request_timeout,
            system_prompt: self.system_prompt.clone(),
            state: self.state.clone(),
            session_cancel: self.cancellation.clone(),
            cancellation: combined,
            receiving: self.receiving.clone(),
        };

        tokio::spawn(run_turn_loop(loop_state, pending, tx));

        Ok(ReceiveStream { inner: rx })
    }
}

struct ReceiveStream {
    inner: mpsc::Receiver<SessionEvent>,
}

impl Stream for ReceiveStream {
    type Item = SessionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_recv(cx)
    }
}

// ============================================================================
// TURN LOOP
// ============================================================================

struct TurnLoopState {
    model: String,
    base_url: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: Option<f32>,
    max_turns: usize,
    provider: Arc<dyn Provider>,
    registry: Arc<Mutex<ToolRegistry>>,
    hooks: Arc<Hooks>,
    truncation: TruncationConfig,
    temp_dir: PathBuf,
    request_timeout: std::time::Duration,
    system_prompt: Arc<Mutex<SystemPromptSlot>>,
    state: Arc<RwLock<SessionState>>,
    /// Plain session token, passed to tool executions (a [`ToolContext`] wants a
    /// `CancellationToken`, not the call-scoped [`crate::cancel::CombinedToken`]).
    session_cancel: CancellationToken,
    cancellation: crate::cancel::CombinedToken,
    receiving: Arc<AtomicBool>,
}

async fn run_turn_loop(
    loop_state: TurnLoopState,
    pending: Option<Message>,
    tx: mpsc::Sender<SessionEvent>,
) {
    let result = run_turn_loop_inner(&loop_state, pending, &tx).await;
    if let Err(err) = result {
        let _ = tx.send(SessionEvent::Error(err.to_string())).await;
    }
    loop_state.receiving.store(false, Ordering::SeqCst);
}

async fn run_turn_loop_inner(
    loop_state: &TurnLoopState,
    pending: Option<Message>,
    tx: &mpsc::Sender<SessionEvent>,
) -> Result<()> {
    if let Some(mut user_message) = pending {
        let event = UserPromptSubmitEvent {
            session_id: loop_state.state.read().await.id.clone(),
            prompt: user_message.text(),
        };
        let decision = loop_state.hooks.run_user_prompt_submit(&event).await;
        if let Some(extra) = decision.additional_context {
            if let Some(ContentBlock::Text(text_block)) = user_message.content.first_mut() {
                text_block.text.push_str("\n\n");
                text_block.text.push_str(&extra);
            }
        }
        loop_state.state.write().await.messages.push(user_message);
    }

    let system_prompt = resolve_system_prompt(loop_state).await?;

    loop {
        if loop_state.cancellation.is_cancelled() {
            return Ok(());
        }

        let assistant_turns = {
            let state = loop_state.state.read().await;
            state.messages.iter().filter(|m| m.role == MessageRole::Assistant).count()
        };
        if assistant_turns >= loop_state.max_turns {
            tx.send(SessionEvent::Stop {
                reason: StopReason::MaxTurns,
                usage: loop_state.state.read().await.usage_as_usage(),
            })
            .await
            .ok();
            return Ok(());
        }

        let tool_specs: Vec<ToolSpec> = {
            let registry = loop_state.registry.lock().await;
            registry
                .definitions()
                .iter()
                .map(|t| ToolSpec::from_definition(t.as_ref()))
                .collect()
        };

        let (assistant_message, stop_reason, turn_usage) =
            run_one_assistant_turn(loop_state, &tool_specs, system_prompt.as_deref(), tx).await?;

        let tool_uses = assistant_message.tool_uses().into_iter().cloned().collect::<Vec<_>>();
        {
            let mut state = loop_state.state.write().await;
            state.messages.push(assistant_message.clone());
            state.add_usage(turn_usage.input, turn_usage.output);
        }
        tx.send(SessionEvent::Message(assistant_message)).await.ok();

        if loop_state.cancellation.is_cancelled() {
            return Ok(());
        }

        if tool_uses.is_empty() {
            let final_usage = loop_state.state.read().await.usage_as_usage();
            tx.send(SessionEvent::Stop {
                reason: stop_reason,
                usage: final_usage,
            })
            .await
            .ok();
            return Ok(());
        }

        let mut results = Vec::with_capacity(tool_uses.len());
        for tool_use in &tool_uses {
            if loop_state.cancellation.is_cancelled() {
                return Ok(());
            }
            let result = execute_tool_call(loop_state, tool_use, tx).await;
            tx.send(SessionEvent::ToolResult(result.clone())).await.ok();
            results.push(ContentBlock::ToolResult(result));
        }

        let tool_result_message = Message::new(MessageRole::User, results);
        loop_state.state.write().await.messages.push(tool_result_message);
    }
}

/// Caches the resolved system prompt on first use so every later turn of a multi-turn
/// session reuses it rather than re-resolving (and re-reading any config-backed inputs).
enum SystemPromptSlot {
    Pending(SystemPromptInput),
    Resolved(Option<String>),
}

async fn resolve_system_prompt(loop_state: &TurnLoopState) -> Result<Option<String>> {
    let mut guard = loop_state.system_prompt.lock().await;
    match &*guard {
        SystemPromptSlot::Resolved(resolved) => Ok(resolved.clone()),
        SystemPromptSlot::Pending(_) => {
            let SystemPromptSlot::Pending(input) =
                std::mem::replace(&mut *guard, SystemPromptSlot::Resolved(None))
            else {
                unreachable!()
            };
            let resolved = system_prompt::build(input).await?;
            *guard = SystemPromptSlot::Resolved(resolved.clone());
            Ok(resolved)
        }
    }
}

async fn run_one_assistant_turn(
    loop_state: &TurnLoopState,
    tool_specs: &[ToolSpec],
    system_prompt: Option<&str>,
    tx: &mpsc::Sender<SessionEvent>,
) -> Result<(Message, StopReason, Usage)> {
    let messages = loop_state.state.read().await.messages.clone();

    let config = ProviderConfig {
        model: loop_state.model.clone(),
        max_tokens: loop_state.max_tokens,
        temperature: loop_state.temperature,
        base_url: loop_state.base_url.clone(),
        api_key: loop_state.api_key.clone(),
        request_timeout: loop_state.request_timeout,
    };
    let request = ProviderRequest {
        messages: &messages,
        tools: tool_specs,
        system_prompt,
        config: &config,
    };

    let mut stream: BoxStream<'_, Result<DecoderEvent>> = loop_state
        .provider
        .stream(request, loop_state.cancellation.clone())
        .await?;

    let mut blocks = Vec::new();
    let mut usage = Usage::default();
    let mut stop_reason = StopReason::EndTurn;

    while let Some(event) = stream.next().await {
        if loop_state.cancellation.is_cancelled() {
            break;
        }
        match event? {
            DecoderEvent::TextDelta(text) => {
                tx.send(SessionEvent::Text(text)).await.ok();
            }
            DecoderEvent::Block(ContentBlock::ToolUse(tool_use)) => {
                tx.send(SessionEvent::ToolUse(tool_use.clone())).await.ok();
                blocks.push(ContentBlock::ToolUse(tool_use));
            }
            DecoderEvent::Block(block) => blocks.push(block),
            DecoderEvent::UsageUpdate(u) => usage += u,
            DecoderEvent::Stop(reason) => stop_reason = reason,
        }
    }

    if blocks.is_empty() {
        // Stream ended without ever opening a content block (e.g. provider cut off early).
        blocks.push(ContentBlock::Text(TextBlock::new(String::new())));
    }

    let mut message = Message::assistant(blocks);
    message.stop_reason = Some(stop_reason.clone());
    message.usage = Some(usage);

    Ok((message, stop_reason, usage))
}

async fn execute_tool_call(
    loop_state: &TurnLoopState,
    tool_use: &ToolUseBlock,
    tx: &mpsc::Sender<SessionEvent>,
) -> ToolResultBlock {
    let resolved = {
        let mut registry = loop_state.registry.lock().await;
        registry.resolve(&tool_use.name)
    };

    let (tool, mut input) = match resolved {
        ResolvedTool::Found(tool) => (tool, tool_use.input.clone()),
        ResolvedTool::Repaired { tool, .. } => (tool, tool_use.input.clone()),
        ResolvedTool::NotFound => {
            let names = loop_state.registry.lock().await.names();
            return ToolResultBlock::error(tool_use.id.clone(), crate::tools::unknown_tool_message(&names));
        }
    };

    let pre_event = PreToolUseEvent {
        session_id: loop_state.state.read().await.id.clone(),
        tool_name: tool_use.name.clone(),
        tool_input: input.clone(),
    };
    let pre_decision = loop_state.hooks.run_pre_tool_use(&pre_event).await;
    if let Some(message) = pre_decision.system_message {
        tx.send(SessionEvent::SystemMessage(message)).await.ok();
    }

    if !pre_decision.continue_ {
        let reason = pre_decision.reason.unwrap_or_else(|| "Execution stopped by hook".to_string());
        return ToolResultBlock::error(tool_use.id.clone(), reason);
    }
    if let Some(decision) = pre_decision.permission_decision {
        if !decision.permits_execution() {
            let reason = pre_decision.reason.unwrap_or_else(|| "Denied by hook".to_string());
            return ToolResultBlock::error(tool_use.id.clone(), reason);
        }
    }
    if let Some(updated) = pre_decision.updated_input {
        input = updated;
    }

    if let Err(err) = crate::tools::validate_input(&tool.input_schema(), &input) {
        return ToolResultBlock::error(tool_use.id.clone(), err.to_string());
    }

    let context = ToolContext {
        session_id: loop_state.state.read().await.id.clone(),
        cancellation: loop_state.session_cancel.clone(),
    };

    let output = match tool.execute(input.clone(), &context).await {
        Ok(output) => output,
        Err(err) => ToolOutput::error(err.to_string()),
    };

    let truncated_content = truncation::guard(&output.content, &loop_state.truncation, &loop_state.temp_dir)
        .unwrap_or(output.content.clone());

    let post_event = PostToolUseEvent {
        session_id: loop_state.state.read().await.id.clone(),
        tool_name: tool_use.name.clone(),
        tool_input: input,
        tool_output: truncated_content.clone(),
        is_error: output.is_error,
    };
    let post_decision = loop_state.hooks.run_post_tool_use(&post_event).await;
    if let Some(message) = post_decision.system_message {
        tx.send(SessionEvent::SystemMessage(message)).await.ok();
    }

    let mut content = truncated_content;
    if let Some(extra) = post_decision.additional_context {
        content.push_str("\n\n");
        content.push_str(&extra);
    }

    if output.is_error {
        ToolResultBlock::error(tool_use.id.clone(), content)
    } else {
        ToolResultBlock::new(tool_use.id.clone(), content)
    }
}

// ============================================================================
// SIMPLE SINGLE-TURN QUERY
// ============================================================================

/// Single-turn convenience wrapper: send one message, collect every streamed text
/// delta and tool-use block, and return the assistant's finalized content blocks.
pub async fn query(prompt: impl Into<String>, options: AgentOptions) -> Result<Vec<ContentBlock>> {
    let mut client = Client::new(options);
    client.send(prompt).await?;
    let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await?);

    let mut blocks = Vec::new();
    while let Some(event) = stream.next().await {
        match event {
            SessionEvent::ToolUse(tool_use) => blocks.push(ContentBlock::ToolUse(tool_use)),
            SessionEvent::Message(message) => {
                for block in message.content {
                    if matches!(block, ContentBlock::Text(_)) {
                        blocks.push(block);
                    }
                }
            }
            SessionEvent::Error(message) => return Err(Error::other(message)),
            SessionEvent::Stop { .. } => break,
            _ => {}
        }
    }
    Ok(blocks)
}

impl SessionState {
    fn usage_as_usage(&self) -> Usage {
        Usage::new(self.usage.input, self.usage.output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool;

    #[test]
    fn builder_requires_model_base_url_and_provider() {
        struct NoopProvider;
        #[async_trait::async_trait]
        impl Provider for NoopProvider {
            async fn stream<'a>(
                &'a self,
                _request: ProviderRequest<'a>,
                _cancellation: crate::cancel::CombinedToken,
            ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
                Ok(Box::pin(futures::stream::empty()))
            }
        }

        let missing_model = AgentOptions::builder()
            .system_prompt("hi")
            .base_url("http://localhost")
            .provider(Arc::new(NoopProvider))
            .build();
        assert!(missing_model.is_err());

        let ok = AgentOptions::builder()
            .system_prompt("hi")
            .model("test-model")
            .base_url("http://localhost")
            .provider(Arc::new(NoopProvider))
            .build();
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn send_before_first_receive_sets_pending() {
        struct NoopProvider;
        #[async_trait::async_trait]
        impl Provider for NoopProvider {
            async fn stream<'a>(
                &'a self,
                _request: ProviderRequest<'a>,
                _cancellation: crate::cancel::CombinedToken,
            ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
                Ok(Box::pin(futures::stream::empty()))
            }
        }
        let options = AgentOptions::builder()
            .system_prompt("hi")
            .model("m")
            .base_url("http://localhost")
            .provider(Arc::new(NoopProvider))
            .build()
            .unwrap();
        let client = Client::new(options);
        client.send("hello").await.unwrap();
        assert!(client.pending.read().await.is_some());
    }

    #[tokio::test]
    async fn closed_session_rejects_send() {
        struct NoopProvider;
        #[async_trait::async_trait]
        impl Provider for NoopProvider {
            async fn stream<'a>(
                &'a self,
                _request: ProviderRequest<'a>,
                _cancellation: crate::cancel::CombinedToken,
            ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
                Ok(Box::pin(futures::stream::empty()))
            }
        }
        let options = AgentOptions::builder()
            .system_prompt("hi")
            .model("m")
            .base_url("http://localhost")
            .provider(Arc::new(NoopProvider))
            .build()
            .unwrap();
        let client = Client::new(options);
        client.close().await;
        let err = client.send("hello").await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[tokio::test]
    async fn system_prompt_is_resent_on_every_turn_of_a_multi_turn_session() {
        struct RecordingProvider {
            seen: std::sync::Arc<std::sync::Mutex<Vec<Option<String>>>>,
        }
        #[async_trait::async_trait]
        impl Provider for RecordingProvider {
            async fn stream<'a>(
                &'a self,
                request: ProviderRequest<'a>,
                _cancellation: crate::cancel::CombinedToken,
            ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
                self.seen.lock().unwrap().push(request.system_prompt.map(str::to_string));
                let events = vec![
                    DecoderEvent::Block(ContentBlock::Text(TextBlock::new("ok"))),
                    DecoderEvent::Stop(StopReason::EndTurn),
                ];
                Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
            }
        }

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let options = AgentOptions::builder()
            .system_prompt("you are a helpful assistant")
            .model("m")
            .base_url("http://localhost")
            .provider(Arc::new(RecordingProvider { seen: seen.clone() }))
            .build()
            .unwrap();

        let mut client = Client::new(options);

        client.send("first").await.unwrap();
        let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await.unwrap());
        while stream.next().await.is_some() {}
        drop(stream);

        client.send("second").await.unwrap();
        let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await.unwrap());
        while stream.next().await.is_some() {}
        drop(stream);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].as_deref(), Some("you are a helpful assistant"));
        assert_eq!(
            seen[1].as_deref(),
            Some("you are a helpful assistant"),
            "second turn must still carry the system prompt, not fall back to None"
        );
    }

    #[tokio::test]
    async fn full_turn_with_scripted_provider_and_tool_emits_expected_event_order() {
        use crate::decoder::{AnthropicStreamEvent, BlockDelta, StartBlock};

        struct ScriptedProvider;
        #[async_trait::async_trait]
        impl Provider for ScriptedProvider {
            async fn stream<'a>(
                &'a self,
                _request: ProviderRequest<'a>,
                _cancellation: crate::cancel::CombinedToken,
            ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
                use crate::decoder::{AnthropicDecoder, ProviderEvent, StreamDecoder};
                let mut decoder = AnthropicDecoder::new();
                let mut out = Vec::new();

                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockStart {
                    index: 0,
                    content_block: StartBlock::Text { text: String::new() },
                }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: BlockDelta::TextDelta { text: "Hi".to_string() },
                }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockStop { index: 0 }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::MessageStop))?);

                Ok(Box::pin(futures::stream::iter(out.into_iter().map(Ok))))
            }
        }

        let echo = tool("Echo", "echoes")
            .string_param("text", "text", true)
            .handler(|input, _ctx| async move { Ok(ToolOutput::ok(input["text"].as_str().unwrap_or("").to_string())) });

        let options = AgentOptions::builder()
            .system_prompt("hi")
            .model("m")
            .base_url("http://localhost")
            .provider(Arc::new(ScriptedProvider))
            .tool(echo)
            .build()
            .unwrap();

        let mut client = Client::new(options);
        client.send("hello").await.unwrap();
        let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await.unwrap());

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert!(events.iter().any(|e| matches!(e, SessionEvent::Text(t) if t == "Hi")));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Message(_))));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Stop { .. })));
    }

    #[tokio::test]
    async fn max_turns_exceeded_emits_stop_with_max_turns_reason() {
        struct LoopingProvider;
        #[async_trait::async_trait]
        impl Provider for LoopingProvider {
            async fn stream<'a>(
                &'a self,
                _request: ProviderRequest<'a>,
                _cancellation: crate::cancel::CombinedToken,
            ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
                use crate::decoder::{AnthropicDecoder, AnthropicStreamEvent, BlockDelta, ProviderEvent, StartBlock, StreamDecoder};
                let mut decoder = AnthropicDecoder::new();
                let mut out = Vec::new();
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockStart {
                    index: 0,
                    content_block: StartBlock::ToolUse { id: "t1".to_string(), name: "Echo".to_string() },
                }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: BlockDelta::InputJsonDelta { partial_json: "{\"text\":\"x\"}".to_string() },
                }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockStop { index: 0 }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::MessageStop))?);
                Ok(Box::pin(futures::stream::iter(out.into_iter().map(Ok))))
            }
        }

        let echo = tool("Echo", "echoes")
            .string_param("text", "text", true)
            .handler(|input, _ctx| async move { Ok(ToolOutput::ok(input["text"].as_str().unwrap_or("").to_string())) });

        let options = AgentOptions::builder()
            .system_prompt("hi")
            .model("m")
            .base_url("http://localhost")
            .provider(Arc::new(LoopingProvider))
            .tool(echo)
            .max_turns(1)
            .build()
            .unwrap();

        let mut client = Client::new(options);
        client.send("hello").await.unwrap();
        let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await.unwrap());

        let mut saw_max_turns = false;
        while let Some(event) = stream.next().await {
            if let SessionEvent::Stop { reason: StopReason::MaxTurns, .. } = event {
                saw_max_turns = true;
            }
        }
        assert!(saw_max_turns);
    }

    #[tokio::test]
    async fn unknown_tool_yields_error_result_not_a_panic() {
        struct ToolCallProvider;
        #[async_trait::async_trait]
        impl Provider for ToolCallProvider {
            async fn stream<'a>(
                &'a self,
                _request: ProviderRequest<'a>,
                _cancellation: crate::cancel::CombinedToken,
            ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
                use crate::decoder::{AnthropicDecoder, AnthropicStreamEvent, ProviderEvent, StartBlock, StreamDecoder};
                let mut decoder = AnthropicDecoder::new();
                let mut out = Vec::new();
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockStart {
                    index: 0,
                    content_block: StartBlock::ToolUse { id: "t1".to_string(), name: "Nonexistent".to_string() },
                }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::ContentBlockStop { index: 0 }))?);
                out.extend(decoder.feed(ProviderEvent::Anthropic(AnthropicStreamEvent::MessageStop))?);
                Ok(Box::pin(futures::stream::iter(out.into_iter().map(Ok))))
            }
        }

        let options = AgentOptions::builder()
            .system_prompt("hi")
            .model("m")
            .base_url("http://localhost")
            .provider(Arc::new(ToolCallProvider))
            .max_turns(1)
            .build()
            .unwrap();

        let mut client = Client::new(options);
        client.send("hello").await.unwrap();
        let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await.unwrap());

        let mut saw_error_result = false;
        while let Some(event) = stream.next().await {
            if let SessionEvent::ToolResult(result) = event {
                saw_error_result = result.is_error();
            }
        }
        assert!(saw_error_result);
    }
}
