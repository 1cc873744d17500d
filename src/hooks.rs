//! Lifecycle hooks pipeline (engine component C3).
//!
//! Hooks let a caller observe and steer the turn loop at three points: before a tool
//! runs, after a tool runs, and before a user prompt is sent to the provider. Callbacks
//! are grouped by an optional matcher (a tool-name glob for the tool hooks) and run
//! sequentially within a group; the first callback to return a decision other than
//! `Continue` short-circuits the remaining callbacks in that group.

use crate::tools::Pattern;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub const HOOK_PRE_TOOL_USE: &str = "PreToolUse";
pub const HOOK_POST_TOOL_USE: &str = "PostToolUse";
pub const HOOK_USER_PROMPT_SUBMIT: &str = "UserPromptSubmit";

/// The decision a hook callback returns.
#[derive(Debug, Clone, Default)]
pub struct HookDecision {
    /// Whether the turn loop should continue. `false` aborts the current turn.
    pub continue_: bool,
    /// For PreToolUse hooks: explicit allow/deny of the pending tool call.
    pub permission_decision: Option<PermissionDecision>,
    /// Human-readable reason accompanying `permission_decision` or `continue_ = false`.
    pub reason: Option<String>,
    /// For PreToolUse hooks: a replacement for the tool's input, applied before execution.
    pub updated_input: Option<Value>,
    /// A message surfaced to the session's output stream as a system notice.
    pub system_message: Option<String>,
    /// Extra text appended to the next turn's context (e.g. for UserPromptSubmit hooks).
    pub additional_context: Option<String>,
}

impl HookDecision {
    /// The default decision: proceed, no overrides.
    pub fn continue_default() -> Self {
        Self {
            continue_: true,
            ..Default::default()
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            continue_: true,
            permission_decision: Some(PermissionDecision::Deny),
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn stop(reason: impl Into<String>) -> Self {
        Self {
            continue_: false,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
    /// The SDK does not present interactive prompts itself; treated identically to
    /// `Allow` by the turn loop. Gated collaborators (e.g. a CLI) may intercept it.
    Ask,
}

impl PermissionDecision {
    /// Whether the turn loop should proceed with the tool call, `Ask` is not interactive
    /// here and resolves to `true` same as `Allow`.
    pub fn permits_execution(self) -> bool {
        !matches!(self, PermissionDecision::Deny)
    }
}

/// Event data passed to PreToolUse callbacks.
#[derive(Debug, Clone)]
pub struct PreToolUseEvent {
    pub session_id: String,
    pub tool_name: String,
    pub tool_input: Value,
}

/// Event data passed to PostToolUse callbacks.
#[derive(Debug, Clone)]
pub struct PostToolUseEvent {
    pub session_id: String,
    pub tool_name: String,
    pub tool_input: Value,
    pub tool_output: String,
    pub is_error: bool,
}

/// Event data passed to UserPromptSubmit callbacks.
#[derive(Debug, Clone)]
pub struct UserPromptSubmitEvent {
    pub session_id: String,
    pub prompt: String,
}

/// A single registered callback, implemented either by hand or via a plain async closure
/// through the `*_fn` constructors below.
#[async_trait]
pub trait HookCallback<E>: Send + Sync {
    async fn call(&self, event: &E) -> HookDecision;
}

type BoxFuture<T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send>>;

struct FnCallback<E> {
    f: Arc<dyn Fn(&E) -> BoxFuture<HookDecision> + Send + Sync>,
}

#[async_trait]
impl<E: Send + Sync> HookCallback<E> for FnCallback<E> {
    async fn call(&self, event: &E) -> HookDecision {
        (self.f)(event).await
    }
}

fn fn_callback<E, F, Fut>(f: F) -> Arc<dyn HookCallback<E>>
where
    E: Send + Sync + 'static,
    F: Fn(&E) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = HookDecision> + Send + 'static,
{
    Arc::new(FnCallback {
        f: Arc::new(move |event| Box::pin(f(event))),
    })
}

struct MatcherGroup<E> {
    matcher: Option<Pattern>,
    callbacks: Vec<Arc<dyn HookCallback<E>>>,
}

/// The registered hooks for a session, one matcher-grouped list per hook type.
#[derive(Default)]
pub struct Hooks {
    pre_tool_use: Vec<MatcherGroup<PreToolUseEvent>>,
    post_tool_use: Vec<MatcherGroup<PostToolUseEvent>>,
    user_prompt_submit: Vec<Arc<dyn HookCallback<UserPromptSubmitEvent>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a PreToolUse callback, optionally restricted to tool names matching
    /// `matcher` (a glob like `Bash*`; `None` matches every tool).
    pub fn on_pre_tool_use<F, Fut>(&mut self, matcher: Option<&str>, callback: F) -> &mut Self
    where
        F: Fn(&PreToolUseEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HookDecision> + Send + 'static,
    {
        self.pre_tool_use.push(MatcherGroup {
            matcher: matcher.map(Pattern::new),
            callbacks: vec![fn_callback(callback)],
        });
        self
    }

    pub fn on_post_tool_use<F, Fut>(&mut self, matcher: Option<&str>, callback: F) -> &mut Self
    where
        F: Fn(&PostToolUseEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HookDecision> + Send + 'static,
    {
        self.post_tool_use.push(MatcherGroup {
            matcher: matcher.map(Pattern::new),
            callbacks: vec![fn_callback(callback)],
        });
        self
    }

    pub fn on_user_prompt_submit<F, Fut>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&UserPromptSubmitEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HookDecision> + Send + 'static,
    {
        self.user_prompt_submit.push(fn_callback(callback));
        self
    }

    /// Run every matching PreToolUse group's callbacks in registration order, stopping at
    /// the first non-continue-default decision.
    pub async fn run_pre_tool_use(&self, event: &PreToolUseEvent) -> HookDecision {
        run_groups(&self.pre_tool_use, &event.tool_name, event).await
    }

    pub async fn run_post_tool_use(&self, event: &PostToolUseEvent) -> HookDecision {
        run_groups(&self.post_tool_use, &event.tool_name, event).await
    }

    pub async fn run_user_prompt_submit(&self, event: &UserPromptSubmitEvent) -> HookDecision {
        let mut permission_decision = None;
        let mut reason = None;
        let mut system_messages = Vec::new();
        let mut additional_contexts = Vec::new();

        for callback in &self.user_prompt_submit {
            let decision = callback.call(event).await;
            merge_decision(&decision, &mut permission_decision, &mut reason, &mut system_messages, &mut additional_contexts);

            if !decision.continue_ || matches!(permission_decision, Some(PermissionDecision::Deny)) {
                return HookDecision {
                    continue_: decision.continue_,
                    permission_decision,
                    reason,
                    updated_input: None,
                    system_message: join_messages(system_messages),
                    additional_context: join_messages(additional_contexts),
                };
            }
        }

        HookDecision {
            continue_: true,
            permission_decision,
            reason,
            updated_input: None,
            system_message: join_messages(system_messages),
            additional_context: join_messages(additional_contexts),
        }
    }
}

/// Callbacks for a tool hook see the input as updated by every prior callback in the
/// pipeline ("successive hooks see the updated value"), so the event threaded through
/// `run_groups` needs to be rebuilt with each new `updated_input`.
trait WithUpdatedInput {
    fn with_updated_input(self, input: Value) -> Self;
}

impl WithUpdatedInput for PreToolUseEvent {
    fn with_updated_input(mut self, input: Value) -> Self {
        self.tool_input = input;
        self
    }
}

impl WithUpdatedInput for PostToolUseEvent {
    fn with_updated_input(mut self, input: Value) -> Self {
        self.tool_input = input;
        self
    }
}

/// Runs every matching group's callbacks in registration order. Only `continue_ = false`
/// or an explicit `Deny` short-circuits the remaining callbacks; every other callback
/// still runs, with `updated_input` threaded forward and `system_message`/
/// `additional_context` concatenated across all of them.
async fn run_groups<E>(groups: &[MatcherGroup<E>], tool_name: &str, event: &E) -> HookDecision
where
    E: Clone + Send + Sync + WithUpdatedInput,
{
    let mut current = event.clone();
    let mut permission_decision = None;
    let mut reason = None;
    let mut updated_input = None;
    let mut system_messages = Vec::new();
    let mut additional_contexts = Vec::new();

    for group in groups {
        if let Some(matcher) = &group.matcher {
            if !matcher.matches(tool_name) {
                continue;
            }
        }
        for callback in &group.callbacks {
            let decision = callback.call(&current).await;
            merge_decision(&decision, &mut permission_decision, &mut reason, &mut system_messages, &mut additional_contexts);

            if let Some(input) = decision.updated_input.clone() {
                current = current.with_updated_input(input.clone());
                updated_input = Some(input);
            }

            if !decision.continue_ || matches!(permission_decision, Some(PermissionDecision::Deny)) {
                return HookDecision {
                    continue_: decision.continue_,
                    permission_decision,
                    reason,
                    updated_input,
                    system_message: join_messages(system_messages),
                    additional_context: join_messages(additional_contexts),
                };
            }
        }
    }

    HookDecision {
        continue_: true,
        permission_decision,
        reason,
        updated_input,
        system_message: join_messages(system_messages),
        additional_context: join_messages(additional_contexts),
    }
}

/// Folds one callback's decision into the pipeline's running state. `permission_decision`
/// and `reason` take the most recent non-`None` value; `Deny` is checked by the caller
/// after merging so it always wins regardless of what runs after it.
fn merge_decision(
    decision: &HookDecision,
    permission_decision: &mut Option<PermissionDecision>,
    reason: &mut Option<String>,
    system_messages: &mut Vec<String>,
    additional_contexts: &mut Vec<String>,
) {
    if let Some(msg) = &decision.system_message {
        system_messages.push(msg.clone());
    }
    if let Some(ctx) = &decision.additional_context {
        additional_contexts.push(ctx.clone());
    }
    if decision.permission_decision.is_some() {
        *permission_decision = decision.permission_decision;
    }
    if decision.reason.is_some() {
        *reason = decision.reason.clone();
    }
}

fn join_messages(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
