//! Tool definition, registration, and name resolution (engine component C2).
//!
//! A [`Tool`] pairs a JSON-Schema-described interface with an async handler. The
//! [`ToolRegistry`] maps model-emitted names back to registered tools, repairing
//! near-misses (case differences) and proxying MCP-namespaced names, and the
//! [`ToolFilter`] applies the session's allow/deny policy once at construction time.

use crate::error::{Error, Result};
use crate::mcp::McpServer;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Context passed to a tool's `execute` method.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub cancellation: crate::cancel::CancellationToken,
}

/// The result of executing a tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub is_error: bool,
}

/// A provider-agnostic description of a registered tool, built from a [`ToolDefinition`]
/// for inclusion in a provider request. Each concrete provider adapter translates this
/// into its own wire shape (Anthropic's flat `{name, description, input_schema}` vs.
/// OpenAI's nested `{type: "function", function: {...}}`).
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolSpec {
    pub fn from_definition(tool: &dyn ToolDefinition) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
        }
    }
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// A tool the model can invoke.
///
/// Implemented either by hand or via [`ToolBuilder`]/[`tool`] for the common case of a
/// plain async closure plus a hand-written JSON schema.
#[async_trait]
pub trait ToolDefinition: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolOutput>;
}

impl fmt::Debug for dyn ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition").field("name", &self.name()).finish()
    }
}

type Handler = Arc<dyn Fn(Value, ToolContext) -> HandlerFuture + Send + Sync>;
type HandlerFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Result<ToolOutput>> + Send>>;

/// A tool built from a name, description, JSON schema, and async closure.
pub struct Tool {
    name: String,
    description: String,
    input_schema: Value,
    handler: Handler,
}

#[async_trait]
impl ToolDefinition for Tool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn execute(&self, input: Value, context: &ToolContext) -> Result<ToolOutput> {
        (self.handler)(input, context.clone()).await
    }
}

/// Builder for constructing a [`Tool`].
pub struct ToolBuilder {
    name: String,
    description: String,
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

/// Start building a tool with the given name and description.
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder {
        name: name.into(),
        description: description.into(),
        properties: serde_json::Map::new(),
        required: Vec::new(),
    }
}

impl ToolBuilder {
    /// Declare a parameter with a raw JSON-Schema fragment (e.g. `json!({"type": "string"})`).
    pub fn param(mut self, name: impl Into<String>, schema: Value, required: bool) -> Self {
        let name = name.into();
        if required {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
        self
    }

    pub fn string_param(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(
            name,
            serde_json::json!({"type": "string", "description": description.into()}),
            required,
        )
    }

    pub fn number_param(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(
            name,
            serde_json::json!({"type": "number", "description": description.into()}),
            required,
        )
    }

    pub fn bool_param(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.param(
            name,
            serde_json::json!({"type": "boolean", "description": description.into()}),
            required,
        )
    }

    /// Finish building, supplying the async handler invoked on each call.
    pub fn handler<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<ToolOutput>> + Send + 'static,
    {
        let input_schema = serde_json::json!({
            "type": "object",
            "properties": Value::Object(self.properties),
            "required": self.required,
        });

        Tool {
            name: self.name,
            description: self.description,
            input_schema,
            handler: Arc::new(move |input, ctx| Box::pin(handler(input, ctx))),
        }
    }
}

// ============================================================================
// REGISTRY & REPAIR
// ============================================================================

/// Outcome of resolving a model-emitted tool name.
pub enum ResolvedTool {
    Found(Arc<dyn ToolDefinition>),
    /// Repaired via case-insensitive lookup or MCP namespace synthesis; `canonical` is the
    /// name actually registered.
    Repaired { canonical: String, tool: Arc<dyn ToolDefinition> },
    NotFound,
}

/// Exact and case-insensitive name → tool maps, with lazy MCP proxying.
#[derive(Default)]
pub struct ToolRegistry {
    exact: HashMap<String, Arc<dyn ToolDefinition>>,
    lowercase_to_canonical: HashMap<String, String>,
    mcp_servers: HashMap<String, Arc<dyn McpServer>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn ToolDefinition>) {
        let name = tool.name().to_string();
        self.lowercase_to_canonical.insert(name.to_lowercase(), name.clone());
        self.exact.insert(name, tool);
    }

    /// Register an MCP server whose tools are exposed as `mcp__{server}__{tool}`.
    pub fn register_mcp_server(&mut self, server_name: impl Into<String>, server: Arc<dyn McpServer>) {
        self.mcp_servers.insert(server_name.into(), server);
    }

    pub fn names(&self) -> Vec<String> {
        self.exact.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolDefinition>> {
        self.exact.get(name).cloned()
    }

    /// All registered tool definitions, for building a provider request's tool list.
    pub fn definitions(&self) -> Vec<Arc<dyn ToolDefinition>> {
        self.exact.values().cloned().collect()
    }

    /// Resolve a model-emitted name using the repair lookup order: exact match,
    /// case-insensitive match, then `mcp__{server}__{tool}` proxy synthesis.
    pub fn resolve(&mut self, name: &str) -> ResolvedTool {
        if let Some(t) = self.exact.get(name) {
            return ResolvedTool::Found(t.clone());
        }

        if let Some(canonical) = self.lowercase_to_canonical.get(&name.to_lowercase()) {
            let canonical = canonical.clone();
            if let Some(t) = self.exact.get(&canonical) {
                log::debug!("repaired tool name '{}' -> '{}' via case-insensitive lookup", name, canonical);
                return ResolvedTool::Repaired {
                    canonical,
                    tool: t.clone(),
                };
            }
        }

        if let Some((server_name, tool_name)) = parse_mcp_name(name) {
            if let Some(server) = self.mcp_servers.get(server_name).cloned() {
                log::debug!("repaired tool name '{}' via mcp proxy for server '{}'", name, server_name);
                let proxy: Arc<dyn ToolDefinition> =
                    Arc::new(McpProxyTool::new(name.to_string(), tool_name.to_string(), server));
                return ResolvedTool::Repaired {
                    canonical: name.to_string(),
                    tool: proxy,
                };
            }
        }

        ResolvedTool::NotFound
    }

    /// Apply an allow/deny filter, replacing the registered tool map with the filtered set.
    pub fn apply_filter(&mut self, filter: &ToolFilter) {
        let keep: Vec<String> = self
            .exact
            .keys()
            .filter(|name| filter.keeps(name))
            .cloned()
            .collect();
        let keep: std::collections::HashSet<String> = keep.into_iter().collect();

        self.exact.retain(|name, _| keep.contains(name));
        self.lowercase_to_canonical
            .retain(|_, canonical| keep.contains(canonical));
    }
}

fn parse_mcp_name(name: &str) -> Option<(&str, &str)> {
    let rest = name.strip_prefix("mcp__")?;
    let (server, tool) = rest.split_once("__")?;
    if server.is_empty() || tool.is_empty() {
        return None;
    }
    Some((server, tool))
}

struct McpProxyTool {
    full_name: String,
    remote_name: String,
    server: Arc<dyn McpServer>,
}

impl McpProxyTool {
    fn new(full_name: String, remote_name: String, server: Arc<dyn McpServer>) -> Self {
        Self {
            full_name,
            remote_name,
            server,
        }
    }
}

#[async_trait]
impl ToolDefinition for McpProxyTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        "MCP-proxied tool"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }

    async fn execute(&self, input: Value, _context: &ToolContext) -> Result<ToolOutput> {
        let output = self.server.call_tool(&self.remote_name, input).await?;
        Ok(output)
    }
}

/// The up-to-10-names-plus-overflow message returned when the model emits an
/// unregistered, unrepairable tool name.
pub fn unknown_tool_message(available: &[String]) -> String {
    const MAX_LISTED: usize = 10;
    let mut names: Vec<&String> = available.iter().collect();
    names.sort();
    let listed: Vec<&str> = names.iter().take(MAX_LISTED).map(|s| s.as_str()).collect();
    let overflow = names.len().saturating_sub(MAX_LISTED);

    if overflow > 0 {
        format!(
            "Unknown tool. Available tools: {} (and {} more)",
            listed.join(", "),
            overflow
        )
    } else if listed.is_empty() {
        "Unknown tool. No tools are available.".to_string()
    } else {
        format!("Unknown tool. Available tools: {}", listed.join(", "))
    }
}

// ============================================================================
// ALLOW / DENY FILTER
// ============================================================================

/// A single glob-like pattern where `*` matches any run of characters and every other
/// character is literal.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        let mut regex_str = String::from("^");
        for part in pattern.split('*') {
            regex_str.push_str(&regex::escape(part));
            regex_str.push_str(".*");
        }
        // Trim the trailing ".*" introduced by the loop's per-segment join, then re-anchor.
        regex_str.truncate(regex_str.len() - 2);
        regex_str.push('$');
        Self(Regex::new(&regex_str).expect("pattern compiles"))
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.is_match(name)
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::new(s)
    }
}

/// Allow/deny policy for which tools are exposed to the model.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub allow: Vec<Pattern>,
    pub deny: Vec<Pattern>,
}

impl ToolFilter {
    pub fn allow_only(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            allow: patterns.into_iter().map(|p| Pattern::new(p.as_ref())).collect(),
            deny: Vec::new(),
        }
    }

    pub fn new(
        allow: impl IntoIterator<Item = impl AsRef<str>>,
        deny: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            allow: allow.into_iter().map(|p| Pattern::new(p.as_ref())).collect(),
            deny: deny.into_iter().map(|p| Pattern::new(p.as_ref())).collect(),
        }
    }

    /// A tool is kept iff no deny pattern matches it, and either the allow list is empty
    /// or some allow pattern matches it.
    pub fn keeps(&self, name: &str) -> bool {
        if self.deny.iter().any(|p| p.matches(name)) {
            return false;
        }
        self.allow.is_empty() || self.allow.iter().any(|p| p.matches(name))
    }
}

/// Validate a tool's input against its JSON-Schema-lite description. Only checks
/// presence of `required` properties and primitive type tags — this is not a full
/// JSON-Schema validator, matching the scope of the engine (full schema semantics belong
/// to a dedicated validation crate, not the session engine).
pub fn validate_input(schema: &Value, input: &Value) -> Result<()> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    let obj = input.as_object();
    for field in required {
        let Some(field_name) = field.as_str() else { continue };
        let present = obj.map(|o| o.contains_key(field_name)).unwrap_or(false);
        if !present {
            return Err(Error::tool(format!("missing required field '{}'", field_name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_tool(name: &str) -> Arc<dyn ToolDefinition> {
        Arc::new(
            tool(name, "echoes input")
                .string_param("text", "text to echo", true)
                .handler(|input, _ctx| async move {
                    Ok(ToolOutput::ok(input["text"].as_str().unwrap_or("").to_string()))
                }),
        )
    }

    #[test]
    fn pattern_star_matches_any_run() {
        let p = Pattern::new("Bash*");
        assert!(p.matches("Bash"));
        assert!(p.matches("BashTool"));
        assert!(!p.matches("xBash"));
    }

    #[test]
    fn filter_keeps_allow_minus_deny() {
        // P8: allow=[A, B*], deny=[Bad] -> kept iff name in {A} U {B*} and name != Bad
        let filter = ToolFilter::new(vec!["A", "B*"], vec!["Bad"]);
        assert!(filter.keeps("A"));
        assert!(filter.keeps("Banana"));
        assert!(!filter.keeps("Bad"));
        assert!(!filter.keeps("C"));
    }

    #[test]
    fn filter_empty_allow_means_allow_all_except_deny() {
        let filter = ToolFilter::new(Vec::<&str>::new(), vec!["Write"]);
        assert!(filter.keeps("Read"));
        assert!(!filter.keeps("Write"));
    }

    #[test]
    fn registry_exact_match_resolves() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("Read"));
        assert!(matches!(registry.resolve("Read"), ResolvedTool::Found(_)));
    }

    #[test]
    fn registry_case_insensitive_repair() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("Read"));
        match registry.resolve("read") {
            ResolvedTool::Repaired { canonical, .. } => assert_eq!(canonical, "Read"),
            _ => panic!("expected repaired resolution"),
        }
    }

    #[test]
    fn registry_unknown_name_not_found() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("Read"));
        assert!(matches!(registry.resolve("Write"), ResolvedTool::NotFound));
    }

    #[test]
    fn unknown_tool_message_caps_at_ten_with_overflow_count() {
        let names: Vec<String> = (0..15).map(|i| format!("tool_{:02}", i)).collect();
        let msg = unknown_tool_message(&names);
        assert!(msg.contains("and 5 more"));
    }

    #[test]
    fn apply_filter_replaces_tool_map() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("Read"));
        registry.register(echo_tool("Write"));
        registry.apply_filter(&ToolFilter::new(Vec::<&str>::new(), vec!["Write"]));
        assert!(registry.get("Read").is_some());
        assert!(registry.get("Write").is_none());
    }

    #[test]
    fn validate_input_flags_missing_required_field() {
        let schema = serde_json::json!({"required": ["text"]});
        assert!(validate_input(&schema, &serde_json::json!({})).is_err());
        assert!(validate_input(&schema, &serde_json::json!({"text": "hi"})).is_ok());
    }
}
