//! System-prompt assembly (engine component C8).
//!
//! Builds the final system-prompt string sent with every provider request from a preset
//! template, prepend/append strings, contextual substitutions, and project-context
//! markdown files discovered under the configured setting-source directories.

use crate::error::Result;
use crate::types::PromptContext;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Built-in prompt templates selectable via [`SystemPromptConfig::preset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    ClaudeCode,
    Default,
    Minimal,
}

impl Preset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "claude_code" => Some(Preset::ClaudeCode),
            "default" => Some(Preset::Default),
            "minimal" => Some(Preset::Minimal),
            _ => None,
        }
    }

    fn template(self) -> &'static str {
        match self {
            Preset::ClaudeCode => {
                "You are an agentic coding assistant operating in {cwd} on {platform}. \
                 You have access to the following tools: {tools}. Use them to inspect and \
                 modify the project; prefer the smallest change that satisfies the request."
            }
            Preset::Default => {
                "You are a helpful assistant. Current time: {timestamp}. Available tools: {tools}."
            }
            Preset::Minimal => "You are a helpful assistant.",
        }
    }
}

fn substitutions(context: &PromptContext) -> HashMap<&'static str, String> {
    let mut map = HashMap::new();
    map.insert("tools", context.tool_names.join(", "));
    map.insert("cwd", context.cwd.clone().unwrap_or_default());
    map.insert("platform", context.platform.clone().unwrap_or_default());
    map.insert(
        "timestamp",
        context.timestamp.map(|t| t.to_rfc3339()).unwrap_or_default(),
    );
    map
}

fn substitute(template: &str, context: &PromptContext) -> String {
    let mut result = template.to_string();
    for (key, value) in substitutions(context) {
        result = result.replace(&format!("{{{}}}", key), &value);
    }
    result
}

/// Structured configuration for building a system prompt (§4.8). All fields optional;
/// empty sections are elided from the final prompt.
#[derive(Debug, Clone, Default)]
pub struct SystemPromptConfig {
    pub preset: Option<Preset>,
    pub prepend: Option<String>,
    pub append: Option<String>,
    pub context: Option<PromptContext>,
    pub setting_sources: Vec<PathBuf>,
    pub custom: Option<String>,
}

/// Either a plain string used verbatim, or a [`SystemPromptConfig`].
pub enum SystemPromptInput {
    Plain(String),
    Config(SystemPromptConfig),
}

impl From<String> for SystemPromptInput {
    fn from(s: String) -> Self {
        SystemPromptInput::Plain(s)
    }
}

impl From<SystemPromptConfig> for SystemPromptInput {
    fn from(c: SystemPromptConfig) -> Self {
        SystemPromptInput::Config(c)
    }
}

/// Build the final system-prompt string. Returns `None` iff every contributing input is
/// empty.
pub async fn build(input: SystemPromptInput) -> Result<Option<String>> {
    match input {
        SystemPromptInput::Plain(s) => Ok(non_empty(s)),
        SystemPromptInput::Config(config) => build_from_config(config).await,
    }
}

async fn build_from_config(config: SystemPromptConfig) -> Result<Option<String>> {
    let base = if let Some(custom) = config.custom {
        custom
    } else if let Some(preset) = config.preset {
        let context = config.context.unwrap_or_default();
        substitute(preset.template(), &context)
    } else {
        String::new()
    };

    let mut sections: Vec<String> = Vec::new();
    if let Some(prepend) = config.prepend.filter(|s| !s.is_empty()) {
        sections.push(prepend);
    }
    if !base.is_empty() {
        sections.push(base);
    }
    if let Some(append) = config.append.filter(|s| !s.is_empty()) {
        sections.push(append);
    }

    let project_context = load_project_context(&config.setting_sources).await?;
    if let Some(project_context) = project_context {
        sections.push(project_context);
    }

    Ok(non_empty(sections.join("\n\n")))
}

/// Load and concatenate `CLAUDE.md`-style project-context files from each setting-source
/// directory, in order, separated by blank lines.
async fn load_project_context(sources: &[PathBuf]) -> Result<Option<String>> {
    let mut chunks = Vec::new();
    for dir in sources {
        if let Some(content) = read_context_file(dir).await? {
            chunks.push(content);
        }
    }
    Ok(non_empty(chunks.join("\n\n")))
}

async fn read_context_file(dir: &Path) -> Result<Option<String>> {
    for name in ["CLAUDE.md", "AGENTS.md"] {
        let path = dir.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => return Ok(non_empty(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(None)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}
