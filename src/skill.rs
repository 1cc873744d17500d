//! Skill discovery interface and the synthesized `Skill` tool.
//!
//! Only the collaborator interface is in scope here (§6 of the engine spec explicitly
//! leaves directory walking and activation heuristics to the caller's loader
//! implementation) — but the frontmatter *value* grammar is small, self-contained, and
//! needed by any real [`SkillLoader`] to parse a skill file's metadata block, so it is
//! implemented here rather than left as another unimplemented interface.
//!
//! ## Frontmatter format
//!
//! A skill file is Markdown with an optional YAML-subset frontmatter block delimited by
//! `---` lines:
//!
//! ```text
//! ---
//! name: code-review
//! version: 2
//! enabled: true
//! tags: [rust, review]
//! aliases:
//!   - cr
//!   - review
//! ---
//! # Code Review Skill
//! ...
//! ```
//!
//! Supported value types: quoted/unquoted string, number, boolean, `null`/`~`, inline
//! array (`[a, b]`), and block array (hyphen-prefixed lines following a bare key). Nested
//! objects are not supported.

use crate::error::Result;
use crate::tools::{tool, Tool, ToolOutput};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A discovered skill: a name, description, and arbitrary frontmatter metadata.
#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub path: String,
    pub metadata: HashMap<String, FrontmatterValue>,
}

/// The outcome of checking whether a skill should activate for an incoming message.
#[derive(Debug, Clone)]
pub struct ActivationResult {
    pub should_activate: bool,
    pub skills: Vec<Skill>,
    pub system_prompt_addition: Option<String>,
}

/// Options controlling skill discovery.
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub directories: Vec<String>,
    pub include_user: bool,
    pub include_project: bool,
    pub max_depth: Option<u32>,
}

/// A collaborator that discovers, searches, and activates skills. The engine only calls
/// through this trait; walking the filesystem and matching activation heuristics belong
/// to the implementation supplied by the caller.
#[async_trait]
pub trait SkillLoader: Send + Sync {
    async fn discover(&self, options: DiscoverOptions) -> Result<Vec<Skill>>;
    async fn search(&self, query: &str) -> Result<Vec<Skill>>;
    async fn check_activation(&self, message: &str) -> Result<ActivationResult>;
}

/// Build the synthesized `Skill` tool that delegates `list`/`invoke` actions to a loader.
pub fn skill_tool(loader: Arc<dyn SkillLoader>) -> Tool {
    tool("Skill", "List or search available skills, or check which skills activate for a message")
        .string_param("action", "one of: list, search, check_activation", true)
        .string_param("query", "search text or message, required for search/check_activation", false)
        .handler(move |input, _ctx| {
            let loader = loader.clone();
            async move {
                let action = input["action"].as_str().unwrap_or("");
                match action {
                    "list" => {
                        let skills = loader.discover(DiscoverOptions::default()).await?;
                        Ok(ToolOutput::ok(format_skills(&skills)))
                    }
                    "search" => {
                        let query = input["query"].as_str().unwrap_or("");
                        let skills = loader.search(query).await?;
                        Ok(ToolOutput::ok(format_skills(&skills)))
                    }
                    "check_activation" => {
                        let message = input["query"].as_str().unwrap_or("");
                        let result = loader.check_activation(message).await?;
                        Ok(ToolOutput::ok(format!(
                            "should_activate={} skills=[{}]",
                            result.should_activate,
                            result.skills.iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ")
                        )))
                    }
                    other => Ok(ToolOutput::error(format!("unknown Skill action '{}'", other))),
                }
            }
        })
}

fn format_skills(skills: &[Skill]) -> String {
    if skills.is_empty() {
        return "No skills available.".to_string();
    }
    skills
        .iter()
        .map(|s| format!("{}: {}", s.name, s.description))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// FRONTMATTER VALUE PARSER
// ============================================================================

/// A parsed frontmatter scalar or array value.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontmatterValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Array(Vec<FrontmatterValue>),
}

/// Parse a `---`-delimited frontmatter block at the start of `content`, returning the
/// parsed key/value map and the remaining body. Returns an empty map and the whole
/// input as body if no frontmatter block is present.
pub fn parse_frontmatter(content: &str) -> (HashMap<String, FrontmatterValue>, &str) {
    let mut lines = content.lines();
    let Some(first) = lines.next() else {
        return (HashMap::new(), content);
    };
    if first.trim() != "---" {
        return (HashMap::new(), content);
    }

    let mut fm_lines = Vec::new();
    let mut consumed = first.len() + 1;
    let mut closed = false;
    for line in lines {
        consumed += line.len() + 1;
        if line.trim() == "---" {
            closed = true;
            break;
        }
        fm_lines.push(line);
    }

    if !closed {
        return (HashMap::new(), content);
    }

    let map = parse_frontmatter_lines(&fm_lines);
    let body_start = consumed.min(content.len());
    (map, &content[body_start..])
}

fn parse_frontmatter_lines(lines: &[&str]) -> HashMap<String, FrontmatterValue> {
    let mut map = HashMap::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        let Some((key, rest)) = trimmed.split_once(':') else {
            i += 1;
            continue;
        };
        let key = key.trim().to_string();
        let rest = rest.trim();

        if rest.is_empty() {
            // Possibly a block array on following hyphen-prefixed lines.
            let mut items = Vec::new();
            let mut j = i + 1;
            while j < lines.len() {
                let next_trimmed = lines[j].trim();
                if let Some(item) = next_trimmed.strip_prefix("- ").or_else(|| next_trimmed.strip_prefix('-')) {
                    items.push(parse_scalar(item.trim()));
                    j += 1;
                } else {
                    break;
                }
            }
            if !items.is_empty() {
                map.insert(key, FrontmatterValue::Array(items));
                i = j;
                continue;
            }
            map.insert(key, FrontmatterValue::Null);
            i += 1;
            continue;
        }

        if rest.starts_with('[') && rest.ends_with(']') {
            let inner = &rest[1..rest.len() - 1];
            let items = if inner.trim().is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(|s| parse_scalar(s.trim())).collect()
            };
            map.insert(key, FrontmatterValue::Array(items));
        } else {
            map.insert(key, parse_scalar(rest));
        }
        i += 1;
    }
    map
}

fn parse_scalar(raw: &str) -> FrontmatterValue {
    let raw = raw.trim();
    if raw.is_empty() || raw == "null" || raw == "~" {
        return FrontmatterValue::Null;
    }
    if raw == "true" {
        return FrontmatterValue::Bool(true);
    }
    if raw == "false" {
        return FrontmatterValue::Bool(false);
    }
    if (raw.starts_with('"') && raw.ends_with('"') && raw.len() >= 2)
        || (raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2)
    {
        return FrontmatterValue::String(raw[1..raw.len() - 1].to_string());
    }
    if let Ok(n) = raw.parse::<f64>() {
        return FrontmatterValue::Number(n);
    }
    FrontmatterValue::String(raw.to_string())
}
