//! Context window management: token estimation and history truncation.
//!
//! These are caller-facing conveniences, not part of the turn loop itself (C5) — an
//! application can call [`is_approaching_limit`] between turns and proactively
//! [`truncate_messages`] before the history grows too large for the model's context
//! window. The turn loop never truncates history on its own.

use crate::types::Message;

/// Characters per token used by the estimator. A crude but serviceable approximation
/// (70-85% accurate across model families) that avoids depending on a tokenizer crate
/// the provider adapters don't otherwise need.
const CHARS_PER_TOKEN: usize = 4;

/// Estimate the number of tokens in a message history using a character-based
/// approximation (~1 token per 4 characters).
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let total_chars: usize = messages
        .iter()
        .map(|m| {
            let text_chars = m.text().chars().count();
            let tool_chars: usize = m
                .content
                .iter()
                .map(|b| match b {
                    crate::types::ContentBlock::ToolUse(t) => {
                        t.name.chars().count() + t.input.to_string().chars().count()
                    }
                    crate::types::ContentBlock::ToolResult(t) => t.content.chars().count(),
                    _ => 0,
                })
                .sum();
            text_chars + tool_chars
        })
        .sum();

    total_chars.div_ceil(CHARS_PER_TOKEN)
}

/// Returns true if the estimated token count of `messages` meets or exceeds `limit`.
pub fn is_approaching_limit(messages: &[Message], limit: usize) -> bool {
    estimate_tokens(messages) >= limit
}

/// Truncate message history to the most recent `keep_turns` turns.
///
/// A "turn" here is counted as one assistant message plus any messages immediately
/// preceding it back to (but not including) the previous assistant message — in practice
/// this keeps the most recent `keep_turns` assistant messages and everything after the
/// `keep_turns`-th-from-last assistant message. When `preserve_system` is true, any
/// leading system message is kept regardless of how many turns that costs.
pub fn truncate_messages(messages: &[Message], keep_turns: usize, preserve_system: bool) -> Vec<Message> {
    if keep_turns == 0 {
        return if preserve_system {
            messages
                .iter()
                .take_while(|m| m.role == crate::types::MessageRole::System)
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
    }

    let assistant_indices: Vec<usize> = messages
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == crate::types::MessageRole::Assistant)
        .map(|(i, _)| i)
        .collect();

    let start = if assistant_indices.len() > keep_turns {
        // Start right after the assistant message that is `keep_turns` back from the end.
        assistant_indices[assistant_indices.len() - keep_turns - 1] + 1
    } else {
        0
    };

    let mut kept: Vec<Message> = messages[start..].to_vec();

    if preserve_system && start > 0 {
        if let Some(system_msg) = messages.first() {
            if system_msg.role == crate::types::MessageRole::System
                && !kept.iter().any(|m| m.id == system_msg.id)
            {
                kept.insert(0, system_msg.clone());
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBlock, MessageRole, TextBlock};

    fn text_msg(role: MessageRole, text: &str) -> Message {
        Message::new(role, vec![ContentBlock::Text(TextBlock::new(text))])
    }

    #[test]
    fn estimate_tokens_counts_characters() {
        let messages = vec![text_msg(MessageRole::User, "abcd")];
        assert_eq!(estimate_tokens(&messages), 1);
    }

    #[test]
    fn is_approaching_limit_true_at_or_above_limit() {
        let messages = vec![text_msg(MessageRole::User, &"x".repeat(40))];
        assert!(is_approaching_limit(&messages, 10));
        assert!(!is_approaching_limit(&messages, 11));
    }

    #[test]
    fn truncate_keeps_most_recent_turns() {
        let messages = vec![
            text_msg(MessageRole::System, "sys"),
            text_msg(MessageRole::User, "u1"),
            text_msg(MessageRole::Assistant, "a1"),
            text_msg(MessageRole::User, "u2"),
            text_msg(MessageRole::Assistant, "a2"),
            text_msg(MessageRole::User, "u3"),
            text_msg(MessageRole::Assistant, "a3"),
        ];

        let truncated = truncate_messages(&messages, 1, false);
        assert_eq!(truncated.len(), 2);
        assert_eq!(truncated[0].text(), "u3");
        assert_eq!(truncated[1].text(), "a3");
    }

    #[test]
    fn truncate_preserves_system_message_when_requested() {
        let messages = vec![
            text_msg(MessageRole::System, "sys"),
            text_msg(MessageRole::User, "u1"),
            text_msg(MessageRole::Assistant, "a1"),
            text_msg(MessageRole::User, "u2"),
            text_msg(MessageRole::Assistant, "a2"),
        ];

        let truncated = truncate_messages(&messages, 1, true);
        assert_eq!(truncated[0].text(), "sys");
        assert_eq!(truncated.last().unwrap().text(), "a2");
    }
}
