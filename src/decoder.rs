//! Stream decoding: reassembling finalized content blocks from a provider's incremental
//! event stream (engine component C1).
//!
//! Two wire formats are supported end to end: the OpenAI-compatible chunk format (handled
//! by [`crate::utils::ToolCallAggregator`], kept from the original SSE parsing code) and
//! the Anthropic-style six-event protocol implemented here. Both are driven through the
//! same [`StreamDecoder`] trait and emit the same [`DecoderEvent`] vocabulary, so the turn
//! loop (C5) never branches on provider. This is the "single reusable decoder" the design
//! notes call for instead of duplicating the recursion logic per provider.

use crate::types::{ContentBlock, OpenAIChunk, StopReason, TextBlock, ToolUseBlock, Usage};
use crate::utils::ToolCallAggregator;
use crate::Result;
use serde::Deserialize;

// ============================================================================
// ANTHROPIC WIRE EVENTS
// ============================================================================

/// One event in an Anthropic-style streaming response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnthropicStreamEvent {
    MessageStart { message: MessageStartInfo },
    ContentBlockStart { index: u32, content_block: StartBlock },
    ContentBlockDelta { index: u32, delta: BlockDelta },
    ContentBlockStop { index: u32 },
    MessageDelta { delta: MessageDeltaInfo, usage: UsageDelta },
    MessageStop,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageStartInfo {
    #[serde(default)]
    pub usage: UsageDelta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageDelta {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeltaInfo {
    #[serde(default)]
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StartBlock {
    Text { #[serde(default)] text: String },
    ToolUse { id: String, name: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

// ============================================================================
// UNIFIED DECODER VOCABULARY
// ============================================================================

/// One raw wire event, tagged by which provider format it belongs to.
pub enum ProviderEvent {
    Anthropic(AnthropicStreamEvent),
    OpenAI(OpenAIChunk),
}

/// Output of feeding one raw event into a [`StreamDecoder`].
#[derive(Debug, Clone)]
pub enum DecoderEvent {
    /// A text fragment to forward to the caller eagerly, as it streams.
    TextDelta(String),
    /// A fully finalized content block (text or tool_use).
    Block(ContentBlock),
    /// An incremental usage update (input and/or output token counts).
    UsageUpdate(Usage),
    /// The model finished generating for this turn.
    Stop(StopReason),
}

/// Converts a provider's incremental event stream into [`DecoderEvent`]s.
///
/// Implementations maintain exactly one open block at a time. [`StreamDecoder::flush`]
/// performs the "safety flush" required when the upstream stream ends mid-block (a
/// provider bug or a connection cut): whatever is open is finalized using the same rules
/// as a normal `content_block_stop`, rather than being silently dropped.
pub trait StreamDecoder: Send {
    fn feed(&mut self, event: ProviderEvent) -> Result<Vec<DecoderEvent>>;
    fn flush(&mut self) -> Vec<DecoderEvent>;
}

// ============================================================================
// ANTHROPIC DECODER
// ============================================================================

enum OpenBlock {
    Text(String),
    ToolUse { id: String, name: String, partial_json: String },
}

/// Decoder for the Anthropic-style event protocol (§4.1).
#[derive(Default)]
pub struct AnthropicDecoder {
    open: Option<OpenBlock>,
    pending_stop_reason: Option<String>,
}

impl AnthropicDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn finalize_open_block(&mut self) -> Vec<DecoderEvent> {
        match self.open.take() {
            None => vec![],
            Some(OpenBlock::Text(buf)) => {
                if buf.is_empty() {
                    vec![]
                } else {
                    vec![DecoderEvent::Block(ContentBlock::Text(TextBlock::new(buf)))]
                }
            }
            Some(OpenBlock::ToolUse { id, name, partial_json }) => {
                let input = if partial_json.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&partial_json).unwrap_or_else(|e| {
                        log::warn!("failed to parse tool_use input, defaulting to {{}}: {}", e);
                        serde_json::json!({})
                    })
                };
                vec![DecoderEvent::Block(ContentBlock::ToolUse(ToolUseBlock::new(id, name, input)))]
            }
        }
    }
}

impl StreamDecoder for AnthropicDecoder {
    fn feed(&mut self, event: ProviderEvent) -> Result<Vec<DecoderEvent>> {
        let event = match event {
            ProviderEvent::Anthropic(e) => e,
            ProviderEvent::OpenAI(_) => {
                return Err(crate::Error::stream(
                    "AnthropicDecoder received an OpenAI-format event",
                ));
            }
        };

        let mut out = Vec::new();

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                if let Some(input_tokens) = message.usage.input_tokens {
                    out.push(DecoderEvent::UsageUpdate(Usage::new(input_tokens, 0)));
                }
            }
            AnthropicStreamEvent::ContentBlockStart { content_block, .. } => {
                self.open = Some(match content_block {
                    StartBlock::Text { text } => OpenBlock::Text(text),
                    StartBlock::ToolUse { id, name } => OpenBlock::ToolUse {
                        id,
                        name,
                        partial_json: String::new(),
                    },
                });
            }
            AnthropicStreamEvent::ContentBlockDelta { delta, .. } => match delta {
                BlockDelta::TextDelta { text } => {
                    if let Some(OpenBlock::Text(buf)) = self.open.as_mut() {
                        buf.push_str(&text);
                    }
                    out.push(DecoderEvent::TextDelta(text));
                }
                BlockDelta::InputJsonDelta { partial_json } => {
                    if let Some(OpenBlock::ToolUse { partial_json: buf, .. }) = self.open.as_mut() {
                        buf.push_str(&partial_json);
                    }
                }
            },
            AnthropicStreamEvent::ContentBlockStop { .. } => {
                out.extend(self.finalize_open_block());
            }
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.pending_stop_reason = Some(reason);
                }
                if usage.input_tokens.is_some() || usage.output_tokens.is_some() {
                    out.push(DecoderEvent::UsageUpdate(Usage::new(
                        usage.input_tokens.unwrap_or(0),
                        usage.output_tokens.unwrap_or(0),
                    )));
                }
            }
            AnthropicStreamEvent::MessageStop => {
                // Any block still open when message_stop arrives is a protocol anomaly;
                // flush it using the same safety-flush rules as a truncated stream.
                out.extend(self.finalize_open_block());
                if let Some(reason) = self.pending_stop_reason.take() {
                    out.push(DecoderEvent::Stop(StopReason::from_raw(&reason)));
                }
            }
        }

        Ok(out)
    }

    fn flush(&mut self) -> Vec<DecoderEvent> {
        self.finalize_open_block()
    }
}

// ============================================================================
// OPENAI DECODER (ADAPTS THE EXISTING AGGREGATOR TO THE SHARED TRAIT)
// ============================================================================

/// Adapts [`ToolCallAggregator`] to the [`StreamDecoder`] trait.
///
/// The OpenAI wire format signals completion with a per-choice `finish_reason` rather
/// than discrete lifecycle events, so there is no "open block" to flush: the aggregator
/// already treats an ended HTTP stream as effectively decided by whichever `finish_reason`
/// it last saw. `flush` is a no-op for symmetry with the trait contract.
#[derive(Default)]
pub struct OpenAiDecoder {
    aggregator: ToolCallAggregator,
    last_stop_reason: Option<StopReason>,
}

impl OpenAiDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StreamDecoder for OpenAiDecoder {
    fn feed(&mut self, event: ProviderEvent) -> Result<Vec<DecoderEvent>> {
        let chunk = match event {
            ProviderEvent::OpenAI(c) => c,
            ProviderEvent::Anthropic(_) => {
                return Err(crate::Error::stream("OpenAiDecoder received an Anthropic-format event"));
            }
        };

        let mut out = Vec::new();
        for choice in &chunk.choices {
            if let Some(delta) = &choice.delta.content {
                out.push(DecoderEvent::TextDelta(delta.clone()));
            }
            if let Some(reason) = &choice.finish_reason {
                self.last_stop_reason = Some(StopReason::from_raw(reason));
            }
        }

        let blocks = self.aggregator.process_chunk(chunk)?;
        out.extend(blocks.into_iter().map(DecoderEvent::Block));

        if let Some(reason) = self.last_stop_reason.take() {
            out.push(DecoderEvent::Stop(reason));
        }

        Ok(out)
    }

    fn flush(&mut self) -> Vec<DecoderEvent> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_anthropic(decoder: &mut AnthropicDecoder, event: AnthropicStreamEvent) -> Vec<DecoderEvent> {
        decoder.feed(ProviderEvent::Anthropic(event)).unwrap()
    }

    #[test]
    fn text_block_streams_deltas_then_finalizes() {
        let mut decoder = AnthropicDecoder::new();

        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockStart {
                index: 0,
                content_block: StartBlock::Text { text: String::new() },
            },
        );

        let deltas = feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::TextDelta { text: "Hi".to_string() },
            },
        );
        assert!(matches!(&deltas[0], DecoderEvent::TextDelta(t) if t == "Hi"));

        let finalized = feed_anthropic(&mut decoder, AnthropicStreamEvent::ContentBlockStop { index: 0 });
        match &finalized[0] {
            DecoderEvent::Block(ContentBlock::Text(t)) => assert_eq!(t.text, "Hi"),
            _ => panic!("expected finalized text block"),
        }
    }

    #[test]
    fn tool_use_block_accumulates_partial_json() {
        let mut decoder = AnthropicDecoder::new();

        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockStart {
                index: 0,
                content_block: StartBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "add".to_string(),
                },
            },
        );
        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJsonDelta {
                    partial_json: "{\"a\":2,".to_string(),
                },
            },
        );
        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJsonDelta {
                    partial_json: "\"b\":3}".to_string(),
                },
            },
        );
        let finalized = feed_anthropic(&mut decoder, AnthropicStreamEvent::ContentBlockStop { index: 0 });
        match &finalized[0] {
            DecoderEvent::Block(ContentBlock::ToolUse(t)) => {
                assert_eq!(t.id, "t1");
                assert_eq!(t.name, "add");
                assert_eq!(t.input["a"], 2);
                assert_eq!(t.input["b"], 3);
            }
            _ => panic!("expected finalized tool_use block"),
        }
    }

    #[test]
    fn malformed_tool_json_defaults_to_empty_object() {
        let mut decoder = AnthropicDecoder::new();
        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockStart {
                index: 0,
                content_block: StartBlock::ToolUse {
                    id: "t1".to_string(),
                    name: "broken".to_string(),
                },
            },
        );
        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::InputJsonDelta {
                    partial_json: "{not valid json".to_string(),
                },
            },
        );
        let finalized = feed_anthropic(&mut decoder, AnthropicStreamEvent::ContentBlockStop { index: 0 });
        match &finalized[0] {
            DecoderEvent::Block(ContentBlock::ToolUse(t)) => assert_eq!(t.input, serde_json::json!({})),
            _ => panic!("expected finalized tool_use block"),
        }
    }

    #[test]
    fn safety_flush_finalizes_open_text_block_without_stop_event() {
        let mut decoder = AnthropicDecoder::new();
        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockStart {
                index: 0,
                content_block: StartBlock::Text { text: String::new() },
            },
        );
        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::TextDelta {
                    text: "partial".to_string(),
                },
            },
        );
        // Stream ends here with no content_block_stop / message_stop.
        let flushed = decoder.flush();
        match &flushed[0] {
            DecoderEvent::Block(ContentBlock::Text(t)) => assert_eq!(t.text, "partial"),
            _ => panic!("expected flushed text block"),
        }
    }

    #[test]
    fn message_delta_then_stop_emits_stop_event() {
        let mut decoder = AnthropicDecoder::new();
        feed_anthropic(
            &mut decoder,
            AnthropicStreamEvent::MessageDelta {
                delta: MessageDeltaInfo {
                    stop_reason: Some("end_turn".to_string()),
                },
                usage: UsageDelta {
                    input_tokens: None,
                    output_tokens: Some(3),
                },
            },
        );
        let out = feed_anthropic(&mut decoder, AnthropicStreamEvent::MessageStop);
        assert!(out.iter().any(|e| matches!(e, DecoderEvent::Stop(StopReason::EndTurn))));
    }
}
