//! LLM provider adapter interface.
//!
//! The engine calls a provider only through this trait — how the bytes get from a socket
//! to a [`DecoderEvent`](crate::decoder::DecoderEvent) is entirely the adapter's business.
//! Two concrete adapters ship: an Anthropic-style one built on `eventsource-stream`
//! feeding [`crate::decoder::AnthropicDecoder`], and an OpenAI-compatible one built on the
//! existing chunked SSE parsing in [`crate::utils`] feeding [`crate::decoder::OpenAiDecoder`].

use crate::cancel::CombinedToken;
use crate::decoder::DecoderEvent;
use crate::error::{Error, Result};
use crate::tools::ToolSpec;
use crate::types::Message;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Model and request-shaping knobs passed to a provider on every call.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
            temperature: None,
            base_url: String::new(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything a provider needs to produce the next assistant turn.
pub struct ProviderRequest<'a> {
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
    pub system_prompt: Option<&'a str>,
    pub config: &'a ProviderConfig,
}

fn anthropic_tools_json(tools: &[ToolSpec]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.input_schema,
            })
        })
        .collect()
}

fn openai_tools_json(tools: &[ToolSpec]) -> Vec<serde_json::Value> {
    tools
        .iter()
        .map(|t| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.input_schema,
                },
            })
        })
        .collect()
}

/// Pluggable LLM backend. `stream` drives the turn loop's consumption of C1's decoder
/// events; cancellation is observed between events, not mid-HTTP-read.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn stream<'a>(
        &'a self,
        request: ProviderRequest<'a>,
        cancellation: CombinedToken,
    ) -> Result<BoxStream<'a, Result<DecoderEvent>>>;
}

/// Anthropic-style Messages API adapter, feeding [`crate::decoder::AnthropicDecoder`].
pub struct AnthropicProvider {
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn stream<'a>(
        &'a self,
        request: ProviderRequest<'a>,
        cancellation: CombinedToken,
    ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
        let body = serde_json::json!({
            "model": request.config.model,
            "max_tokens": request.config.max_tokens,
            "temperature": request.config.temperature,
            "system": request.system_prompt,
            "messages": request.messages,
            "tools": anthropic_tools_json(request.tools),
            "stream": true,
        });

        let mut req = self
            .client
            .post(format!("{}/v1/messages", request.config.base_url))
            .timeout(request.config.request_timeout)
            .header("anthropic-version", "2023-06-01")
            .json(&body);
        if let Some(key) = &request.config.api_key {
            req = req.header("x-api-key", key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(format!("{}: {}", status, text)));
        }

        use crate::decoder::{AnthropicDecoder, AnthropicStreamEvent, ProviderEvent, StreamDecoder};
        use eventsource_stream::Eventsource;

        let byte_stream = response.bytes_stream().map(|r| r.map_err(Error::from));
        let sse = byte_stream.eventsource();

        // Shared with the terminal flush below: `scan`'s state is owned by the closure,
        // so the decoder has to live behind the `Arc` to be reachable once the SSE
        // stream itself has ended.
        let decoder = Arc::new(Mutex::new(AnthropicDecoder::new()));
        let decoder_for_feed = decoder.clone();

        let batches = sse.scan((), move |_, event| {
            let cancellation = cancellation.clone();
            let decoder = decoder_for_feed.clone();
            async move {
                if cancellation.is_cancelled() {
                    return None;
                }
                let batch: Result<Vec<DecoderEvent>> = (|| {
                    let event = event.map_err(|e| Error::stream(e.to_string()))?;
                    if event.data.is_empty() {
                        return Ok(Vec::new());
                    }
                    let parsed: AnthropicStreamEvent = serde_json::from_str(&event.data)?;
                    decoder.lock().unwrap().feed(ProviderEvent::Anthropic(parsed))
                })();
                Some(batch)
            }
        });

        let flattened = batches.flat_map(|result: Result<Vec<DecoderEvent>>| {
            futures::stream::iter(match result {
                Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            })
        });

        // Safety flush: finalize any block left open if the byte stream ended without a
        // `content_block_stop`/`message_stop` pair.
        let flush = futures::stream::once(async move {
            futures::stream::iter(decoder.lock().unwrap().flush().into_iter().map(Ok))
        })
        .flatten();

        Ok(Box::pin(flattened.chain(flush)))
    }
}

/// OpenAI-compatible chat-completions adapter, feeding [`crate::decoder::OpenAiDecoder`].
pub struct OpenAiProvider {
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OpenAiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream<'a>(
        &'a self,
        request: ProviderRequest<'a>,
        cancellation: CombinedToken,
    ) -> Result<BoxStream<'a, Result<DecoderEvent>>> {
        let openai_messages = crate::types::to_openai_messages(request.messages);
        let body = serde_json::json!({
            "model": request.config.model,
            "max_tokens": request.config.max_tokens,
            "temperature": request.config.temperature,
            "messages": openai_messages,
            "tools": openai_tools_json(request.tools),
            "stream": true,
        });

        let mut req = self
            .client
            .post(format!("{}/chat/completions", request.config.base_url))
            .timeout(request.config.request_timeout)
            .json(&body);
        if let Some(key) = &request.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::api(format!("{}: {}", status, text)));
        }

        use crate::decoder::{OpenAiDecoder, ProviderEvent, StreamDecoder};
        use crate::utils::parse_sse_stream;

        let chunks = parse_sse_stream(response);

        let decoder = Arc::new(Mutex::new(OpenAiDecoder::new()));
        let decoder_for_feed = decoder.clone();

        let batches = chunks.scan((), move |_, chunk| {
            let cancellation = cancellation.clone();
            let decoder = decoder_for_feed.clone();
            async move {
                if cancellation.is_cancelled() {
                    return None;
                }
                let batch: Result<Vec<DecoderEvent>> = (|| {
                    decoder.lock().unwrap().feed(ProviderEvent::OpenAI(chunk?))
                })();
                Some(batch)
            }
        });

        let flattened = batches.flat_map(|result: Result<Vec<DecoderEvent>>| {
            futures::stream::iter(match result {
                Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            })
        });

        let flush = futures::stream::once(async move {
            futures::stream::iter(decoder.lock().unwrap().flush().into_iter().map(Ok))
        })
        .flatten();

        Ok(Box::pin(flattened.chain(flush)))
    }
}
