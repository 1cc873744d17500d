//! Single-turn query against an Anthropic-style endpoint.
//!
//! Run with:
//!   ANTHROPIC_API_KEY=... cargo run --example simple_query

use open_agent::{query, AgentOptions, AnthropicProvider, ContentBlock};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = AgentOptions::builder()
        .system_prompt("You are a terse, helpful assistant.")
        .model("claude-sonnet-4-5")
        .base_url("https://api.anthropic.com")
        .api_key(std::env::var("ANTHROPIC_API_KEY").unwrap_or_default())
        .provider(Arc::new(AnthropicProvider::new()))
        .build()?;

    let blocks = query("What's the tallest mountain in the world?", options).await?;
    for block in blocks {
        if let ContentBlock::Text(text) = block {
            println!("{}", text.text);
        }
    }

    Ok(())
}
