//! Multi-turn conversation with a registered tool, driven through `Client::receive`.
//!
//! Run with:
//!   ANTHROPIC_API_KEY=... cargo run --example tool_session

use futures::StreamExt;
use open_agent::{tool, AgentOptions, AnthropicProvider, Client, ReceiveOptions, SessionEvent, ToolOutput};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let weather_tool = tool("get_weather", "Look up the current weather for a city")
        .string_param("city", "City name", true)
        .handler(|input, _ctx| async move {
            let city = input
                .get("city")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            Ok(ToolOutput::ok(format!("{city}: 18C, overcast")))
        });

    let options = AgentOptions::builder()
        .system_prompt("You are a weather assistant. Use the get_weather tool when asked.")
        .model("claude-sonnet-4-5")
        .base_url("https://api.anthropic.com")
        .api_key(std::env::var("ANTHROPIC_API_KEY").unwrap_or_default())
        .provider(Arc::new(AnthropicProvider::new()))
        .tool(weather_tool)
        .build()?;

    let mut client = Client::new(options);
    client.send("What's the weather in Lisbon?").await?;

    let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await?);
    while let Some(event) = stream.next().await {
        match event {
            SessionEvent::Text(text) => print!("{text}"),
            SessionEvent::ToolUse(tool_use) => {
                eprintln!("[calling {}: {}]", tool_use.name, tool_use.input);
            }
            SessionEvent::ToolResult(result) => {
                eprintln!("[tool result: {}]", result.content);
            }
            SessionEvent::Stop { reason, usage } => {
                println!();
                eprintln!("[stopped: {reason:?}, usage: {}/{}]", usage.input, usage.output);
            }
            SessionEvent::Error(message) => {
                eprintln!("[error: {message}]");
            }
            SessionEvent::SystemMessage(message) => {
                eprintln!("[system: {message}]");
            }
            SessionEvent::Message(_) => {}
        }
    }

    Ok(())
}
