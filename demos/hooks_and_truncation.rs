//! Demonstrates gating a tool with a PreToolUse hook and bounding its output with the
//! truncation guard.
//!
//! Run with:
//!   ANTHROPIC_API_KEY=... cargo run --example hooks_and_truncation

use futures::StreamExt;
use open_agent::{
    tool, AgentOptions, AnthropicProvider, Client, HookDecision, Hooks, Keep, ReceiveOptions,
    SessionEvent, ToolOutput, TruncationConfig,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dump_tool = tool("dump_log", "Return a very large chunk of log output")
        .handler(|_input, _ctx| async move {
            let body = (0..5000)
                .map(|i| format!("line {i}: steady state"))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(ToolOutput::ok(body))
        });

    let mut hooks = Hooks::new();
    hooks.on_pre_tool_use(Some("dump_log"), |event| {
        let tool_name = event.tool_name.clone();
        async move {
            eprintln!("[hook] about to run {tool_name}");
            HookDecision::continue_default()
        }
    });
    hooks.on_post_tool_use(None, |event| {
        let is_error = event.is_error;
        async move {
            eprintln!("[hook] tool finished, is_error={is_error}");
            HookDecision::continue_default()
        }
    });

    let truncation = TruncationConfig {
        max_lines: 200,
        max_bytes: 16 * 1024,
        keep: Keep::Head,
    };

    let options = AgentOptions::builder()
        .system_prompt("You have a dump_log tool. Use it if asked to inspect logs.")
        .model("claude-sonnet-4-5")
        .base_url("https://api.anthropic.com")
        .api_key(std::env::var("ANTHROPIC_API_KEY").unwrap_or_default())
        .provider(Arc::new(AnthropicProvider::new()))
        .tool(dump_tool)
        .hooks(hooks)
        .truncation(truncation)
        .build()?;

    let mut client = Client::new(options);
    client.send("Dump the log and summarize it.").await?;

    let mut stream = Box::pin(client.receive(ReceiveOptions::default()).await?);
    while let Some(event) = stream.next().await {
        match event {
            SessionEvent::Text(text) => print!("{text}"),
            SessionEvent::ToolResult(result) => {
                eprintln!("[tool output bytes: {}]", result.content.len());
            }
            SessionEvent::Stop { .. } => {
                println!();
                break;
            }
            SessionEvent::Error(message) => {
                eprintln!("[error: {message}]");
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
