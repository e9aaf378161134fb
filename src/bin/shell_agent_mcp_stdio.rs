#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use poem_mcpserver::McpServer;
use shell_agent_mcp::mcp::{AgentContext, McpAgentCommands, REAPER_INTERVAL};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let context = AgentContext::from_env();
    let _reapers = context.spawn_reapers(REAPER_INTERVAL);

    let result =
        poem_mcpserver::stdio::stdio(McpServer::new().tools(McpAgentCommands::new(context.clone())))
            .await;

    context.shutdown().await;
    result?;
    Ok(())
}
