#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use shell_agent_mcp::mcp::{AgentContext, McpAgentCommands, REAPER_INTERVAL};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logging with proper tracing default
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let context = AgentContext::from_env();
    let _reapers = context.spawn_reapers(REAPER_INTERVAL);

    // Setup MCP server
    let mcp_port: u16 = std::env::var("MCP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let mcp_addr = format!("0.0.0.0:{}", mcp_port);
    info!("Starting MCP server on {}", mcp_addr);

    // Every connection shares the same registries
    let shared = context.clone();
    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| {
                McpServer::new().tools(McpAgentCommands::new(shared.clone()))
            }),
        )
        .with(Tracing);

    info!("MCP Server with process and search tools is ready");
    info!("Use start_process to run commands and start_search to search files");

    // Run the MCP server until Ctrl+C
    let result = Server::new(TcpListener::bind(mcp_addr))
        .name("Shell Agent MCP Server")
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown requested");
            },
            None,
        )
        .await;

    context.shutdown().await;
    result?;

    Ok(())
}
