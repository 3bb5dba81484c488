mod bridge;
mod client;
mod handler;

pub use bridge::{register_mcp_tools, McpBridgedTool};
pub use client::McpClientManager;
pub use handler::ToolgraphClientHandler;

use std::sync::Arc;

use tracing::{info, warn};

use toolgraph_core::config::{McpConfig, McpServerConfig};
use toolgraph_core::error::ToolgraphError;
use toolgraph_tools::ToolRegistry;

/// Connect to an MCP server and register its tools into the registry.
/// Returns the number of tools registered.
pub async fn connect_and_register(
    manager: &Arc<McpClientManager>,
    server_name: &str,
    config: &McpServerConfig,
    registry: &mut ToolRegistry,
) -> Result<usize, ToolgraphError> {
    manager.connect(server_name, config).await?;

    let tools = manager.list_tools(server_name).await?;
    Ok(bridge::register_mcp_tools(
        registry,
        manager,
        server_name,
        &tools,
        config.timeout_secs,
    ))
}

/// Connect every auto-connect server in `config`. A server that fails to
/// connect is logged and skipped; its operations stay unregistered.
pub async fn connect_all(
    manager: &Arc<McpClientManager>,
    config: &McpConfig,
    registry: &mut ToolRegistry,
) -> usize {
    let mut names: Vec<&String> = config.servers.keys().collect();
    names.sort();

    let mut total = 0;
    for name in names {
        let server = &config.servers[name];
        if !server.auto_connect {
            continue;
        }
        match connect_and_register(manager, name, server, registry).await {
            Ok(count) => {
                info!(server = %name, tools = count, "Registered MCP tools");
                total += count;
            }
            Err(e) => warn!(server = %name, error = %e, "MCP server unavailable"),
        }
    }
    total
}
