use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use rmcp::model::{CallToolRequestParams, RawContent, Tool as McpTool};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::streamable_http_client::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};

use toolgraph_core::config::{McpServerConfig, McpTransport};
use toolgraph_core::error::ToolgraphError;

use crate::handler::ToolgraphClientHandler;

type McpConnection = RunningService<RoleClient, ToolgraphClientHandler>;

/// Manages connections to the configured MCP tool servers.
#[derive(Default)]
pub struct McpClientManager {
    connections: Mutex<HashMap<String, McpConnection>>,
    server_configs: Mutex<HashMap<String, McpServerConfig>>,
}

impl McpClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect to an MCP server.
    pub async fn connect(&self, name: &str, config: &McpServerConfig) -> Result<(), ToolgraphError> {
        let handler = ToolgraphClientHandler::new(name);

        let client = match &config.transport {
            McpTransport::Stdio { command, args, env } => {
                let mut cmd = tokio::process::Command::new(command);
                cmd.args(args);
                for (k, v) in env {
                    cmd.env(k, v);
                }

                let transport = rmcp::transport::TokioChildProcess::new(cmd).map_err(|e| {
                    ToolgraphError::Mcp(format!("Failed to spawn {}: {}", command, e))
                })?;

                handler.serve(transport).await.map_err(|e| {
                    ToolgraphError::Mcp(format!(
                        "Failed to initialize MCP client for {}: {}",
                        name, e
                    ))
                })?
            }
            McpTransport::Sse { url } => {
                let transport = StreamableHttpClientTransport::from_uri(url.as_str());

                <ToolgraphClientHandler as ServiceExt<RoleClient>>::serve(handler, transport)
                    .await
                    .map_err(|e| ToolgraphError::Mcp(format!("MCP init for '{}' failed: {}", name, e)))?
            }
        };

        info!(server = %name, "MCP server connected");

        self.attach(name, client).await;
        self.server_configs
            .lock()
            .await
            .insert(name.to_string(), config.clone());
        Ok(())
    }

    async fn attach(&self, name: &str, client: McpConnection) {
        self.connections
            .lock()
            .await
            .insert(name.to_string(), client);
    }

    /// Attempt to reconnect to a server using its stored config.
    pub async fn reconnect(&self, server_name: &str) -> Result<(), ToolgraphError> {
        let config = self
            .server_configs
            .lock()
            .await
            .get(server_name)
            .cloned()
            .ok_or_else(|| {
                ToolgraphError::Mcp(format!("No stored config for server '{}'", server_name))
            })?;

        if let Some(mut old) = self.connections.lock().await.remove(server_name) {
            let _ = old.close().await;
        }

        self.connect(server_name, &config).await
    }

    /// List tools from a connected server.
    pub async fn list_tools(&self, server_name: &str) -> Result<Vec<McpTool>, ToolgraphError> {
        let peer = self.peer(server_name).await?;

        let tools = peer.list_all_tools().await.map_err(|e| {
            ToolgraphError::Mcp(format!("Failed to list tools from '{}': {}", server_name, e))
        })?;

        debug!(server = %server_name, count = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    /// Call a tool on a connected server, reconnecting once if the transport closed.
    ///
    /// Returns the text content and whether the server flagged it as an error.
    pub async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<(String, bool), ToolgraphError> {
        let result = self
            .call_tool_inner(server_name, tool_name, arguments.clone())
            .await;

        if let Err(ref e) = result {
            let err_str = e.to_string();
            if err_str.contains("closed") || err_str.contains("Transport") {
                warn!(server = %server_name, "MCP transport closed, attempting reconnect");
                if self.reconnect(server_name).await.is_ok() {
                    return self.call_tool_inner(server_name, tool_name, arguments).await;
                }
            }
        }

        result
    }

    async fn call_tool_inner(
        &self,
        server_name: &str,
        tool_name: &str,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<(String, bool), ToolgraphError> {
        // Calls to one server run concurrently; the map is only locked for the lookup.
        let peer = self.peer(server_name).await?;

        let params = CallToolRequestParams {
            name: tool_name.to_string().into(),
            arguments,
            meta: None,
            task: None,
        };

        let result = peer.call_tool(params).await.map_err(|e| {
            ToolgraphError::Mcp(format!(
                "Tool call '{}.{}' failed: {}",
                server_name, tool_name, e
            ))
        })?;

        let text = result
            .content
            .iter()
            .map(|c| match c.raw {
                RawContent::Text(ref t) => t.text.to_string(),
                _ => format!("{:?}", c.raw),
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok((text, result.is_error.unwrap_or(false)))
    }

    async fn peer(&self, server_name: &str) -> Result<Peer<RoleClient>, ToolgraphError> {
        let conns = self.connections.lock().await;
        conns
            .get(server_name)
            .map(|client| client.peer().clone())
            .ok_or_else(|| ToolgraphError::Mcp(format!("Server '{}' not connected", server_name)))
    }

    /// Disconnect from all servers.
    pub async fn disconnect_all(&self) {
        let mut conns = self.connections.lock().await;
        for (name, mut client) in conns.drain() {
            let _ = client.close().await;
            info!(server = %name, "MCP server disconnected");
        }
    }
}
