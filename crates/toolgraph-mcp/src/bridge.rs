use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use rmcp::model::Tool as McpTool;

use toolgraph_core::error::Result;
use toolgraph_core::traits::Tool;
use toolgraph_core::types::ToolResult;
use toolgraph_tools::ToolRegistry;

use crate::McpClientManager;

/// A tool operation served by a remote MCP server.
///
/// Registered under the server's own operation name so graph nodes can call
/// it without knowing which backend serves it.
pub struct McpBridgedTool {
    server_name: String,
    tool_name: String,
    description: String,
    schema: serde_json::Value,
    manager: Arc<McpClientManager>,
    timeout: u64,
}

impl Tool for McpBridgedTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let arguments = input.as_object().cloned();

            debug!(server = %self.server_name, tool = %self.tool_name, "Calling MCP tool");

            match self
                .manager
                .call_tool(&self.server_name, &self.tool_name, arguments)
                .await
            {
                Ok((content, false)) => Ok(ToolResult::success(content)),
                Ok((content, true)) => Ok(ToolResult::error(content)),
                Err(e) => Ok(ToolResult::error(e.to_string())),
            }
        })
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout
    }
}

/// Register all tools from an MCP server. Names already present (built-ins or
/// an earlier server) are kept. Returns how many tools were added.
pub fn register_mcp_tools(
    registry: &mut ToolRegistry,
    manager: &Arc<McpClientManager>,
    server_name: &str,
    tools: &[McpTool],
    timeout_secs: u64,
) -> usize {
    let mut added = 0;

    for tool in tools {
        let description = tool
            .description
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_else(|| format!("MCP tool: {}", tool.name));

        let schema = serde_json::to_value(&*tool.input_schema)
            .unwrap_or(serde_json::json!({"type": "object"}));

        let bridged = McpBridgedTool {
            server_name: server_name.to_string(),
            tool_name: tool.name.to_string(),
            description,
            schema,
            manager: manager.clone(),
            timeout: timeout_secs,
        };

        if registry.register_if_absent(bridged) {
            debug!(server = %server_name, name = %tool.name, "Registered MCP bridged tool");
            added += 1;
        } else {
            warn!(server = %server_name, name = %tool.name, "Operation already registered, skipping");
        }
    }

    added
}
