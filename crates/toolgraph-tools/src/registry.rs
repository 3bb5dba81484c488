use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::traits::{Tool, ToolArguments, ToolInvoker};
use toolgraph_core::types::{ToolDefinition, ToolResult};

/// Registry of available tool operations.
///
/// Populated once at start-up, then shared read-only behind an `Arc`.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Register a tool unless the name is taken. Returns whether it was added.
    pub fn register_if_absent(&mut self, tool: impl Tool) -> bool {
        if self.tools.contains_key(tool.name()) {
            return false;
        }
        self.register(tool);
        true
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name, bounded by the tool's own timeout.
    pub async fn execute(&self, name: &str, input: serde_json::Value) -> Result<ToolResult> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolgraphError::ToolNotFound(name.to_string()))?;

        let timeout = std::time::Duration::from_secs(tool.timeout_secs());
        debug!(tool = %name, "Executing tool");

        match tokio::time::timeout(timeout, tool.execute(input)).await {
            Ok(result) => result,
            Err(_) => Err(ToolgraphError::ToolTimeout {
                tool: name.to_string(),
                timeout_secs: tool.timeout_secs(),
            }),
        }
    }

    /// Create a registry with the in-process string and date tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::builtin::strings::ReverseStringTool);
        registry.register(crate::builtin::datetime::CurrentDatetimeTool);
        registry.register(crate::builtin::datetime::DaysUntilTool);
        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolInvoker for ToolRegistry {
    fn invoke<'a>(
        &'a self,
        operation: &'a str,
        arguments: ToolArguments,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        Box::pin(self.execute(operation, serde_json::Value::Object(arguments)))
    }

    fn operations(&self) -> Vec<String> {
        self.list().into_iter().map(String::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowTool;

    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        fn timeout_secs(&self) -> u64 {
            1
        }
        fn execute(&self, _input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
            Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                Ok(ToolResult::success("late"))
            })
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(
            registry.list(),
            vec!["current_datetime", "days_until", "reverse_string"]
        );
    }

    #[test]
    fn test_register_if_absent_keeps_existing() {
        let mut registry = ToolRegistry::with_builtins();
        assert!(!registry.register_if_absent(crate::builtin::strings::ReverseStringTool));
        assert!(registry.register_if_absent(SlowTool));
        assert_eq!(registry.list().len(), 4);
    }

    #[tokio::test]
    async fn test_invoke_unknown_operation() {
        let registry = ToolRegistry::with_builtins();
        let err = registry
            .invoke("open_page_and_get_title", ToolArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolgraphError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_invoke_named_arguments() {
        let registry = ToolRegistry::with_builtins();
        let mut args = ToolArguments::new();
        args.insert("text".into(), serde_json::json!("abc"));
        let out = registry.invoke("reverse_string", args).await.unwrap();
        assert_eq!(out.content, "cba");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tool_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(SlowTool);
        let err = registry
            .execute("slow", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolgraphError::ToolTimeout { timeout_secs: 1, .. }));
    }
}
