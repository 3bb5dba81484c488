use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolgraphError};

/// Top-level toolgraph configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    #[serde(default)]
    pub mcp: Option<McpConfig>,
}

/// LLM used by the intent extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Extra HTTP headers sent with every request.
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            extra_headers: HashMap::new(),
        }
    }
}

fn default_provider() -> String { "ollama".to_string() }
fn default_model_id() -> String { "llama3.2".to_string() }
fn default_max_tokens() -> u32 { 1024 }
fn default_temperature() -> f32 { 0.0 }

/// Graph executor limits and tool wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Deadline for a whole run, parsing included.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Deadline for a single tool node.
    #[serde(default = "default_node_timeout")]
    pub node_timeout_secs: u64,
    /// How many log records the browser log nodes request.
    #[serde(default = "default_log_tail")]
    pub log_tail: u32,
    /// Register the in-process string and date tools.
    #[serde(default = "default_builtin_tools")]
    pub builtin_tools: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: default_run_timeout(),
            node_timeout_secs: default_node_timeout(),
            log_tail: default_log_tail(),
            builtin_tools: default_builtin_tools(),
        }
    }
}

fn default_run_timeout() -> u64 { 120 }
fn default_node_timeout() -> u64 { 60 }
fn default_log_tail() -> u32 { 5 }
fn default_builtin_tools() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

/// MCP (Model Context Protocol) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: HashMap<String, McpServerConfig>,
}

/// Configuration for a single MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub transport: McpTransport,
    #[serde(default = "default_auto_connect")]
    pub auto_connect: bool,
    /// Per-tool-call timeout in seconds. Default: 120.
    #[serde(default = "default_mcp_timeout")]
    pub timeout_secs: u64,
}

fn default_auto_connect() -> bool { true }
fn default_mcp_timeout() -> u64 { 120 }

/// MCP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpTransport {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Sse {
        url: String,
    },
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ToolgraphError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| ToolgraphError::Config(e.to_string()))
    }

    /// Config derived from the environment when no file exists.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(model) = std::env::var("TOOLGRAPH_MODEL") {
            config.model.model_id = model;
        }
        if let Ok(url) = std::env::var("TOOLGRAPH_BASE_URL") {
            config.model.base_url = Some(url);
        }
        config.model.api_key = std::env::var("OPENAI_API_KEY").ok();
        config
    }

    /// Default per-user config location (`~/.toolgraph/config.toml`).
    pub fn home_config_path() -> Option<PathBuf> {
        dirs_home().map(|h| h.join(".toolgraph").join("config.toml"))
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_TOOLGRAPH_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_TOOLGRAPH_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_TOOLGRAPH_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_TOOLGRAPH_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_TOOLGRAPH_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.model.provider, "ollama");
        assert_eq!(config.model.model_id, "llama3.2");
        assert_eq!(config.graph.run_timeout_secs, 120);
        assert_eq!(config.graph.node_timeout_secs, 60);
        assert_eq!(config.graph.log_tail, 5);
        assert!(config.graph.builtin_tools);
        assert!(config.gateway.is_none());
        assert!(config.mcp.is_none());
    }

    #[test]
    fn test_mcp_stdio_server() {
        let toml_str = r#"
[mcp.servers.playwright]
timeout_secs = 90

[mcp.servers.playwright.transport]
type = "stdio"
command = "python"
args = ["tools/playwright_tools_server.py"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let mcp = config.mcp.unwrap();
        let server = &mcp.servers["playwright"];
        assert_eq!(server.timeout_secs, 90);
        assert!(server.auto_connect);
        match &server.transport {
            McpTransport::Stdio { command, args, .. } => {
                assert_eq!(command, "python");
                assert_eq!(args, &vec!["tools/playwright_tools_server.py".to_string()]);
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }

    #[test]
    fn test_gateway_bind_default() {
        let config: AppConfig = toml::from_str("[gateway]\n").unwrap();
        assert_eq!(config.gateway.unwrap().bind, "127.0.0.1:8000");
    }
}
