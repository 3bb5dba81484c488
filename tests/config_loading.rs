use std::io::Write;

use toolgraph_core::config::{AppConfig, McpTransport};

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[model]
provider = "openai"
model_id = "gpt-4o-mini"
base_url = "http://localhost:8080/v1/chat/completions"
api_key = "sk-test-key"
max_tokens = 512
temperature = 0.2

[graph]
run_timeout_secs = 30
node_timeout_secs = 10
log_tail = 7
builtin_tools = false

[gateway]
bind = "0.0.0.0:9999"

[mcp.servers.playwright]
timeout_secs = 45

[mcp.servers.playwright.transport]
type = "stdio"
command = "python"
args = ["tools/playwright_tools_server.py"]

[mcp.servers.remote]
auto_connect = false

[mcp.servers.remote.transport]
type = "sse"
url = "http://localhost:9000/mcp"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "openai");
    assert_eq!(config.model.model_id, "gpt-4o-mini");
    assert_eq!(config.model.api_key, Some("sk-test-key".to_string()));
    assert_eq!(config.model.max_tokens, 512);

    assert_eq!(config.graph.run_timeout_secs, 30);
    assert_eq!(config.graph.node_timeout_secs, 10);
    assert_eq!(config.graph.log_tail, 7);
    assert!(!config.graph.builtin_tools);

    let gw = config.gateway.expect("gateway present");
    assert_eq!(gw.bind, "0.0.0.0:9999");

    let mcp = config.mcp.expect("mcp present");
    let playwright = &mcp.servers["playwright"];
    assert_eq!(playwright.timeout_secs, 45);
    assert!(playwright.auto_connect);
    match &playwright.transport {
        McpTransport::Stdio { command, args, .. } => {
            assert_eq!(command, "python");
            assert_eq!(args, &vec!["tools/playwright_tools_server.py".to_string()]);
        }
        other => panic!("unexpected transport {:?}", other),
    }
    assert!(!mcp.servers["remote"].auto_connect);
    assert!(matches!(mcp.servers["remote"].transport, McpTransport::Sse { .. }));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("TOOLGRAPH_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[model]
model_id = "test-model"
api_key = "${TOOLGRAPH_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.model.api_key, Some("expanded-key-value".to_string()));

    std::env::remove_var("TOOLGRAPH_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[model]
model_id = "llama3.2"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.model.provider, "ollama");
    assert_eq!(config.graph.run_timeout_secs, 120);
    assert_eq!(config.graph.node_timeout_secs, 60);
    assert_eq!(config.graph.log_tail, 5);
    assert!(config.graph.builtin_tools);
    assert!(config.gateway.is_none());
    assert!(config.mcp.is_none());
}

#[test]
fn test_missing_file_is_not_found() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/toolgraph.toml")).unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_invalid_toml_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[graph\nlog_tail = ").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().starts_with("Config error"));
}
