use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolgraphError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Run errors
    #[error("Intent extraction failed: {0}")]
    Extraction(String),

    #[error("Router selected node '{0}' which has no registered implementation")]
    UnknownNode(String),

    #[error("Graph integrity error: {0}")]
    Integrity(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run exceeded its deadline ({0}s)")]
    RunTimeout(u64),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // MCP errors
    #[error("MCP error: {0}")]
    Mcp(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ToolgraphError {
    /// Whether this error ends a run (as opposed to a single node).
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::Extraction(_)
                | Self::UnknownNode(_)
                | Self::Integrity(_)
                | Self::Cancelled
                | Self::RunTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ToolgraphError>;
