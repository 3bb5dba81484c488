use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::*;

/// Raw mapping produced by an intent extractor.
pub type Extraction = serde_json::Map<String, serde_json::Value>;

/// Named arguments passed to a tool operation.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// LLM client — streaming chat completion.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}

/// Intent extractor — free text to structured fields.
///
/// `Err` means the extractor itself could not be reached or failed; garbage
/// content must come back as `Ok` with an empty mapping instead.
pub trait IntentExtractor: Send + Sync + 'static {
    fn extract<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Extraction>>;
}

/// Uniform tool invocation boundary.
///
/// Implementations may run the operation in-process, in a subprocess, or on a
/// remote server.
pub trait ToolInvoker: Send + Sync + 'static {
    fn invoke<'a>(
        &'a self,
        operation: &'a str,
        arguments: ToolArguments,
    ) -> BoxFuture<'a, Result<ToolResult>>;

    /// Operation names this invoker can serve.
    fn operations(&self) -> Vec<String>;
}

/// Tool — a single named operation served by a `ToolInvoker`.
pub trait Tool: Send + Sync + 'static {
    /// Operation name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema for tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given named arguments.
    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>>;

    /// Timeout in seconds for this tool.
    fn timeout_secs(&self) -> u64 {
        30
    }
}
