pub mod providers;
pub mod streaming;

use futures::StreamExt;
use toolgraph_core::config::ModelConfig;
use toolgraph_core::error::Result;
use toolgraph_core::traits::LlmClient;
use toolgraph_core::types::{ChatMessage, StreamDelta};

pub use providers::openai::OpenAiClient;

/// Create an LLM client based on the provider name.
///
/// Ollama, vLLM, OpenAI and friends all speak the OpenAI chat protocol.
pub fn create_client(config: &ModelConfig) -> Box<dyn LlmClient> {
    match config.provider.as_str() {
        "ollama" => Box::new(OpenAiClient::with_default_url(providers::openai::OLLAMA_API_URL)),
        _ => Box::new(OpenAiClient::new()),
    }
}

/// Run a chat request and concatenate every text delta.
pub async fn complete_text(
    client: &dyn LlmClient,
    config: &ModelConfig,
    messages: Vec<ChatMessage>,
) -> Result<String> {
    let mut stream = client.chat_stream(config, messages).await?;
    let mut text = String::new();
    while let Some(delta) = stream.next().await {
        if let StreamDelta::TextDelta(chunk) = delta? {
            text.push_str(&chunk);
        }
    }
    Ok(text)
}
