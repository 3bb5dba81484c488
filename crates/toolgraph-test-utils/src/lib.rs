//! Mocks and fixtures shared by toolgraph tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};

use toolgraph_core::config::ModelConfig;
use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::traits::{Extraction, IntentExtractor, LlmClient, ToolArguments, ToolInvoker};
use toolgraph_core::types::{ChatMessage, StopReason, StreamDelta, ToolResult};

/// How a mocked operation answers.
#[derive(Debug, Clone)]
pub enum Script {
    /// Fixed text content.
    Text(String),
    /// Reverse the `text` argument.
    Reverse,
    /// Backend error (`Err`).
    Fail(String),
    /// Result flagged `is_error`.
    ErrorResult(String),
}

/// Scripted `ToolInvoker` that counts calls per operation.
///
/// Clones share call records, so a test can keep one handle and give
/// another to the executor.
#[derive(Clone, Default)]
pub struct MockInvoker {
    scripts: Arc<HashMap<String, Script>>,
    delays: Arc<HashMap<String, Duration>>,
    calls: Arc<Mutex<HashMap<String, Vec<ToolArguments>>>>,
}

impl MockInvoker {
    /// No operations: every call is `ToolNotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every operation the standard nodes call, with plausible output.
    pub fn standard() -> Self {
        Self::new()
            .script("reverse_string", Script::Reverse)
            .respond("days_until", "42")
            .respond("current_datetime", "2025-06-01 12:00:00")
            .respond("open_page_and_get_title", "Example Domain")
            .respond(
                "click_element_and_get_text",
                r#"{"extracted": ["Swift", "Baleno"]}"#,
            )
            .respond(
                "get_console_logs",
                r#"[{"type": "log", "text": "page ready", "location": {}}]"#,
            )
            .respond(
                "get_network_requests",
                r#"[{"url": "https://example.com/", "method": "GET"}]"#,
            )
    }

    pub fn script(mut self, operation: &str, script: Script) -> Self {
        Arc::make_mut(&mut self.scripts).insert(operation.to_string(), script);
        self
    }

    pub fn respond(self, operation: &str, content: &str) -> Self {
        self.script(operation, Script::Text(content.to_string()))
    }

    pub fn fail(self, operation: &str, message: &str) -> Self {
        self.script(operation, Script::Fail(message.to_string()))
    }

    pub fn error_result(self, operation: &str, message: &str) -> Self {
        self.script(operation, Script::ErrorResult(message.to_string()))
    }

    /// Sleep before answering `operation`.
    pub fn delay(mut self, operation: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(operation.to_string(), delay);
        self
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .map_or(0, Vec::len)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().map(Vec::len).sum()
    }

    pub fn last_arguments(&self, operation: &str) -> Option<ToolArguments> {
        self.calls
            .lock()
            .unwrap()
            .get(operation)
            .and_then(|calls| calls.last().cloned())
    }
}

impl ToolInvoker for MockInvoker {
    fn invoke<'a>(
        &'a self,
        operation: &'a str,
        arguments: ToolArguments,
    ) -> BoxFuture<'a, Result<ToolResult>> {
        Box::pin(async move {
            let text = arguments
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            self.calls
                .lock()
                .unwrap()
                .entry(operation.to_string())
                .or_default()
                .push(arguments);

            if let Some(delay) = self.delays.get(operation) {
                tokio::time::sleep(*delay).await;
            }

            match self.scripts.get(operation) {
                Some(Script::Text(content)) => Ok(ToolResult::success(content.clone())),
                Some(Script::Reverse) => Ok(ToolResult::success(text.chars().rev().collect::<String>())),
                Some(Script::Fail(message)) => Err(ToolgraphError::ToolExecution {
                    tool: operation.to_string(),
                    message: message.clone(),
                }),
                Some(Script::ErrorResult(message)) => Ok(ToolResult::error(message.clone())),
                None => Err(ToolgraphError::ToolNotFound(operation.to_string())),
            }
        })
    }

    fn operations(&self) -> Vec<String> {
        let mut ops: Vec<String> = self.scripts.keys().cloned().collect();
        ops.sort();
        ops
    }
}

/// Extractor returning a fixed mapping (or a fixed error).
pub struct StaticExtractor {
    response: std::result::Result<Extraction, String>,
    calls: AtomicUsize,
}

impl StaticExtractor {
    /// `value` should be a JSON object; anything else behaves like `empty()`.
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            response: Ok(value.as_object().cloned().unwrap_or_default()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Extractor that found nothing (or produced garbage).
    pub fn empty() -> Self {
        Self::new(serde_json::Value::Null)
    }

    /// Extractor whose backend is unreachable.
    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IntentExtractor for StaticExtractor {
    fn extract<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<Extraction>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .response
            .clone()
            .map_err(ToolgraphError::LlmRequest);
        Box::pin(async move { response })
    }
}

/// LLM client streaming a canned reply in small chunks.
pub struct MockLlmClient {
    reply: std::result::Result<String, String>,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockLlmClient {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages sent with the most recent request.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

impl LlmClient for MockLlmClient {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        *self.last_messages.lock().unwrap() = messages;
        Box::pin(async move {
            let reply = self.reply.clone().map_err(ToolgraphError::LlmRequest)?;

            let chars: Vec<char> = reply.chars().collect();
            let mut deltas: Vec<Result<StreamDelta>> = chars
                .chunks(8)
                .map(|c| Ok(StreamDelta::TextDelta(c.iter().collect())))
                .collect();
            deltas.push(Ok(StreamDelta::Stop(StopReason::EndTurn)));

            let stream: BoxStream<'_, Result<StreamDelta>> = Box::pin(stream::iter(deltas));
            Ok(stream)
        })
    }
}
