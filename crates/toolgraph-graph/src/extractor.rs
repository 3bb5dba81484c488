use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use toolgraph_core::config::ModelConfig;
use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::traits::{Extraction, IntentExtractor, LlmClient};
use toolgraph_core::types::ChatMessage;

const EXTRACTION_PROMPT: &str = r#"You extract structured inputs for a tool-calling assistant.
From the user query, extract only the fields that are clearly requested:
- `text_to_reverse`: the exact text the user wants reversed
- `target_date`: a date in YYYY-MM-DD format the user wants a countdown to
- `wants_datetime`: true if the user asks for the current date or time
- `page_url`: full URL to open in the browser
- `element_selector`: the visible text to click on that page, if any
- `extraction_target`: the kind of data to extract after the click (e.g. "car names", "car specs", "brand names")
- `wants_console_logs`: true if the user asks for browser console logs
- `wants_network_logs`: true if the user wants network activity

Omit fields that do not apply. Respond in JSON only, like:
{
  "text_to_reverse": "hello world",
  "target_date": "2025-12-31",
  "wants_datetime": false,
  "page_url": "https://example.com",
  "element_selector": "View all 5 and below seater",
  "extraction_target": "car names",
  "wants_console_logs": false,
  "wants_network_logs": false
}"#;

/// Intent extractor backed by a chat model.
pub struct LlmIntentExtractor {
    client: Arc<dyn LlmClient>,
    config: ModelConfig,
}

impl LlmIntentExtractor {
    pub fn new(client: Arc<dyn LlmClient>, config: ModelConfig) -> Self {
        Self { client, config }
    }
}

impl IntentExtractor for LlmIntentExtractor {
    fn extract<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Extraction>> {
        Box::pin(async move {
            let messages = vec![
                ChatMessage::system(EXTRACTION_PROMPT),
                ChatMessage::user(format!("User query:\n{}", text)),
            ];

            let response = toolgraph_llm::complete_text(self.client.as_ref(), &self.config, messages)
                .await
                .map_err(|e| ToolgraphError::Extraction(e.to_string()))?;

            debug!(chars = response.len(), "Extractor responded");
            Ok(parse_extraction(&response))
        })
    }
}

/// Parse model output into a field mapping. Anything that is not a JSON
/// object, with or without a Markdown fence, yields an empty mapping.
pub fn parse_extraction(content: &str) -> Extraction {
    let body = strip_fences(content.trim());

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = json_kind(&other), "Extractor returned non-object JSON");
            Extraction::new()
        }
        Err(_) => match embedded_object(body) {
            Some(map) => map,
            None => {
                warn!(preview = %body.chars().take(80).collect::<String>(), "Extractor returned unparsable content");
                Extraction::new()
            }
        },
    }
}

fn strip_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip an optional language tag on the opening fence.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// The outermost `{...}` span, for models that wrap JSON in prose.
fn embedded_object(text: &str) -> Option<Extraction> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolgraph_test_utils::MockLlmClient;

    #[test]
    fn test_parse_plain_object() {
        let map = parse_extraction(r#"{"text_to_reverse": "abc"}"#);
        assert_eq!(map["text_to_reverse"], json!("abc"));
    }

    #[test]
    fn test_parse_fenced_object() {
        let map = parse_extraction("```json\n{\"target_date\": \"2025-12-31\"}\n```");
        assert_eq!(map["target_date"], json!("2025-12-31"));
    }

    #[test]
    fn test_parse_object_in_prose() {
        let map = parse_extraction("Sure! Here it is: {\"page_url\": \"https://a.test\"} Hope that helps.");
        assert_eq!(map["page_url"], json!("https://a.test"));
    }

    #[test]
    fn test_garbage_is_empty() {
        assert!(parse_extraction("I could not understand").is_empty());
        assert!(parse_extraction("[1, 2, 3]").is_empty());
        assert!(parse_extraction("").is_empty());
    }

    #[tokio::test]
    async fn test_extract_through_llm() {
        let client = Arc::new(MockLlmClient::new(r#"{"wants_datetime": true}"#));
        let extractor = LlmIntentExtractor::new(client.clone(), ModelConfig::default());
        let map = extractor.extract("what time is it").await.unwrap();
        assert_eq!(map["wants_datetime"], json!(true));

        let sent = client.last_messages();
        assert!(sent.last().unwrap().content.contains("what time is it"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_extraction_error() {
        let client = Arc::new(MockLlmClient::failing("connection refused"));
        let extractor = LlmIntentExtractor::new(client, ModelConfig::default());
        let err = extractor.extract("anything").await.unwrap_err();
        assert!(matches!(err, ToolgraphError::Extraction(_)));
    }
}
