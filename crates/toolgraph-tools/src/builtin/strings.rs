use futures::future::BoxFuture;
use serde::Deserialize;

use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::traits::Tool;
use toolgraph_core::types::ToolResult;

// ── ReverseStringTool ───────────────────────────────────────────

pub struct ReverseStringTool;

#[derive(Deserialize)]
struct ReverseInput {
    text: String,
}

impl Tool for ReverseStringTool {
    fn name(&self) -> &str {
        "reverse_string"
    }
    fn description(&self) -> &str {
        "Reverse the characters of a string."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "Text to reverse" }
            },
            "required": ["text"]
        })
    }
    fn timeout_secs(&self) -> u64 {
        5
    }
    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: ReverseInput = serde_json::from_value(input)
                .map_err(|e| ToolgraphError::ToolValidation(e.to_string()))?;
            Ok(ToolResult::success(p.text.chars().rev().collect::<String>()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reverse() {
        let out = ReverseStringTool
            .execute(serde_json::json!({ "text": "hello world" }))
            .await
            .unwrap();
        assert_eq!(out.content, "dlrow olleh");
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn test_reverse_unicode_and_empty() {
        let out = ReverseStringTool
            .execute(serde_json::json!({ "text": "añb" }))
            .await
            .unwrap();
        assert_eq!(out.content, "bña");

        let out = ReverseStringTool
            .execute(serde_json::json!({ "text": "" }))
            .await
            .unwrap();
        assert_eq!(out.content, "");
    }

    #[tokio::test]
    async fn test_missing_text_is_validation_error() {
        let err = ReverseStringTool
            .execute(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolgraphError::ToolValidation(_)));
    }
}
