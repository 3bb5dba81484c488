use chrono::{Local, NaiveDate, NaiveDateTime};
use futures::future::BoxFuture;
use serde::Deserialize;

use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::traits::Tool;
use toolgraph_core::types::ToolResult;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── CurrentDatetimeTool ─────────────────────────────────────────

pub struct CurrentDatetimeTool;

impl Tool for CurrentDatetimeTool {
    fn name(&self) -> &str {
        "current_datetime"
    }
    fn description(&self) -> &str {
        "Current local date and time from the system clock."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
    fn timeout_secs(&self) -> u64 {
        5
    }
    fn execute(&self, _input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            Ok(ToolResult::success(
                Local::now().format(DATETIME_FORMAT).to_string(),
            ))
        })
    }
}

// ── DaysUntilTool ───────────────────────────────────────────────

pub struct DaysUntilTool;

#[derive(Deserialize)]
struct DaysUntilInput {
    date_str: String,
}

/// Whole days from `now` until midnight of `target`, never negative.
pub fn days_between(now: NaiveDateTime, target: NaiveDate) -> i64 {
    let Some(midnight) = target.and_hms_opt(0, 0, 0) else {
        return 0;
    };
    (midnight - now).num_days().max(0)
}

impl Tool for DaysUntilTool {
    fn name(&self) -> &str {
        "days_until"
    }
    fn description(&self) -> &str {
        "Number of days from today until a future date (YYYY-MM-DD)."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "date_str": { "type": "string", "description": "A date in YYYY-MM-DD format" }
            },
            "required": ["date_str"]
        })
    }
    fn timeout_secs(&self) -> u64 {
        5
    }
    fn execute(&self, input: serde_json::Value) -> BoxFuture<'_, Result<ToolResult>> {
        Box::pin(async move {
            let p: DaysUntilInput = serde_json::from_value(input)
                .map_err(|e| ToolgraphError::ToolValidation(e.to_string()))?;
            let target = NaiveDate::parse_from_str(p.date_str.trim(), "%Y-%m-%d").map_err(|e| {
                ToolgraphError::ToolValidation(format!("invalid date '{}': {}", p.date_str, e))
            })?;
            let days = days_between(Local::now().naive_local(), target);
            Ok(ToolResult::success(days.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), DATETIME_FORMAT).unwrap()
    }

    #[test]
    fn test_days_between_counts_whole_days() {
        let target = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(days_between(at("2025-12-01", "00:00:00"), target), 30);
        // partial day is truncated
        assert_eq!(days_between(at("2025-12-01", "09:30:00"), target), 29);
    }

    #[test]
    fn test_days_between_past_is_zero() {
        let target = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(days_between(at("2025-06-01", "12:00:00"), target), 0);
    }

    #[tokio::test]
    async fn test_days_until_rejects_bad_date() {
        let err = DaysUntilTool
            .execute(serde_json::json!({ "date_str": "2025-13-45" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolgraphError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_days_until_far_future_is_positive() {
        let out = DaysUntilTool
            .execute(serde_json::json!({ "date_str": "2999-01-01" }))
            .await
            .unwrap();
        assert!(out.content.parse::<i64>().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_current_datetime_format() {
        let out = CurrentDatetimeTool
            .execute(serde_json::json!({}))
            .await
            .unwrap();
        assert!(NaiveDateTime::parse_from_str(&out.content, DATETIME_FORMAT).is_ok());
    }
}
