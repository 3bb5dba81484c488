use serde_json::Value;

use crate::state::{ResultField, RunState};

const RAW_PREVIEW_CHARS: usize = 300;

/// Combine every present branch result into the final answer.
///
/// Sections follow the fixed field order and are separated by a blank line.
/// No results gives the empty string.
pub fn aggregate(state: &RunState) -> String {
    let results = state.results();
    let target_date = state.params().and_then(|p| p.target_date);

    let mut parts = Vec::new();
    for field in ResultField::ORDER {
        let section = match field {
            ResultField::ReversedText => non_empty(results.reversed_text())
                .map(|v| format!("Reversed text: {}", v)),
            ResultField::DaysRemaining => results.days_remaining().map(|n| match target_date {
                Some(date) => format!("Days until {}: {}", date.format("%Y-%m-%d"), n),
                None => format!("Days remaining: {}", n),
            }),
            ResultField::CurrentTime => non_empty(results.current_time())
                .map(|v| format!("Current date and time: {}", v)),
            ResultField::PageTitle => non_empty(results.page_title())
                .map(|v| format!("Page title is: {}", v)),
            ResultField::ClickResult => non_empty(results.click_result()).map(format_click_result),
            ResultField::ConsoleLogs => non_empty_records(results.console_logs())
                .map(|v| format_records("Console Logs:", v, "text")),
            ResultField::NetworkRequests => non_empty_records(results.network_requests())
                .map(|v| format_records("Network Requests:", v, "url")),
        };
        parts.extend(section);
    }

    parts.join("\n\n")
}

/// Present but blank text renders nothing.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_records(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Array(records) => !records.is_empty(),
        Value::String(s) => !s.trim().is_empty(),
        Value::Null => false,
        _ => true,
    })
}

fn format_click_result(raw: &str) -> String {
    let extracted = serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|v| match v {
            Value::Object(mut map) => map.remove("extracted"),
            _ => None,
        });

    match extracted {
        Some(Value::Array(items)) => {
            let mut out = String::from("Extracted Data:");
            for item in &items {
                out.push_str("\n- ");
                out.push_str(&display(item));
            }
            out
        }
        Some(other) => format!("Extracted Result:\n{}", display(&other)),
        None => format!("Click result content:\n{}...", preview(raw)),
    }
}

fn format_records(heading: &str, value: &Value, key: &str) -> String {
    let Value::Array(records) = value else {
        return format!("{}\n{}...", heading, preview(&display(value)));
    };

    let mut out = String::from(heading);
    for record in records {
        out.push('\n');
        match record.get(key) {
            Some(v) => out.push_str(&display(v)),
            None => out.push_str(&preview(&record.to_string())),
        }
    }
    out
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(RAW_PREVIEW_CHARS).collect()
}
