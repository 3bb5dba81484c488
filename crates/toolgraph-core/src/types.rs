use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one graph run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an optional tool branch.
///
/// The set is closed: the router can only ever name one of these, and the
/// declaration order is the order used for routing output and aggregation.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    ReverseText,
    Countdown,
    CurrentDatetime,
    PageTitle,
    ClickElement,
    ConsoleLogs,
    NetworkRequests,
}

impl NodeId {
    pub const ALL: [NodeId; 7] = [
        NodeId::ReverseText,
        NodeId::Countdown,
        NodeId::CurrentDatetime,
        NodeId::PageTitle,
        NodeId::ClickElement,
        NodeId::ConsoleLogs,
        NodeId::NetworkRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReverseText => "reverse_text",
            Self::Countdown => "countdown",
            Self::CurrentDatetime => "current_datetime",
            Self::PageTitle => "page_title",
            Self::ClickElement => "click_element",
            Self::ConsoleLogs => "console_logs",
            Self::NetworkRequests => "network_requests",
        }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message sent to an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Why an LLM stopped generating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
}

/// Streaming delta from an LLM response.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    TextDelta(String),
    Stop(StopReason),
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Result returned by a tool operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Description of an available tool operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Observability events emitted while a run progresses.
#[derive(Debug, Clone)]
pub enum GraphEvent {
    RunStarted {
        run_id: RunId,
    },
    Routed {
        run_id: RunId,
        nodes: Vec<NodeId>,
    },
    NodeStarted {
        run_id: RunId,
        node: NodeId,
    },
    NodeFinished {
        run_id: RunId,
        node: NodeId,
        elapsed_ms: u64,
    },
    NodeFailed {
        run_id: RunId,
        node: NodeId,
        error: String,
    },
    RunFinished {
        run_id: RunId,
        partial: bool,
        elapsed_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_order_matches_declaration() {
        let mut shuffled = vec![
            NodeId::NetworkRequests,
            NodeId::ReverseText,
            NodeId::CurrentDatetime,
            NodeId::Countdown,
        ];
        shuffled.sort();
        assert_eq!(
            shuffled,
            vec![
                NodeId::ReverseText,
                NodeId::Countdown,
                NodeId::CurrentDatetime,
                NodeId::NetworkRequests,
            ]
        );
    }

    #[test]
    fn test_node_id_serde_names() {
        let json = serde_json::to_string(&NodeId::ClickElement).unwrap();
        assert_eq!(json, "\"click_element\"");
        for id in NodeId::ALL {
            let encoded = serde_json::to_value(id).unwrap();
            assert_eq!(encoded.as_str(), Some(id.as_str()));
        }
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
