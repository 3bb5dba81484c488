use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use toolgraph_core::config::GraphConfig;
use toolgraph_core::error::ToolgraphError;
use toolgraph_core::traits::{ToolArguments, ToolInvoker};
use toolgraph_core::types::NodeId;

use crate::state::{BranchOutput, ExtractedParams, FailureKind, NodeFailure, ParamField, ResultField};

/// Static read/write contract of a tool node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeContract {
    pub id: NodeId,
    /// Operation name passed to the tool invoker.
    pub operation: &'static str,
    /// Parameters the node reads when building its call.
    pub reads: &'static [ParamField],
    /// The single branch-result field the node may write.
    pub writes: ResultField,
}

/// Why a single node produced no output.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("missing required parameter {0:?}")]
    MissingInput(ParamField),

    #[error("{0}")]
    Tool(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("malformed tool output: {0}")]
    Malformed(String),

    #[error("wrote {actual:?}, contract allows only {declared:?}")]
    WriteSet {
        declared: ResultField,
        actual: ResultField,
    },
}

impl NodeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MissingInput(_) => FailureKind::Invalid,
            Self::Tool(_) => FailureKind::Tool,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Malformed(_) => FailureKind::Malformed,
            Self::WriteSet { .. } => FailureKind::WriteSet,
        }
    }

    pub fn into_failure(self, node: NodeId) -> NodeFailure {
        NodeFailure {
            node,
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// A graph node wrapping one tool operation.
///
/// Nodes only see the extracted parameters, never another branch's result,
/// and hand back a single `BranchOutput` for the executor to merge.
pub trait ToolNode: Send + Sync + 'static {
    fn contract(&self) -> &NodeContract;

    /// Build the named arguments for the tool call.
    fn arguments(&self, params: &ExtractedParams) -> Result<ToolArguments, NodeError>;

    /// Turn the tool's text output into this node's branch result.
    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError>;
}

/// Invoke one node against the tool backend, bounded by `timeout`.
pub async fn run_node(
    node: &dyn ToolNode,
    params: &ExtractedParams,
    invoker: &dyn ToolInvoker,
    timeout: Duration,
) -> Result<BranchOutput, NodeError> {
    let contract = node.contract();
    let arguments = node.arguments(params)?;

    debug!(node = %contract.id, operation = contract.operation, "Invoking tool");

    let result = tokio::time::timeout(timeout, invoker.invoke(contract.operation, arguments))
        .await
        .map_err(|_| NodeError::Timeout(timeout.as_secs()))?
        .map_err(|e| match e {
            ToolgraphError::ToolTimeout { timeout_secs, .. } => NodeError::Timeout(timeout_secs),
            other => NodeError::Tool(other.to_string()),
        })?;

    if result.is_error || result.content.trim_start().starts_with("[Error]") {
        return Err(NodeError::Tool(result.content));
    }

    let output = node.interpret(result.content)?;
    if output.field() != contract.writes {
        return Err(NodeError::WriteSet {
            declared: contract.writes,
            actual: output.field(),
        });
    }
    Ok(output)
}

fn require<'a, T>(value: &'a Option<T>, field: ParamField) -> Result<&'a T, NodeError> {
    value.as_ref().ok_or(NodeError::MissingInput(field))
}

fn args(value: Value) -> ToolArguments {
    value.as_object().cloned().unwrap_or_default()
}

/// Parse a record collection returned by a log-style tool.
///
/// Accepts a JSON array, a single JSON object, or one JSON value per line
/// (how MCP servers return list results as separate content blocks).
/// Anything else is kept as a raw string.
pub fn parse_records(content: &str) -> Value {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Value::Array(Vec::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => return Value::Array(items),
        Ok(obj @ Value::Object(_)) => return Value::Array(vec![obj]),
        _ => {}
    }
    let lines: Option<Vec<Value>> = trimmed
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<Value>(l.trim()).ok())
        .collect();
    match lines {
        Some(items) if items.iter().all(Value::is_object) => Value::Array(items),
        _ => Value::String(content.to_string()),
    }
}

pub struct ReverseTextNode;

impl ToolNode for ReverseTextNode {
    fn contract(&self) -> &NodeContract {
        &NodeContract {
            id: NodeId::ReverseText,
            operation: "reverse_string",
            reads: &[ParamField::TextToReverse],
            writes: ResultField::ReversedText,
        }
    }

    fn arguments(&self, params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
        let text = require(&params.text_to_reverse, ParamField::TextToReverse)?;
        Ok(args(json!({ "text": text })))
    }

    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
        Ok(BranchOutput::ReversedText(content))
    }
}

pub struct CountdownNode;

impl ToolNode for CountdownNode {
    fn contract(&self) -> &NodeContract {
        &NodeContract {
            id: NodeId::Countdown,
            operation: "days_until",
            reads: &[ParamField::TargetDate],
            writes: ResultField::DaysRemaining,
        }
    }

    fn arguments(&self, params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
        let date = require(&params.target_date, ParamField::TargetDate)?;
        Ok(args(json!({ "date_str": date.format("%Y-%m-%d").to_string() })))
    }

    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
        content
            .trim()
            .parse::<i64>()
            .map(BranchOutput::DaysRemaining)
            .map_err(|_| NodeError::Malformed(format!("expected a day count, got {:?}", content)))
    }
}

pub struct CurrentDatetimeNode;

impl ToolNode for CurrentDatetimeNode {
    fn contract(&self) -> &NodeContract {
        &NodeContract {
            id: NodeId::CurrentDatetime,
            operation: "current_datetime",
            reads: &[],
            writes: ResultField::CurrentTime,
        }
    }

    fn arguments(&self, _params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
        Ok(ToolArguments::new())
    }

    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
        let value = content.trim();
        if value.is_empty() {
            return Err(NodeError::Malformed("empty timestamp".into()));
        }
        Ok(BranchOutput::CurrentTime(value.to_string()))
    }
}

pub struct PageTitleNode;

impl ToolNode for PageTitleNode {
    fn contract(&self) -> &NodeContract {
        &NodeContract {
            id: NodeId::PageTitle,
            operation: "open_page_and_get_title",
            reads: &[ParamField::PageUrl],
            writes: ResultField::PageTitle,
        }
    }

    fn arguments(&self, params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
        let url = require(&params.page_url, ParamField::PageUrl)?;
        Ok(args(json!({ "url": url })))
    }

    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
        Ok(BranchOutput::PageTitle(content.trim().to_string()))
    }
}

pub struct ClickElementNode;

impl ToolNode for ClickElementNode {
    fn contract(&self) -> &NodeContract {
        &NodeContract {
            id: NodeId::ClickElement,
            operation: "click_element_and_get_text",
            reads: &[
                ParamField::PageUrl,
                ParamField::ElementSelector,
                ParamField::ExtractionTarget,
            ],
            writes: ResultField::ClickResult,
        }
    }

    fn arguments(&self, params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
        let url = require(&params.page_url, ParamField::PageUrl)?;
        let selector = require(&params.element_selector, ParamField::ElementSelector)?;
        let selector = selector
            .strip_prefix("text=")
            .map(str::trim)
            .unwrap_or(selector);
        // extraction_target is optional for the tool
        let target = params.extraction_target.as_deref().unwrap_or_default();
        Ok(args(json!({
            "url": url,
            "selector": selector,
            "extraction_target": target,
        })))
    }

    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
        Ok(BranchOutput::ClickResult(content))
    }
}

pub struct ConsoleLogsNode {
    last_n: u32,
}

impl ConsoleLogsNode {
    pub fn new(last_n: u32) -> Self {
        Self { last_n }
    }
}

impl ToolNode for ConsoleLogsNode {
    fn contract(&self) -> &NodeContract {
        &NodeContract {
            id: NodeId::ConsoleLogs,
            operation: "get_console_logs",
            reads: &[],
            writes: ResultField::ConsoleLogs,
        }
    }

    fn arguments(&self, _params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
        Ok(args(json!({ "last_n": self.last_n })))
    }

    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
        Ok(BranchOutput::ConsoleLogs(parse_records(&content)))
    }
}

pub struct NetworkRequestsNode {
    last_n: u32,
}

impl NetworkRequestsNode {
    pub fn new(last_n: u32) -> Self {
        Self { last_n }
    }
}

impl ToolNode for NetworkRequestsNode {
    fn contract(&self) -> &NodeContract {
        &NodeContract {
            id: NodeId::NetworkRequests,
            operation: "get_network_requests",
            reads: &[],
            writes: ResultField::NetworkRequests,
        }
    }

    fn arguments(&self, _params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
        Ok(args(json!({ "last_n": self.last_n })))
    }

    fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
        Ok(BranchOutput::NetworkRequests(parse_records(&content)))
    }
}

/// Fixed mapping from node identifier to node behavior.
///
/// Built once at start-up and shared read-only.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, Arc<dyn ToolNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every standard node, with log-tail size taken from config.
    pub fn standard(config: &GraphConfig) -> Self {
        let mut registry = Self::new();
        registry.register(ReverseTextNode);
        registry.register(CountdownNode);
        registry.register(CurrentDatetimeNode);
        registry.register(PageTitleNode);
        registry.register(ClickElementNode);
        registry.register(ConsoleLogsNode::new(config.log_tail));
        registry.register(NetworkRequestsNode::new(config.log_tail));
        registry
    }

    /// Register a node under its contract id, replacing any previous one.
    pub fn register(&mut self, node: impl ToolNode) {
        let id = node.contract().id;
        self.nodes.insert(id, Arc::new(node));
    }

    pub fn get(&self, id: NodeId) -> Option<Arc<dyn ToolNode>> {
        self.nodes.get(&id).cloned()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Operations the nodes expect a backend to serve.
    pub fn operations(&self) -> Vec<&'static str> {
        self.nodes.values().map(|n| n.contract().operation).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use futures::future::BoxFuture;
    use toolgraph_core::types::ToolResult;

    struct FixedInvoker(std::result::Result<ToolResult, String>);

    impl ToolInvoker for FixedInvoker {
        fn invoke<'a>(
            &'a self,
            operation: &'a str,
            _arguments: ToolArguments,
        ) -> BoxFuture<'a, toolgraph_core::error::Result<ToolResult>> {
            let out = self.0.clone().map_err(|message| ToolgraphError::ToolExecution {
                tool: operation.to_string(),
                message,
            });
            Box::pin(async move { out })
        }

        fn operations(&self) -> Vec<String> {
            vec![]
        }
    }

    fn params() -> ExtractedParams {
        ExtractedParams {
            text_to_reverse: Some("hello".into()),
            target_date: NaiveDate::from_ymd_opt(2025, 12, 31),
            page_url: Some("https://example.com".into()),
            element_selector: Some("text=View all".into()),
            extraction_target: Some("car names".into()),
        }
    }

    #[test]
    fn test_standard_registry_covers_every_node() {
        let registry = NodeRegistry::standard(&GraphConfig::default());
        assert_eq!(registry.ids(), NodeId::ALL.to_vec());
        for id in NodeId::ALL {
            assert_eq!(registry.get(id).unwrap().contract().id, id);
        }
    }

    #[test]
    fn test_click_arguments_strip_text_prefix() {
        let args = ClickElementNode.arguments(&params()).unwrap();
        assert_eq!(args["selector"], "View all");
        assert_eq!(args["extraction_target"], "car names");
        assert_eq!(args["url"], "https://example.com");
    }

    #[test]
    fn test_missing_input_is_invalid() {
        let err = ReverseTextNode
            .arguments(&ExtractedParams::default())
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Invalid);
    }

    #[test]
    fn test_countdown_arguments_and_parse() {
        let args = CountdownNode.arguments(&params()).unwrap();
        assert_eq!(args["date_str"], "2025-12-31");
        assert_eq!(
            CountdownNode.interpret(" 42\n".into()).unwrap(),
            BranchOutput::DaysRemaining(42)
        );
        assert!(matches!(
            CountdownNode.interpret("soon".into()),
            Err(NodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_log_nodes_use_configured_tail() {
        let args = ConsoleLogsNode::new(3).arguments(&params()).unwrap();
        assert_eq!(args["last_n"], 3);
    }

    #[test]
    fn test_parse_records_shapes() {
        assert_eq!(
            parse_records(r#"[{"text":"a"}]"#),
            json!([{ "text": "a" }])
        );
        assert_eq!(
            parse_records("{\"url\":\"u1\"}\n{\"url\":\"u2\"}"),
            json!([{ "url": "u1" }, { "url": "u2" }])
        );
        assert_eq!(parse_records("not json"), json!("not json"));
        assert_eq!(parse_records(""), json!([]));
    }

    #[tokio::test]
    async fn test_run_node_success() {
        let invoker = FixedInvoker(Ok(ToolResult::success("olleh")));
        let out = run_node(&ReverseTextNode, &params(), &invoker, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, BranchOutput::ReversedText("olleh".into()));
    }

    #[tokio::test]
    async fn test_run_node_error_marker_is_failure() {
        let invoker = FixedInvoker(Ok(ToolResult::success("[Error] Click failed: nope")));
        let err = run_node(&ClickElementNode, &params(), &invoker, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Tool);

        let invoker = FixedInvoker(Ok(ToolResult::error("boom")));
        let err = run_node(&PageTitleNode, &params(), &invoker, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Tool);
    }

    #[tokio::test]
    async fn test_run_node_backend_error() {
        let invoker = FixedInvoker(Err("unreachable".into()));
        let err = run_node(&CurrentDatetimeNode, &params(), &invoker, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    struct TimedOutInvoker;

    impl ToolInvoker for TimedOutInvoker {
        fn invoke<'a>(
            &'a self,
            operation: &'a str,
            _arguments: ToolArguments,
        ) -> BoxFuture<'a, toolgraph_core::error::Result<ToolResult>> {
            let err = ToolgraphError::ToolTimeout {
                tool: operation.to_string(),
                timeout_secs: 30,
            };
            Box::pin(async move { Err(err) })
        }

        fn operations(&self) -> Vec<String> {
            vec![]
        }
    }

    #[tokio::test]
    async fn test_backend_timeout_is_timeout_failure() {
        let err = run_node(&ClickElementNode, &params(), &TimedOutInvoker, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert!(matches!(err, NodeError::Timeout(30)));
    }

    struct MislabelledNode;

    impl ToolNode for MislabelledNode {
        fn contract(&self) -> &NodeContract {
            &NodeContract {
                id: NodeId::PageTitle,
                operation: "open_page_and_get_title",
                reads: &[],
                writes: ResultField::PageTitle,
            }
        }
        fn arguments(&self, _params: &ExtractedParams) -> Result<ToolArguments, NodeError> {
            Ok(ToolArguments::new())
        }
        fn interpret(&self, content: String) -> Result<BranchOutput, NodeError> {
            Ok(BranchOutput::ReversedText(content))
        }
    }

    #[tokio::test]
    async fn test_run_node_rejects_foreign_write() {
        let invoker = FixedInvoker(Ok(ToolResult::success("x")));
        let err = run_node(&MislabelledNode, &params(), &invoker, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::WriteSet);
    }
}
