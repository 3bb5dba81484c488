use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use toolgraph_core::error::{Result, ToolgraphError};
use toolgraph_core::types::{NodeId, RunId};

/// Parameters the extractor (or fallback parsing) pulled out of the input.
///
/// `None` means "not requested"; `Some("")` is a present, empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedParams {
    pub text_to_reverse: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub page_url: Option<String>,
    pub element_selector: Option<String>,
    pub extraction_target: Option<String>,
}

/// Names of the extracted parameters, used in node read contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamField {
    TextToReverse,
    TargetDate,
    PageUrl,
    ElementSelector,
    ExtractionTarget,
}

impl ExtractedParams {
    pub fn has(&self, field: ParamField) -> bool {
        match field {
            ParamField::TextToReverse => self.text_to_reverse.is_some(),
            ParamField::TargetDate => self.target_date.is_some(),
            ParamField::PageUrl => self.page_url.is_some(),
            ParamField::ElementSelector => self.element_selector.is_some(),
            ParamField::ExtractionTarget => self.extraction_target.is_some(),
        }
    }
}

/// One boolean per optional branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentFlags {
    pub wants_reversal: bool,
    pub wants_countdown: bool,
    pub wants_datetime: bool,
    pub wants_browser_open: bool,
    pub wants_click_action: bool,
    pub wants_console_logs: bool,
    pub wants_network_logs: bool,
}

impl IntentFlags {
    /// The flag guarding `node`.
    pub fn wants(&self, node: NodeId) -> bool {
        match node {
            NodeId::ReverseText => self.wants_reversal,
            NodeId::Countdown => self.wants_countdown,
            NodeId::CurrentDatetime => self.wants_datetime,
            NodeId::PageTitle => self.wants_browser_open,
            NodeId::ClickElement => self.wants_click_action,
            NodeId::ConsoleLogs => self.wants_console_logs,
            NodeId::NetworkRequests => self.wants_network_logs,
        }
    }

    pub fn any(&self) -> bool {
        NodeId::ALL.iter().any(|id| self.wants(*id))
    }
}

/// Branch result slots, in aggregation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultField {
    ReversedText,
    DaysRemaining,
    CurrentTime,
    PageTitle,
    ClickResult,
    ConsoleLogs,
    NetworkRequests,
}

impl ResultField {
    pub const ORDER: [ResultField; 7] = [
        ResultField::ReversedText,
        ResultField::DaysRemaining,
        ResultField::CurrentTime,
        ResultField::PageTitle,
        ResultField::ClickResult,
        ResultField::ConsoleLogs,
        ResultField::NetworkRequests,
    ];

    /// The only node allowed to write this field.
    pub fn owner(self) -> NodeId {
        match self {
            Self::ReversedText => NodeId::ReverseText,
            Self::DaysRemaining => NodeId::Countdown,
            Self::CurrentTime => NodeId::CurrentDatetime,
            Self::PageTitle => NodeId::PageTitle,
            Self::ClickResult => NodeId::ClickElement,
            Self::ConsoleLogs => NodeId::ConsoleLogs,
            Self::NetworkRequests => NodeId::NetworkRequests,
        }
    }
}

/// The single field update a tool node hands back to the executor.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchOutput {
    ReversedText(String),
    DaysRemaining(i64),
    CurrentTime(String),
    PageTitle(String),
    ClickResult(String),
    ConsoleLogs(serde_json::Value),
    NetworkRequests(serde_json::Value),
}

impl BranchOutput {
    pub fn field(&self) -> ResultField {
        match self {
            Self::ReversedText(_) => ResultField::ReversedText,
            Self::DaysRemaining(_) => ResultField::DaysRemaining,
            Self::CurrentTime(_) => ResultField::CurrentTime,
            Self::PageTitle(_) => ResultField::PageTitle,
            Self::ClickResult(_) => ResultField::ClickResult,
            Self::ConsoleLogs(_) => ResultField::ConsoleLogs,
            Self::NetworkRequests(_) => ResultField::NetworkRequests,
        }
    }
}

/// Write-once branch result fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchResults {
    reversed_text: Option<String>,
    days_remaining: Option<i64>,
    current_time: Option<String>,
    page_title: Option<String>,
    click_result: Option<String>,
    console_logs: Option<serde_json::Value>,
    network_requests: Option<serde_json::Value>,
}

impl BranchResults {
    pub fn reversed_text(&self) -> Option<&str> {
        self.reversed_text.as_deref()
    }
    pub fn days_remaining(&self) -> Option<i64> {
        self.days_remaining
    }
    pub fn current_time(&self) -> Option<&str> {
        self.current_time.as_deref()
    }
    pub fn page_title(&self) -> Option<&str> {
        self.page_title.as_deref()
    }
    pub fn click_result(&self) -> Option<&str> {
        self.click_result.as_deref()
    }
    pub fn console_logs(&self) -> Option<&serde_json::Value> {
        self.console_logs.as_ref()
    }
    pub fn network_requests(&self) -> Option<&serde_json::Value> {
        self.network_requests.as_ref()
    }

    pub fn is_present(&self, field: ResultField) -> bool {
        match field {
            ResultField::ReversedText => self.reversed_text.is_some(),
            ResultField::DaysRemaining => self.days_remaining.is_some(),
            ResultField::CurrentTime => self.current_time.is_some(),
            ResultField::PageTitle => self.page_title.is_some(),
            ResultField::ClickResult => self.click_result.is_some(),
            ResultField::ConsoleLogs => self.console_logs.is_some(),
            ResultField::NetworkRequests => self.network_requests.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ResultField::ORDER.iter().all(|f| !self.is_present(*f))
    }

    /// Store `output` in its slot. A slot that is already filled is left
    /// untouched and the rejected output is handed back.
    pub fn apply(&mut self, output: BranchOutput) -> std::result::Result<(), BranchOutput> {
        if self.is_present(output.field()) {
            return Err(output);
        }
        match output {
            BranchOutput::ReversedText(v) => self.reversed_text = Some(v),
            BranchOutput::DaysRemaining(v) => self.days_remaining = Some(v),
            BranchOutput::CurrentTime(v) => self.current_time = Some(v),
            BranchOutput::PageTitle(v) => self.page_title = Some(v),
            BranchOutput::ClickResult(v) => self.click_result = Some(v),
            BranchOutput::ConsoleLogs(v) => self.console_logs = Some(v),
            BranchOutput::NetworkRequests(v) => self.network_requests = Some(v),
        }
        Ok(())
    }

    /// Raw value per result field, for inspection.
    pub fn raw(&self) -> BTreeMap<ResultField, serde_json::Value> {
        let mut out = BTreeMap::new();
        let mut put = |field, value: Option<serde_json::Value>| {
            if let Some(v) = value {
                out.insert(field, v);
            }
        };
        put(ResultField::ReversedText, self.reversed_text.clone().map(Into::into));
        put(ResultField::DaysRemaining, self.days_remaining.map(Into::into));
        put(ResultField::CurrentTime, self.current_time.clone().map(Into::into));
        put(ResultField::PageTitle, self.page_title.clone().map(Into::into));
        put(ResultField::ClickResult, self.click_result.clone().map(Into::into));
        put(ResultField::ConsoleLogs, self.console_logs.clone());
        put(ResultField::NetworkRequests, self.network_requests.clone());
        out
    }
}

/// Why a dispatched node produced no result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Invalid,
    Tool,
    Timeout,
    Malformed,
    Panicked,
    WriteSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node: NodeId,
    pub kind: FailureKind,
    pub message: String,
}

/// Executor state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Start,
    Parsing,
    Barrier,
    Dispatch,
    Join,
    Aggregating,
    Done,
}

/// The record carried through one run.
///
/// Every setter refuses a second write, so a field observed by the
/// aggregator was produced exactly once.
#[derive(Debug, Clone)]
pub struct RunState {
    run_id: RunId,
    input_text: String,
    intent: Option<(ExtractedParams, IntentFlags)>,
    dispatched: Option<Vec<NodeId>>,
    results: BranchResults,
    succeeded: Vec<NodeId>,
    failures: Vec<NodeFailure>,
    final_answer: Option<String>,
    phases: Vec<RunPhase>,
}

impl RunState {
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            run_id: RunId::new(),
            input_text: input_text.into(),
            intent: None,
            dispatched: None,
            results: BranchResults::default(),
            succeeded: Vec::new(),
            failures: Vec::new(),
            final_answer: None,
            phases: vec![RunPhase::Start],
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    pub fn params(&self) -> Option<&ExtractedParams> {
        self.intent.as_ref().map(|(p, _)| p)
    }

    /// Flags, or all-false before parsing completed.
    pub fn flags(&self) -> IntentFlags {
        self.intent.as_ref().map(|(_, f)| *f).unwrap_or_default()
    }

    pub fn results(&self) -> &BranchResults {
        &self.results
    }

    pub fn dispatched(&self) -> &[NodeId] {
        self.dispatched.as_deref().unwrap_or(&[])
    }

    pub fn succeeded(&self) -> &[NodeId] {
        &self.succeeded
    }

    pub fn failures(&self) -> &[NodeFailure] {
        &self.failures
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    pub fn phases(&self) -> &[RunPhase] {
        &self.phases
    }

    pub(crate) fn enter(&mut self, phase: RunPhase) {
        self.phases.push(phase);
    }

    pub fn set_intent(&mut self, params: ExtractedParams, flags: IntentFlags) -> Result<()> {
        if self.intent.is_some() {
            return Err(ToolgraphError::Integrity("intent already extracted".into()));
        }
        self.intent = Some((params, flags));
        Ok(())
    }

    pub(crate) fn set_dispatched(&mut self, nodes: Vec<NodeId>) -> Result<()> {
        if self.dispatched.is_some() {
            return Err(ToolgraphError::Integrity("router evaluated twice".into()));
        }
        self.dispatched = Some(nodes);
        Ok(())
    }

    /// Merge one node's output. Only the owning, dispatched node may fill a
    /// slot, and only once.
    pub fn record_output(&mut self, node: NodeId, output: BranchOutput) -> std::result::Result<(), NodeFailure> {
        if !self.dispatched().contains(&node) {
            return Err(NodeFailure {
                node,
                kind: FailureKind::WriteSet,
                message: "node was not dispatched".into(),
            });
        }
        let field = output.field();
        if field.owner() != node {
            return Err(NodeFailure {
                node,
                kind: FailureKind::WriteSet,
                message: format!("{:?} is owned by {}", field, field.owner()),
            });
        }
        self.results.apply(output).map_err(|_| NodeFailure {
            node,
            kind: FailureKind::WriteSet,
            message: format!("{:?} already written", field),
        })?;
        self.succeeded.push(node);
        Ok(())
    }

    pub fn record_failure(&mut self, failure: NodeFailure) {
        self.failures.push(failure);
    }

    pub fn set_final_answer(&mut self, answer: String) -> Result<()> {
        if self.final_answer.is_some() {
            return Err(ToolgraphError::Integrity("aggregator ran twice".into()));
        }
        self.final_answer = Some(answer);
        Ok(())
    }
}
