//! `WorkflowRun` and `StepRecord` (§3): transient, never-persisted values
//! owned by a single caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wts_progress::StepId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    DomainSiteCopy,
    DomainSiteVoice,
    SimpleSite,
}

/// One entry per attempted pipeline stage. Step ids within a run form a
/// prefix of the canonical order (§8 invariant 1): a run that fails at step
/// K has no step > K.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: StepId,
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    pub error: Option<String>,
}

impl StepRecord {
    pub fn ok(step: StepId, data: Value) -> Self {
        Self { step, success: true, data, error: None }
    }

    pub fn failed(step: StepId, error: impl Into<String>) -> Self {
        Self { step, success: false, data: Value::Null, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub correlation_id: String,
    pub kind: WorkflowKind,
    pub steps: Vec<StepRecord>,
    pub success: bool,
    pub error: Option<String>,
    pub result: Value,
}

impl WorkflowRun {
    pub fn new(correlation_id: impl Into<String>, kind: WorkflowKind) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            kind,
            steps: Vec::new(),
            success: true,
            error: None,
            result: Value::Null,
        }
    }

    pub fn record(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.success = false;
        self.error = Some(error.into());
    }
}
