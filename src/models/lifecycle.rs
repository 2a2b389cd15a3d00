//! Execution lifecycle signals
//!
//! Signals are produced by the (external) execution engine while running
//! pickles. They are consumed, in order, by the event aggregator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Location;

/// Execution status of a step or a whole test case
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
    Pending,
    Undefined,
    Ambiguous,
    #[default]
    Unknown,
}

impl Status {
    /// Order used when breaking totals down by status
    pub fn summary_order() -> [Status; 7] {
        [
            Status::Failed,
            Status::Ambiguous,
            Status::Undefined,
            Status::Pending,
            Status::Skipped,
            Status::Passed,
            Status::Unknown,
        ]
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Status::Passed | Status::Skipped)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
            Status::Pending => "pending",
            Status::Undefined => "undefined",
            Status::Ambiguous => "ambiguous",
            Status::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One step slot of a prepared test case. Hooks carry no source location.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    #[serde(default)]
    pub source_location: Option<Location>,
    #[serde(default)]
    pub action_location: Option<Location>,
}

impl TestStep {
    pub fn is_hook(&self) -> bool {
        self.source_location.is_none()
    }
}

/// Step shape of a pickle, established once and reused across retries
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub pickle_id: String,
    pub steps: Vec<TestStep>,
}

/// Reference to one attempt of a pickle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRef {
    pub pickle_id: String,
    pub attempt_number: u32,
}

/// Outcome of one step; `duration` is absent in dry runs
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl StepResult {
    pub fn passed(duration: f64) -> Self {
        Self {
            status: Status::Passed,
            duration: Some(duration),
            error_message: None,
        }
    }

    pub fn failed(duration: f64, message: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            duration: Some(duration),
            error_message: Some(message.into()),
        }
    }
}

/// Overall outcome of one attempt
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub retried: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAttachment {
    pub test_case: AttemptRef,
    pub index: usize,
    pub data: String,
    pub media_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFinished {
    pub test_case: AttemptRef,
    pub index: usize,
    pub result: StepResult,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFinished {
    pub test_case: AttemptRef,
    pub result: TestCaseResult,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFinished {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// One lifecycle signal
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleEvent {
    TestCasePrepared(TestCase),
    TestCaseStarted(AttemptRef),
    TestStepAttachment(StepAttachment),
    TestStepFinished(StepFinished),
    TestCaseFinished(CaseFinished),
    TestRunFinished(RunFinished),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::TestCasePrepared(_) => "test-case-prepared",
            LifecycleEvent::TestCaseStarted(_) => "test-case-started",
            LifecycleEvent::TestStepAttachment(_) => "test-step-attachment",
            LifecycleEvent::TestStepFinished(_) => "test-step-finished",
            LifecycleEvent::TestCaseFinished(_) => "test-case-finished",
            LifecycleEvent::TestRunFinished(_) => "test-run-finished",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_step_result_defaults() {
        let json = r#"{"testStepFinished":{"testCase":{"pickleId":"p1","attemptNumber":1},"index":0,"result":{}}}"#;
        let event: LifecycleEvent = serde_json::from_str(json).unwrap();
        let LifecycleEvent::TestStepFinished(finished) = event else {
            panic!("expected step finished");
        };
        assert_eq!(finished.result.status, Status::Unknown);
        assert_eq!(finished.result.duration, None);
    }

    #[test]
    fn test_hook_detection() {
        let hook = TestStep {
            source_location: None,
            action_location: Some(Location::new("hooks.rs", 3)),
        };
        assert!(hook.is_hook());
        assert!(!TestStep {
            source_location: Some(Location::new("a.feature", 6)),
            action_location: None,
        }
        .is_hook());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(Status::Passed.to_string(), "passed");
        assert_eq!(
            serde_json::to_string(&Status::Undefined).unwrap(),
            "\"undefined\""
        );
    }
}
