//! Attempt records
//!
//! One [`Attempt`] per (pickle id, attempt number). It snapshots the
//! prepared test case when it starts and is sealed by its finish signal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{AttemptRef, Status, StepResult, TestCase, TestCaseResult, TestStep};

/// Identity used for every mutation
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptKey {
    pub pickle_id: String,
    pub attempt_number: u32,
}

impl AttemptKey {
    pub fn new(pickle_id: impl Into<String>, attempt_number: u32) -> Self {
        Self {
            pickle_id: pickle_id.into(),
            attempt_number,
        }
    }
}

impl From<&AttemptRef> for AttemptKey {
    fn from(r: &AttemptRef) -> Self {
        Self::new(r.pickle_id.clone(), r.attempt_number)
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pickle_id, self.attempt_number)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentData {
    pub data: String,
    pub media_type: String,
}

/// Accumulated state of one step slot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub result: Option<StepResult>,
    pub attachments: Vec<AttachmentData>,
}

/// Where an attempt is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttemptPhase {
    Started,
    Finished { status: Status, retried: bool },
}

/// Per-step lifecycle position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepPhase {
    Pending,
    Finished(Status),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub key: AttemptKey,
    pub test_case: TestCase,
    pub steps: Vec<StepRecord>,
    pub result: Option<TestCaseResult>,
}

impl Attempt {
    pub(crate) fn open(key: AttemptKey, test_case: TestCase) -> Self {
        let steps = vec![StepRecord::default(); test_case.steps.len()];
        Self {
            key,
            test_case,
            steps,
            result: None,
        }
    }

    pub fn phase(&self) -> AttemptPhase {
        match &self.result {
            None => AttemptPhase::Started,
            Some(result) => AttemptPhase::Finished {
                status: result.status,
                retried: result.retried,
            },
        }
    }

    pub fn step_phase(&self, index: usize) -> Option<StepPhase> {
        self.steps.get(index).map(|record| match &record.result {
            Some(result) => StepPhase::Finished(result.status),
            None => StepPhase::Pending,
        })
    }

    /// Sealed and not superseded by a retry
    pub fn is_final(&self) -> bool {
        matches!(&self.result, Some(result) if !result.retried)
    }

    pub fn status(&self) -> Status {
        self.result.as_ref().map(|r| r.status).unwrap_or_default()
    }

    /// Test steps paired with their recorded state, in test case order
    pub fn step_entries(&self) -> impl Iterator<Item = (&TestStep, &StepRecord)> {
        self.test_case.steps.iter().zip(self.steps.iter())
    }
}
