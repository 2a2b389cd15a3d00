//! Event aggregator state
//!
//! [`EventAggregator`] is a keyed reducer: every lifecycle signal is applied
//! through [`EventAggregator::apply`], which validates the signal against the
//! current state before touching anything. A rejected signal leaves the
//! state exactly as it was.
//!
//! Attachments for a step index are accepted until the attempt is finished,
//! whether or not that index already has a result. They are kept in arrival
//! order. The finish signal of the attempt closes every index.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

use super::attempt::{AttachmentData, Attempt, AttemptKey, AttemptPhase, StepPhase};
use crate::models::{
    AttemptRef, CaseFinished, LifecycleEvent, RunFinished, StepAttachment, StepFinished, TestCase,
};

/// How signals that contradict the aggregate are handled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsistencyMode {
    /// Log a warning and ignore the signal
    #[default]
    Lenient,
    /// Fail with the violation
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyViolation {
    #[error("Pickle '{pickle_id}' was started before its test case was prepared")]
    NotPrepared { pickle_id: String },

    #[error("Pickle '{pickle_id}' started attempt {actual}, expected attempt {expected}")]
    UnexpectedAttemptNumber {
        pickle_id: String,
        expected: u32,
        actual: u32,
    },

    #[error("No started attempt {key}")]
    UnknownAttempt { key: AttemptKey },

    #[error("Attempt {key} is already finished")]
    AttemptSealed { key: AttemptKey },

    #[error("Step index {index} is out of range for attempt {key} with {len} steps")]
    StepIndexOutOfRange {
        key: AttemptKey,
        index: usize,
        len: usize,
    },

    #[error("Step {index} of attempt {key} already has a result")]
    DuplicateStepResult { key: AttemptKey, index: usize },

    #[error("Received '{event}' after the test run finished")]
    RunAlreadyFinished { event: &'static str },
}

/// Raw aggregate, persisted verbatim for inspection
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSnapshot {
    pub attempts: Vec<Attempt>,
    pub run_result: Option<RunFinished>,
    pub ignored_signals: usize,
}

#[derive(Clone, Debug, Default)]
pub struct EventAggregator {
    mode: ConsistencyMode,
    prepared: HashMap<String, TestCase>,
    attempts: BTreeMap<AttemptKey, Attempt>,
    run_result: Option<RunFinished>,
    ignored_signals: usize,
}

impl EventAggregator {
    pub fn new(mode: ConsistencyMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Fold a complete signal sequence into a fresh aggregate
    pub fn replay<'a, I>(mode: ConsistencyMode, events: I) -> Result<Self, ConsistencyViolation>
    where
        I: IntoIterator<Item = &'a LifecycleEvent>,
    {
        let mut aggregator = Self::new(mode);
        for event in events {
            aggregator.apply(event)?;
        }
        Ok(aggregator)
    }

    pub fn mode(&self) -> ConsistencyMode {
        self.mode
    }

    /// Apply one signal.
    ///
    /// In lenient mode a violation is logged and counted and `Ok` is returned.
    pub fn apply(&mut self, event: &LifecycleEvent) -> Result<(), ConsistencyViolation> {
        match self.transition(event) {
            Ok(()) => Ok(()),
            Err(violation) => match self.mode {
                ConsistencyMode::Strict => Err(violation),
                ConsistencyMode::Lenient => {
                    warn!(event = event.name(), "Ignoring inconsistent signal: {violation}");
                    self.ignored_signals += 1;
                    Ok(())
                }
            },
        }
    }

    fn transition(&mut self, event: &LifecycleEvent) -> Result<(), ConsistencyViolation> {
        if self.run_result.is_some() {
            return Err(ConsistencyViolation::RunAlreadyFinished { event: event.name() });
        }

        match event {
            LifecycleEvent::TestCasePrepared(test_case) => {
                self.prepared
                    .insert(test_case.pickle_id.clone(), test_case.clone());
                Ok(())
            }
            LifecycleEvent::TestCaseStarted(attempt) => self.start(attempt),
            LifecycleEvent::TestStepAttachment(attachment) => self.attach(attachment),
            LifecycleEvent::TestStepFinished(finished) => self.finish_step(finished),
            LifecycleEvent::TestCaseFinished(finished) => self.finish_case(finished),
            LifecycleEvent::TestRunFinished(result) => {
                debug!(
                    "Test run finished with {} attempts ({} final)",
                    self.attempts.len(),
                    self.final_attempts().len()
                );
                self.run_result = Some(result.clone());
                Ok(())
            }
        }
    }

    fn start(&mut self, attempt: &AttemptRef) -> Result<(), ConsistencyViolation> {
        let test_case = self.prepared.get(&attempt.pickle_id).cloned().ok_or_else(|| {
            ConsistencyViolation::NotPrepared {
                pickle_id: attempt.pickle_id.clone(),
            }
        })?;

        let expected = self.latest_attempt_number(&attempt.pickle_id) + 1;
        if attempt.attempt_number != expected {
            return Err(ConsistencyViolation::UnexpectedAttemptNumber {
                pickle_id: attempt.pickle_id.clone(),
                expected,
                actual: attempt.attempt_number,
            });
        }

        let key = AttemptKey::from(attempt);
        debug!("Started attempt {key}");
        self.attempts.insert(key.clone(), Attempt::open(key, test_case));
        Ok(())
    }

    fn attach(&mut self, attachment: &StepAttachment) -> Result<(), ConsistencyViolation> {
        let attempt = self.open_attempt_mut(&attachment.test_case)?;
        step_phase(attempt, attachment.index)?;
        attempt.steps[attachment.index].attachments.push(AttachmentData {
            data: attachment.data.clone(),
            media_type: attachment.media_type.clone(),
        });
        Ok(())
    }

    fn finish_step(&mut self, finished: &StepFinished) -> Result<(), ConsistencyViolation> {
        let attempt = self.open_attempt_mut(&finished.test_case)?;
        match step_phase(attempt, finished.index)? {
            StepPhase::Finished(_) => Err(ConsistencyViolation::DuplicateStepResult {
                key: attempt.key.clone(),
                index: finished.index,
            }),
            StepPhase::Pending => {
                attempt.steps[finished.index].result = Some(finished.result.clone());
                Ok(())
            }
        }
    }

    fn finish_case(&mut self, finished: &CaseFinished) -> Result<(), ConsistencyViolation> {
        let attempt = self.open_attempt_mut(&finished.test_case)?;
        attempt.result = Some(finished.result.clone());
        debug!(
            "Finished attempt {} with status {} (retried: {})",
            attempt.key, finished.result.status, finished.result.retried
        );
        Ok(())
    }

    /// Started, not yet sealed attempt
    fn open_attempt_mut(&mut self, attempt: &AttemptRef) -> Result<&mut Attempt, ConsistencyViolation> {
        let key = AttemptKey::from(attempt);
        let attempt = self
            .attempts
            .get_mut(&key)
            .ok_or_else(|| ConsistencyViolation::UnknownAttempt { key: key.clone() })?;
        match attempt.phase() {
            AttemptPhase::Started => Ok(attempt),
            AttemptPhase::Finished { .. } => Err(ConsistencyViolation::AttemptSealed { key }),
        }
    }

    fn latest_attempt_number(&self, pickle_id: &str) -> u32 {
        self.attempts_for(pickle_id)
            .next_back()
            .map(|attempt| attempt.key.attempt_number)
            .unwrap_or(0)
    }

    /// All attempts of one pickle, ascending by attempt number
    pub fn attempts_for(&self, pickle_id: &str) -> impl DoubleEndedIterator<Item = &Attempt> {
        let range = AttemptKey::new(pickle_id, 0)..=AttemptKey::new(pickle_id, u32::MAX);
        self.attempts.range(range).map(|(_, attempt)| attempt)
    }

    /// Every attempt, retried ones included
    pub fn attempts(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.values()
    }

    /// The attempt that represents the pickle downstream, if it ever finished without retry
    pub fn final_attempt(&self, pickle_id: &str) -> Option<&Attempt> {
        self.attempts_for(pickle_id).rev().find(|attempt| attempt.is_final())
    }

    /// One final attempt per pickle, ordered by pickle id
    pub fn final_attempts(&self) -> Vec<&Attempt> {
        let mut finals: Vec<&Attempt> = Vec::new();
        for attempt in self.attempts.values().filter(|a| a.is_final()) {
            match finals.last_mut() {
                Some(last) if last.key.pickle_id == attempt.key.pickle_id => *last = attempt,
                _ => finals.push(attempt),
            }
        }
        finals
    }

    pub fn run_result(&self) -> Option<&RunFinished> {
        self.run_result.as_ref()
    }

    pub fn is_run_finished(&self) -> bool {
        self.run_result.is_some()
    }

    pub fn ignored_signals(&self) -> usize {
        self.ignored_signals
    }

    pub fn snapshot(&self) -> AggregateSnapshot {
        AggregateSnapshot {
            attempts: self.attempts.values().cloned().collect(),
            run_result: self.run_result.clone(),
            ignored_signals: self.ignored_signals,
        }
    }
}

fn step_phase(attempt: &Attempt, index: usize) -> Result<StepPhase, ConsistencyViolation> {
    attempt
        .step_phase(index)
        .ok_or_else(|| ConsistencyViolation::StepIndexOutOfRange {
            key: attempt.key.clone(),
            index,
            len: attempt.steps.len(),
        })
}
