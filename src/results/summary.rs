//! Run summary
//!
//! Scenario and step totals over final attempts. Hooks and retried
//! attempts never count.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::aggregator::EventAggregator;
use crate::models::Status;
use crate::utils::format_duration;

/// Totals broken down by status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub by_status: HashMap<Status, usize>,
}

impl StatusCounts {
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        *self.by_status.entry(status).or_default() += 1;
    }

    pub fn count(&self, status: Status) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// `" (1 failed, 2 passed)"`, empty when nothing was counted
    fn breakdown(&self) -> String {
        let parts: Vec<String> = Status::summary_order()
            .into_iter()
            .filter_map(|status| match self.count(status) {
                0 => None,
                n => Some(format!("{n} {status}")),
            })
            .collect();
        if parts.is_empty() {
            String::new()
        } else {
            format!(" ({})", parts.join(", "))
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub scenarios: StatusCounts,
    pub steps: StatusCounts,
    /// Milliseconds; the run-finished duration when known, otherwise the sum of attempt durations
    pub duration_ms: f64,
}

impl RunSummary {
    pub fn from_aggregate(aggregator: &EventAggregator) -> Self {
        let mut summary = Self::default();
        let mut attempt_total = 0.0;

        for attempt in aggregator.final_attempts() {
            summary.scenarios.record(attempt.status());
            if let Some(duration) = attempt.result.as_ref().and_then(|r| r.duration) {
                if duration.is_finite() {
                    attempt_total += duration;
                }
            }
            for (test_step, record) in attempt.step_entries() {
                if test_step.is_hook() {
                    continue;
                }
                let status = record.result.as_ref().map(|r| r.status).unwrap_or_default();
                summary.steps.record(status);
            }
        }

        summary.duration_ms = aggregator
            .run_result()
            .and_then(|run| run.duration)
            .filter(|d| d.is_finite())
            .unwrap_or(attempt_total);
        summary
    }

    /// No scenario ended in a status that fails a run
    pub fn is_success(&self) -> bool {
        self.scenarios
            .by_status
            .iter()
            .all(|(status, count)| *count == 0 || status.is_success())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {}{}",
            self.scenarios.total,
            plural("scenario", self.scenarios.total),
            self.scenarios.breakdown()
        )?;
        writeln!(
            f,
            "{} {}{}",
            self.steps.total,
            plural("step", self.steps.total),
            self.steps.breakdown()
        )?;
        writeln!(f, "{}", format_duration(self.duration_ms))
    }
}

fn plural(noun: &str, count: usize) -> String {
    if count == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}
