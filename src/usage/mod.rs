//! Step definition usage statistics
//!
//! Builds one [`UsageRecord`] per registered step definition and fills it
//! with every step of a final attempt whose action location points at that
//! definition. Matches are ranked slowest first, records by mean duration.

use schemars::JsonSchema;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::aggregator::EventAggregator;
use crate::discovery::Catalog;
use crate::models::{relative_uri, PatternType, StepDefinition};

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct UsageMatch {
    pub line: u32,
    pub text: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub pattern: String,
    pub pattern_type: PatternType,
    pub line: u32,
    pub uri: String,
    pub code: String,
    pub matches: Vec<UsageMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_duration: Option<f64>,
}

impl UsageRecord {
    fn empty(definition: &StepDefinition) -> Self {
        Self {
            pattern: definition.pattern.clone(),
            pattern_type: definition.pattern_type,
            line: definition.line,
            uri: definition.uri.clone(),
            code: definition.code.clone(),
            matches: Vec::new(),
            mean_duration: None,
        }
    }

    pub fn is_unused(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn display_pattern(&self) -> String {
        match self.pattern_type {
            PatternType::RegularExpression => format!("/{}/", self.pattern),
            PatternType::CucumberExpression => self.pattern.clone(),
        }
    }
}

/// Compute usage for `step_definitions` from the final attempts in `aggregator`
pub fn get_usage(
    cwd: &Path,
    step_definitions: &[StepDefinition],
    aggregator: &EventAggregator,
    catalog: &Catalog,
) -> Vec<UsageRecord> {
    let mut records: Vec<UsageRecord> = Vec::with_capacity(step_definitions.len());
    let mut by_location: HashMap<String, usize> = HashMap::new();

    for definition in step_definitions {
        let location = definition.location().to_string();
        match by_location.get(&location) {
            Some(&i) => records[i] = UsageRecord::empty(definition),
            None => {
                by_location.insert(location, records.len());
                records.push(UsageRecord::empty(definition));
            }
        }
    }

    for attempt in aggregator.final_attempts() {
        let Some(pickle) = catalog.pickle(&attempt.key.pickle_id) else {
            warn!("No pickle '{}' for attempt {}", attempt.key.pickle_id, attempt.key);
            continue;
        };
        let steps_by_line = pickle.steps_by_line();

        for (test_step, record) in attempt.step_entries() {
            let (Some(source), Some(action)) = (&test_step.source_location, &test_step.action_location) else {
                continue;
            };
            let Some(&index) = by_location.get(&action.to_string()) else {
                debug!("Step at {source} matched unregistered definition {action}");
                continue;
            };
            let Some(pickle_step) = steps_by_line.get(&source.line) else {
                warn!("Pickle '{}' has no step at line {}", pickle.id, source.line);
                continue;
            };

            let duration = record
                .result
                .as_ref()
                .and_then(|r| r.duration)
                .filter(|d| d.is_finite());

            records[index].matches.push(UsageMatch {
                line: source.line,
                text: pickle_step.text.clone(),
                uri: relative_uri(cwd, &source.uri),
                duration,
            });
        }
    }

    for record in &mut records {
        record.matches.sort_by(compare_matches);
        record.mean_duration = mean_duration(&record.matches);
    }
    records.sort_by(|a, b| {
        descending_present_first(a.mean_duration, b.mean_duration)
            .then_with(|| a.is_unused().cmp(&b.is_unused()))
    });
    records
}

fn mean_duration(matches: &[UsageMatch]) -> Option<f64> {
    let durations: Vec<f64> = matches.iter().filter_map(|m| m.duration).collect();
    if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    }
}

fn compare_matches(a: &UsageMatch, b: &UsageMatch) -> Ordering {
    descending_present_first(a.duration, b.duration).then_with(|| a.text.cmp(&b.text))
}

/// Larger values first, missing values after every present one
fn descending_present_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
