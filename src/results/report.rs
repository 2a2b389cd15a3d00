//! JSON report projection
//!
//! Builds the feature → element → step tree consumed by JSON formatters
//! from the final attempts and the parsed documents.

use schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::aggregator::{Attempt, EventAggregator, StepRecord};
use crate::discovery::Catalog;
use crate::models::{
    Feature, Pickle, PickleStep, PickleStepArgument, ScenarioDefinition, Status, Tag, TestStep,
};

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct TagReport {
    pub name: String,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct FeatureReport {
    pub uri: String,
    pub id: String,
    pub keyword: String,
    pub line: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<TagReport>,
    pub elements: Vec<ElementReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ElementReport {
    pub id: String,
    pub keyword: String,
    pub line: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub element_type: String,
    pub tags: Vec<TagReport>,
    pub steps: Vec<StepReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct StepReport {
    pub keyword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    pub arguments: Vec<StepArgument>,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub step_match: Option<MatchReport>,
    pub result: ResultReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeddings: Vec<Embedding>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum StepArgument {
    DocString { line: u32, content: String },
    DataTable { rows: Vec<RowReport> },
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct RowReport {
    pub cells: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct MatchReport {
    pub location: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct ResultReport {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, JsonSchema)]
pub struct Embedding {
    pub data: String,
    pub mime_type: String,
}

/// Lowercase a name and turn every whitespace character into `-`
pub fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Project final attempts onto the parsed documents.
///
/// Features keep document arrival order, elements keep pickle arrival
/// order. Documents without a final attempt are left out.
pub fn project(catalog: &Catalog, aggregator: &EventAggregator) -> Vec<FeatureReport> {
    let finals: Vec<(&Pickle, &Attempt)> = catalog
        .pickles()
        .iter()
        .filter_map(|pickle| aggregator.final_attempt(&pickle.id).map(|a| (pickle, a)))
        .collect();

    for (pickle, _) in &finals {
        let known = catalog
            .document(&pickle.uri)
            .is_some_and(|doc| doc.feature.is_some());
        if !known {
            warn!("Skipping pickle '{}': no parsed feature for {}", pickle.id, pickle.uri);
        }
    }

    let mut features = Vec::new();
    for document in &catalog.documents {
        let Some(feature) = &document.feature else {
            continue;
        };
        let scenarios = feature.scenarios_by_line();
        let keywords = feature.step_keywords_by_line();
        let feature_id = slug(&feature.name);

        let elements: Vec<ElementReport> = finals
            .iter()
            .filter(|(pickle, _)| pickle.uri == document.uri)
            .map(|(pickle, attempt)| {
                project_element(&feature_id, scenarios.get(&pickle.line()).copied(), &keywords, pickle, attempt)
            })
            .collect();

        if elements.is_empty() {
            continue;
        }
        features.push(project_feature(&document.uri, &feature_id, feature, elements));
    }
    features
}

fn project_feature(uri: &str, id: &str, feature: &Feature, elements: Vec<ElementReport>) -> FeatureReport {
    FeatureReport {
        uri: uri.to_string(),
        id: id.to_string(),
        keyword: feature.keyword.clone(),
        line: feature.line,
        name: feature.name.clone(),
        description: non_empty(&feature.description),
        tags: feature.tags.iter().map(tag_report).collect(),
        elements,
    }
}

fn project_element(
    feature_id: &str,
    scenario: Option<&ScenarioDefinition>,
    keywords: &HashMap<u32, &str>,
    pickle: &Pickle,
    attempt: &Attempt,
) -> ElementReport {
    let steps_by_line = pickle.steps_by_line();
    let mut seen_pickle_step = false;
    let steps = attempt
        .step_entries()
        .map(|(test_step, record)| {
            if !test_step.is_hook() {
                seen_pickle_step = true;
            }
            project_step(test_step, record, seen_pickle_step, keywords, &steps_by_line)
        })
        .collect();

    ElementReport {
        id: format!("{feature_id};{}", slug(&pickle.name)),
        keyword: scenario
            .map(|s| s.keyword.clone())
            .unwrap_or_else(|| "Scenario".to_string()),
        line: pickle.line(),
        name: pickle.name.clone(),
        description: scenario.and_then(|s| non_empty(&s.description)),
        element_type: "scenario".to_string(),
        tags: pickle
            .tags
            .iter()
            .map(|t| TagReport {
                name: t.name.clone(),
                line: t.line,
            })
            .collect(),
        steps,
    }
}

fn project_step(
    test_step: &TestStep,
    record: &StepRecord,
    after_pickle_step: bool,
    keywords: &HashMap<u32, &str>,
    steps_by_line: &HashMap<u32, &PickleStep>,
) -> StepReport {
    let result = record.result.clone().unwrap_or_default();
    let error_message = if result.status == Status::Failed {
        result.error_message
    } else {
        None
    };

    let mut step = StepReport {
        keyword: String::new(),
        name: None,
        line: None,
        hidden: None,
        arguments: Vec::new(),
        step_match: test_step.action_location.as_ref().map(|location| MatchReport {
            location: location.to_string(),
        }),
        result: ResultReport {
            status: result.status,
            duration: result.duration.filter(|d| d.is_finite()),
            error_message,
        },
        embeddings: record
            .attachments
            .iter()
            .map(|a| Embedding {
                data: a.data.clone(),
                mime_type: a.media_type.clone(),
            })
            .collect(),
    };

    match &test_step.source_location {
        None => {
            step.keyword = if after_pickle_step { "After" } else { "Before" }.to_string();
            step.hidden = Some(true);
        }
        Some(source) => {
            step.keyword = keywords.get(&source.line).copied().unwrap_or_default().to_string();
            step.line = Some(source.line);
            if let Some(pickle_step) = steps_by_line.get(&source.line) {
                step.name = Some(pickle_step.text.clone());
                step.arguments = pickle_step.argument.iter().map(step_argument).collect();
            }
        }
    }
    step
}

fn step_argument(argument: &PickleStepArgument) -> StepArgument {
    match argument {
        PickleStepArgument::DocString { content, line } => StepArgument::DocString {
            line: *line,
            content: content.clone(),
        },
        PickleStepArgument::DataTable { rows } => StepArgument::DataTable {
            rows: rows.iter().map(|cells| RowReport { cells: cells.clone() }).collect(),
        },
    }
}

fn tag_report(tag: &Tag) -> TagReport {
    TagReport {
        name: tag.name.clone(),
        line: tag.line,
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
