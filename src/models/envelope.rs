//! Envelopes emitted by the feature document parser
//!
//! Every line of the parser's output stream is exactly one [`Envelope`]
//! variant. Pickles are the fully expanded scenario instances that get
//! filtered, ordered and executed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One message of the parser output stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Envelope {
    Source(Source),
    GherkinDocument(GherkinDocument),
    Pickle(Pickle),
    Attachment(ParseAttachment),
}

/// Raw feature document text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub uri: String,
    pub data: String,
    #[serde(default)]
    pub media_type: Option<String>,
}

/// Parse diagnostic reported against a source document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseAttachment {
    pub source: SourceReference,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub uri: String,
    #[serde(default)]
    pub line: Option<u32>,
}

/// Parsed structure of a feature document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GherkinDocument {
    pub uri: String,
    #[serde(default)]
    pub feature: Option<Feature>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default = "default_language")]
    pub language: String,
    pub keyword: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub line: u32,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub children: Vec<FeatureChild>,
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureChild {
    Background(ScenarioDefinition),
    Scenario(ScenarioDefinition),
    Rule(Rule),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub keyword: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub line: u32,
    #[serde(default)]
    pub children: Vec<FeatureChild>,
}

/// A scenario, scenario outline or background as written in the document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    pub keyword: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub line: u32,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub keyword: String,
    pub text: String,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub line: u32,
}

impl Feature {
    /// Scenario definitions (not backgrounds) keyed by their line, rules included
    pub fn scenarios_by_line(&self) -> HashMap<u32, &ScenarioDefinition> {
        let mut map = HashMap::new();
        collect_scenarios(&self.children, &mut map);
        map
    }

    /// Step keywords keyed by step line, backgrounds included
    pub fn step_keywords_by_line(&self) -> HashMap<u32, &str> {
        let mut map = HashMap::new();
        collect_step_keywords(&self.children, &mut map);
        map
    }
}

fn collect_scenarios<'a>(children: &'a [FeatureChild], map: &mut HashMap<u32, &'a ScenarioDefinition>) {
    for child in children {
        match child {
            FeatureChild::Scenario(scenario) => {
                map.insert(scenario.line, scenario);
            }
            FeatureChild::Rule(rule) => collect_scenarios(&rule.children, map),
            FeatureChild::Background(_) => {}
        }
    }
}

fn collect_step_keywords<'a>(children: &'a [FeatureChild], map: &mut HashMap<u32, &'a str>) {
    for child in children {
        match child {
            FeatureChild::Background(definition) | FeatureChild::Scenario(definition) => {
                for step in &definition.steps {
                    map.insert(step.line, step.keyword.as_str());
                }
            }
            FeatureChild::Rule(rule) => collect_step_keywords(&rule.children, map),
        }
    }
}

/// A concrete scenario instance with tags and examples already expanded
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pickle {
    pub id: String,
    pub uri: String,
    pub name: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Originating lines; the first is the scenario line, an outline adds its example row
    pub locations: Vec<u32>,
    #[serde(default)]
    pub tags: Vec<PickleTag>,
    #[serde(default)]
    pub steps: Vec<PickleStep>,
}

impl Pickle {
    pub fn line(&self) -> u32 {
        self.locations.first().copied().unwrap_or(0)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    /// Pickle steps keyed by their originating line
    pub fn steps_by_line(&self) -> HashMap<u32, &PickleStep> {
        self.steps.iter().map(|s| (s.line, s)).collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickleTag {
    pub name: String,
    pub line: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickleStep {
    pub id: String,
    pub text: String,
    pub line: u32,
    #[serde(default)]
    pub argument: Option<PickleStepArgument>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PickleStepArgument {
    DocString { content: String, line: u32 },
    DataTable { rows: Vec<Vec<String>> },
}
