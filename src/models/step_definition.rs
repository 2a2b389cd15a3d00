//! Registered step definitions
//!
//! The catalog is supplied by the support-code registration stage as a JSON
//! array of [`StepDefinition`] values.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Location;

/// Kind of pattern a step definition was registered with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum PatternType {
    #[serde(alias = "cucumber_expression")]
    CucumberExpression,
    #[serde(alias = "regular_expression")]
    RegularExpression,
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::CucumberExpression => write!(f, "CucumberExpression"),
            PatternType::RegularExpression => write!(f, "RegularExpression"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub pattern: String,
    pub pattern_type: PatternType,
    pub uri: String,
    pub line: u32,
    /// Source text of the step body
    #[serde(default)]
    pub code: String,
}

impl StepDefinition {
    pub fn new(pattern: impl Into<String>, pattern_type: PatternType, uri: impl Into<String>, line: u32) -> Self {
        Self {
            id: None,
            pattern: pattern.into(),
            pattern_type,
            uri: uri.into(),
            line,
            code: String::new(),
        }
    }

    /// Declaring location, the key usage statistics are grouped by
    pub fn location(&self) -> Location {
        Location::new(self.uri.clone(), self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_type_aliases() {
        let json = r#"[{"pattern":"^abc?$","patternType":"regular_expression","uri":"steps.rs","line":1},
                       {"pattern":"def","patternType":"CucumberExpression","uri":"steps.rs","line":2}]"#;
        let defs: Vec<StepDefinition> = serde_json::from_str(json).unwrap();
        assert_eq!(defs[0].pattern_type, PatternType::RegularExpression);
        assert_eq!(defs[1].pattern_type, PatternType::CucumberExpression);
        assert_eq!(defs[1].location().to_string(), "steps.rs:2");
    }
}
