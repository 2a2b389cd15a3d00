//! Pickle acceptance
//!
//! A pickle is accepted when it satisfies all of: the tag expression, at
//! least one name pattern (if any are given) and the line filter of its
//! feature file (if one is given).

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use super::tag_expression::{TagExpression, TagExpressionError};
use crate::models::{relative_uri, Pickle};

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    TagExpression(#[from] TagExpressionError),

    #[error("Invalid name pattern '{pattern}': {source}")]
    NamePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Filter settings as they come from configuration or the command line
#[derive(Clone, Debug, Default)]
pub struct FilterOptions {
    pub tag_expression: String,
    pub names: Vec<String>,
    /// Feature path arguments, optionally suffixed with `:line[:line...]`
    pub feature_paths: Vec<String>,
    pub cwd: PathBuf,
}

#[derive(Clone, Debug)]
pub struct PickleFilter {
    tag_expression: TagExpression,
    name_patterns: Vec<Regex>,
    lines_by_uri: HashMap<String, BTreeSet<u32>>,
    cwd: PathBuf,
}

impl PickleFilter {
    /// Build a filter, failing fast on a malformed tag expression or name pattern
    pub fn new(options: &FilterOptions) -> Result<Self, FilterError> {
        let tag_expression = TagExpression::parse(&options.tag_expression)?;

        let name_patterns = options
            .names
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| FilterError::NamePattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut lines_by_uri: HashMap<String, BTreeSet<u32>> = HashMap::new();
        for path in &options.feature_paths {
            let (file, lines) = split_feature_path(path);
            if !lines.is_empty() {
                lines_by_uri
                    .entry(relative_uri(&options.cwd, file))
                    .or_default()
                    .extend(lines);
            }
        }

        Ok(Self {
            tag_expression,
            name_patterns,
            lines_by_uri,
            cwd: options.cwd.clone(),
        })
    }

    /// Filter accepting every pickle
    pub fn accept_all() -> Self {
        Self {
            tag_expression: TagExpression::True,
            name_patterns: Vec::new(),
            lines_by_uri: HashMap::new(),
            cwd: PathBuf::new(),
        }
    }

    pub fn tag_expression(&self) -> &TagExpression {
        &self.tag_expression
    }

    pub fn matches(&self, pickle: &Pickle) -> bool {
        let accepted = self.matches_tags(pickle) && self.matches_name(pickle) && self.matches_lines(pickle);
        debug!(pickle = %pickle.id, accepted, "Classified pickle");
        accepted
    }

    fn matches_tags(&self, pickle: &Pickle) -> bool {
        self.tag_expression.evaluate(&pickle.tag_names())
    }

    fn matches_name(&self, pickle: &Pickle) -> bool {
        self.name_patterns.is_empty() || self.name_patterns.iter().any(|re| re.is_match(&pickle.name))
    }

    fn matches_lines(&self, pickle: &Pickle) -> bool {
        match self.lines_by_uri.get(&relative_uri(&self.cwd, &pickle.uri)) {
            Some(lines) => pickle.locations.iter().any(|line| lines.contains(line)),
            None => true,
        }
    }
}

/// Split `path:3:10` into the path and its line numbers.
///
/// Only trailing all-digit segments count as lines, so drive letters and
/// colons inside directory names survive.
pub fn split_feature_path(arg: &str) -> (&str, Vec<u32>) {
    let mut path = arg;
    let mut lines = Vec::new();
    while let Some((head, tail)) = path.rsplit_once(':') {
        match tail.parse::<u32>() {
            Ok(line) if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) => {
                lines.push(line);
                path = head;
            }
            _ => break,
        }
    }
    lines.reverse();
    (path, lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::envelope::PickleTag;

    fn pickle(id: &str, uri: &str, name: &str, line: u32, tags: &[&str]) -> Pickle {
        Pickle {
            id: id.to_string(),
            uri: uri.to_string(),
            name: name.to_string(),
            language: "en".to_string(),
            locations: vec![line],
            tags: tags
                .iter()
                .map(|t| PickleTag {
                    name: t.to_string(),
                    line: 1,
                })
                .collect(),
            steps: Vec::new(),
        }
    }

    #[test]
    fn test_split_feature_path() {
        assert_eq!(split_feature_path("a.feature"), ("a.feature", vec![]));
        assert_eq!(split_feature_path("a.feature:3:10"), ("a.feature", vec![3, 10]));
        assert_eq!(split_feature_path(r"C:\f\a.feature:4"), (r"C:\f\a.feature", vec![4]));
    }

    #[test]
    fn test_default_filter_accepts_everything() {
        let filter = PickleFilter::new(&FilterOptions::default()).unwrap();
        assert!(filter.matches(&pickle("1", "a.feature", "x", 2, &["@wip"])));
    }

    #[test]
    fn test_tag_filter() {
        let filter = PickleFilter::new(&FilterOptions {
            tag_expression: "@fast and not @wip".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(filter.matches(&pickle("1", "a.feature", "x", 2, &["@fast"])));
        assert!(!filter.matches(&pickle("2", "a.feature", "x", 2, &["@fast", "@wip"])));
        assert!(!filter.matches(&pickle("3", "a.feature", "x", 2, &[])));
    }

    #[test]
    fn test_name_filter() {
        let filter = PickleFilter::new(&FilterOptions {
            names: vec!["^login".to_string(), "logout$".to_string()],
            ..Default::default()
        })
        .unwrap();
        assert!(filter.matches(&pickle("1", "a.feature", "login works", 2, &[])));
        assert!(filter.matches(&pickle("2", "a.feature", "user can logout", 2, &[])));
        assert!(!filter.matches(&pickle("3", "a.feature", "signup", 2, &[])));
    }

    #[test]
    fn test_line_filter_only_affects_named_files() {
        let filter = PickleFilter::new(&FilterOptions {
            feature_paths: vec!["/w/features/a.feature:4".to_string(), "/w/features/b.feature".to_string()],
            cwd: PathBuf::from("/w"),
            ..Default::default()
        })
        .unwrap();
        assert!(filter.matches(&pickle("1", "features/a.feature", "x", 4, &[])));
        assert!(!filter.matches(&pickle("2", "features/a.feature", "y", 9, &[])));
        assert!(filter.matches(&pickle("3", "features/b.feature", "z", 9, &[])));
    }

    #[test]
    fn test_invalid_configuration_fails_fast() {
        let err = PickleFilter::new(&FilterOptions {
            tag_expression: "@a and".to_string(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, FilterError::TagExpression(_)));

        let err = PickleFilter::new(&FilterOptions {
            names: vec!["(".to_string()],
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, FilterError::NamePattern { .. }));
    }
}
