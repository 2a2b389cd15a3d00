//! Source and action locations
//!
//! A location ties a test step either to a line of a feature document or to
//! the declaration of a step definition / hook body.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A `uri:line` pair
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub uri: String,
    pub line: u32,
}

impl Location {
    pub fn new(uri: impl Into<String>, line: u32) -> Self {
        Self {
            uri: uri.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uri, self.line)
    }
}

/// Express `uri` relative to `cwd` when it lives below it.
///
/// URIs outside `cwd` (or already relative) are returned unchanged.
pub fn relative_uri(cwd: &Path, uri: &str) -> String {
    let path = Path::new(uri);
    match path.strip_prefix(cwd) {
        Ok(rel) if !cwd.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
        _ => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("steps.rs", 10).to_string(), "steps.rs:10");
    }

    #[test]
    fn test_relative_uri() {
        let cwd = Path::new("/work/project");
        assert_eq!(
            relative_uri(cwd, "/work/project/features/a.feature"),
            "features/a.feature"
        );
        assert_eq!(relative_uri(cwd, "/elsewhere/a.feature"), "/elsewhere/a.feature");
        assert_eq!(relative_uri(Path::new(""), "a.feature"), "a.feature");
    }
}
