//! Configuration
//!
//! Settings come from a config file, then `BDD_REPORT_*` environment
//! variables, then command-line flags; each layer overrides the previous.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::{ConfigError, ConfigFile};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::aggregator::{ConsistencyMode, DEFAULT_CAPACITY};
use crate::discovery::OrderPolicy;
use crate::filter::{FilterOptions, PickleFilter};
use crate::output::OutputFormat;
use crate::utils::LogLevel;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `defined`, `random` or `random:<seed>`
    pub order: String,

    /// Tag expression; empty accepts every pickle
    pub tags: String,

    /// Name patterns; a pickle must match at least one when any are given
    pub names: Vec<String>,

    /// Fail on inconsistent lifecycle signals instead of skipping them
    pub strict: bool,

    /// Base directory that reported URIs are made relative to
    pub cwd: Option<PathBuf>,

    pub log_level: String,

    pub format: OutputFormat,

    /// Where `--save-aggregate` writes runs; defaults to the user data dir
    pub results_dir: Option<PathBuf>,

    /// Bound of the lifecycle signal channel
    pub channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            order: "defined".to_string(),
            tags: String::new(),
            names: Vec::new(),
            strict: false,
            cwd: None,
            log_level: LogLevel::default().to_string(),
            format: OutputFormat::Table,
            results_dir: None,
            channel_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Check every value that can be wrong before any scenario is looked at
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.order_policy()?;
        self.log_level()?;
        PickleFilter::new(&self.filter_options(Vec::new()))?;
        if self.channel_capacity == 0 {
            return Err(ConfigError::ChannelCapacity);
        }
        Ok(())
    }

    pub fn order_policy(&self) -> Result<OrderPolicy, ConfigError> {
        Ok(self.order.parse()?)
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        LogLevel::from_str(&self.log_level).ok_or_else(|| ConfigError::LogLevel(self.log_level.clone()))
    }

    pub fn consistency_mode(&self) -> ConsistencyMode {
        if self.strict {
            ConsistencyMode::Strict
        } else {
            ConsistencyMode::Lenient
        }
    }

    /// Working directory for relative URIs, the process cwd when unset
    pub fn working_dir(&self) -> PathBuf {
        self.cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default()
    }

    pub fn filter_options(&self, feature_paths: Vec<String>) -> FilterOptions {
        FilterOptions {
            tag_expression: self.tags.clone(),
            names: self.names.clone(),
            feature_paths,
            cwd: self.working_dir(),
        }
    }

    /// Overlay values set in the environment
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(order) = &env.order {
            self.order = order.clone();
        }
        if let Some(tags) = &env.tags {
            self.tags = tags.clone();
        }
        if let Some(names) = &env.names {
            self.names = names.clone();
        }
        if let Some(strict) = env.strict {
            self.strict = strict;
        }
        if let Some(cwd) = &env.cwd {
            self.cwd = Some(cwd.clone());
        }
        if let Some(level) = &env.log_level {
            self.log_level = level.clone();
        }
        if let Some(format) = env.format.as_deref().and_then(OutputFormat::from_str) {
            self.format = format;
        }
        if let Some(dir) = &env.results_dir {
            self.results_dir = Some(dir.clone());
        }
    }
}
