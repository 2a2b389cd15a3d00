//! Environment variable overrides

use std::env;
use std::path::PathBuf;

const ENV_PREFIX: &str = "BDD_REPORT";

/// Values read from `BDD_REPORT_*` variables; unset variables stay `None`
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// BDD_REPORT_ORDER
    pub order: Option<String>,
    /// BDD_REPORT_TAGS
    pub tags: Option<String>,
    /// BDD_REPORT_NAMES, comma separated
    pub names: Option<Vec<String>>,
    /// BDD_REPORT_STRICT
    pub strict: Option<bool>,
    /// BDD_REPORT_CWD
    pub cwd: Option<PathBuf>,
    /// BDD_REPORT_LOG
    pub log_level: Option<String>,
    /// BDD_REPORT_FORMAT
    pub format: Option<String>,
    /// BDD_REPORT_RESULTS_DIR
    pub results_dir: Option<PathBuf>,
    /// BDD_REPORT_CONFIG
    pub config_file: Option<PathBuf>,
}

impl EnvConfig {
    pub fn load() -> Self {
        Self {
            order: get_env("ORDER"),
            tags: get_env("TAGS"),
            names: get_env("NAMES").map(|v| split_list(&v)),
            strict: get_env_bool("STRICT"),
            cwd: get_env("CWD").map(PathBuf::from),
            log_level: get_env("LOG"),
            format: get_env("FORMAT"),
            results_dir: get_env("RESULTS_DIR").map(PathBuf::from),
            config_file: get_env("CONFIG").map(PathBuf::from),
        }
    }

    pub fn has_any(&self) -> bool {
        self.order.is_some()
            || self.tags.is_some()
            || self.names.is_some()
            || self.strict.is_some()
            || self.cwd.is_some()
            || self.log_level.is_some()
            || self.format.is_some()
            || self.results_dir.is_some()
            || self.config_file.is_some()
    }

    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        if !self.has_any() {
            println!("  (no {ENV_PREFIX}_* variables set)");
            return;
        }
        println!("  {ENV_PREFIX}_ORDER:       {:?}", self.order);
        println!("  {ENV_PREFIX}_TAGS:        {:?}", self.tags);
        println!("  {ENV_PREFIX}_NAMES:       {:?}", self.names);
        println!("  {ENV_PREFIX}_STRICT:      {:?}", self.strict);
        println!("  {ENV_PREFIX}_CWD:         {:?}", self.cwd);
        println!("  {ENV_PREFIX}_LOG:         {:?}", self.log_level);
        println!("  {ENV_PREFIX}_FORMAT:      {:?}", self.format);
        println!("  {ENV_PREFIX}_RESULTS_DIR: {:?}", self.results_dir);
        println!("  {ENV_PREFIX}_CONFIG:      {:?}", self.config_file);
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_ORDER        Execution order (defined, random, random:<seed>)");
    println!("  {ENV_PREFIX}_TAGS         Tag expression, e.g. \"@smoke and not @wip\"");
    println!("  {ENV_PREFIX}_NAMES        Comma separated scenario name patterns");
    println!("  {ENV_PREFIX}_STRICT       Fail on inconsistent lifecycle signals (true/false)");
    println!("  {ENV_PREFIX}_CWD          Directory reported URIs are relative to");
    println!("  {ENV_PREFIX}_LOG          Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_FORMAT       Output format (table, json, json-pretty, csv)");
    println!("  {ENV_PREFIX}_RESULTS_DIR  Directory for saved aggregates");
    println!("  {ENV_PREFIX}_CONFIG       Path to configuration file");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_ORDER=random:42");
    println!("  bdd-report plan features.ndjson");
}
