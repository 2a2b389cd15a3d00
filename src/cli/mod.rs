//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// BDD execution reporting tool
#[derive(Parser, Debug)]
#[command(name = "bdd-report")]
#[command(version)]
#[command(about = "Filter, order and report on Gherkin scenario runs")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json, json-pretty, csv)
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Directory reported URIs are made relative to
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter and order the pickles of a parser envelope stream
    Plan(PlanArgs),

    /// Build the JSON report tree from a finished run
    Report(RunArgs),

    /// Show step definition usage for a finished run
    Usage(UsageArgs),

    /// Print scenario and step totals for a finished run
    Summary(SummaryArgs),

    /// Print the JSON schema of an output document
    Schema {
        #[arg(value_enum)]
        document: SchemaDocument,
    },

    /// Inspect saved aggregates
    Results(ResultsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Pickle selection and ordering
#[derive(ClapArgs, Debug, Default)]
pub struct SelectionArgs {
    /// Tag expression, e.g. "@smoke and not @wip"
    #[arg(short, long)]
    pub tags: Option<String>,

    /// Scenario name pattern (repeatable; any match accepts)
    #[arg(short, long = "name")]
    pub names: Vec<String>,

    /// Execution order: defined, random or random:<seed>
    #[arg(short, long)]
    pub order: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct PlanArgs {
    /// Parser envelope stream (NDJSON, `-` for stdin)
    pub envelopes: PathBuf,

    /// Feature paths, optionally with line filters (`a.feature:3:10`)
    pub features: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// A parsed suite plus the lifecycle signals of its run
#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Parser envelope stream (NDJSON)
    pub envelopes: PathBuf,

    /// Lifecycle signal stream (NDJSON, `-` for stdin)
    pub lifecycle: PathBuf,

    /// Fail on inconsistent signals instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Persist the raw aggregate to the results directory
    #[arg(long)]
    pub save_aggregate: bool,
}

#[derive(ClapArgs, Debug)]
pub struct UsageArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Registered step definitions (JSON array)
    #[arg(short = 'd', long)]
    pub step_definitions: PathBuf,
}

#[derive(ClapArgs, Debug)]
pub struct SummaryArgs {
    /// Lifecycle signal stream (NDJSON, `-` for stdin)
    pub lifecycle: PathBuf,

    /// Fail on inconsistent signals instead of skipping them
    #[arg(long)]
    pub strict: bool,

    /// Persist the raw aggregate to the results directory
    #[arg(long)]
    pub save_aggregate: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaDocument {
    Report,
    Usage,
}

#[derive(ClapArgs, Debug)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub action: ResultsAction,
}

#[derive(Subcommand, Debug)]
pub enum ResultsAction {
    /// List saved runs, newest first
    List,

    /// Print the summary of a saved run (latest when no id is given)
    Show { id: Option<String> },

    /// Delete a saved run
    Delete { id: String },
}

#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        #[arg(short, long, default_value = "./bdd-report.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variables instead
        #[arg(long)]
        env: bool,
    },

    /// Validate a configuration file
    Validate { file: Option<PathBuf> },

    /// List supported environment variables
    Env,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_args() {
        let args = Args::parse_from([
            "bdd-report",
            "plan",
            "parse.ndjson",
            "features/a.feature:3",
            "--tags",
            "@smoke and not @wip",
            "--name",
            "login",
            "--name",
            "logout",
            "--order",
            "random:42",
            "-vv",
        ]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Plan(plan) => {
                assert_eq!(plan.envelopes, PathBuf::from("parse.ndjson"));
                assert_eq!(plan.features, vec!["features/a.feature:3"]);
                assert_eq!(plan.selection.tags.as_deref(), Some("@smoke and not @wip"));
                assert_eq!(plan.selection.names, vec!["login", "logout"]);
                assert_eq!(plan.selection.order.as_deref(), Some("random:42"));
            }
            _ => panic!("Expected Plan command"),
        }
    }

    #[test]
    fn test_usage_args_with_global_format() {
        let args = Args::parse_from([
            "bdd-report",
            "--format",
            "json",
            "usage",
            "parse.ndjson",
            "run.ndjson",
            "-d",
            "steps.json",
            "--strict",
        ]);
        assert_eq!(args.format.as_deref(), Some("json"));
        match args.command {
            Command::Usage(usage) => {
                assert!(usage.run.strict);
                assert!(!usage.run.save_aggregate);
                assert_eq!(usage.step_definitions, PathBuf::from("steps.json"));
            }
            _ => panic!("Expected Usage command"),
        }
    }

    #[test]
    fn test_schema_and_results_args() {
        let args = Args::parse_from(["bdd-report", "schema", "usage"]);
        assert!(matches!(
            args.command,
            Command::Schema {
                document: SchemaDocument::Usage
            }
        ));

        let args = Args::parse_from(["bdd-report", "results", "show"]);
        match args.command {
            Command::Results(results) => {
                assert!(matches!(results.action, ResultsAction::Show { id: None }))
            }
            _ => panic!("Expected Results command"),
        }
    }
}
