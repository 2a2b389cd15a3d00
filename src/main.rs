//! bdd-report - BDD execution reporting tool
//!
//! Consumes the message streams of a Gherkin-based test run and turns
//! them into execution plans, JSON reports, step usage statistics and run
//! summaries.
//!
//! ## Features
//!
//! - Tag expression, name and line filters over parsed pickles
//! - Defined or seeded random execution order
//! - Retry-aware aggregation of lifecycle signals
//! - Report tree, step usage and summary projections (table, JSON, CSV)
//!
//! ## Usage
//!
//! ```bash
//! # Show which scenarios would run, and in which order
//! bdd-report plan parse.ndjson features/login.feature:12 --tags "@smoke and not @wip" --order random
//!
//! # JSON report of a finished run
//! bdd-report report parse.ndjson run.ndjson > report.json
//!
//! # Step definition usage
//! bdd-report usage parse.ndjson run.ndjson --step-definitions steps.json
//!
//! # Totals, saving the aggregate for later
//! bdd-report summary run.ndjson --save-aggregate
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

mod aggregator;
mod cli;
mod config;
mod discovery;
mod filter;
mod input;
mod models;
mod output;
mod results;
mod usage;
mod utils;

use aggregator::{signal_channel, EventAggregator};
use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use discovery::{discover, Catalog, OrderPolicy};
use filter::PickleFilter;
use output::{OutputFormat, PlanEntry, ResultFormatter};
use results::{ResultsStorage, RunSummary, StoredRun};
use utils::{init_logger, LogLevel, Timer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args)?;
    init_logger(LogLevel::from_verbosity(config.log_level()?, args.verbose));

    match args.command {
        cli::Command::Plan(plan_args) => {
            run_plan(config, plan_args).await?;
        }
        cli::Command::Report(run_args) => {
            run_report(config, run_args).await?;
        }
        cli::Command::Usage(usage_args) => {
            run_usage(config, usage_args).await?;
        }
        cli::Command::Summary(summary_args) => {
            run_summary(config, summary_args).await?;
        }
        cli::Command::Schema { document } => {
            print_schema(document)?;
        }
        cli::Command::Results(results_args) => {
            manage_results(&config, results_args)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config, config_args)?;
        }
    }

    Ok(())
}

/// Config file, then environment, then global flags
fn load_config(args: &Args) -> Result<AppConfig> {
    let env = EnvConfig::load();

    let file = match args.config.as_ref().or(env.config_file.as_ref()) {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    let mut config = file.app;
    config.apply_env(&env);

    if let Some(format) = &args.format {
        config.format = OutputFormat::from_str(format)
            .with_context(|| format!("Unknown output format '{format}'"))?;
    }
    if let Some(cwd) = &args.cwd {
        config.cwd = Some(cwd.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Print command output, making sure it ends with a newline
fn emit(output: &str) {
    if output.ends_with('\n') {
        print!("{output}");
    } else {
        println!("{output}");
    }
}

async fn run_plan(mut config: AppConfig, args: cli::PlanArgs) -> Result<()> {
    let selection = args.selection;
    if let Some(tags) = selection.tags {
        config.tags = tags;
    }
    if !selection.names.is_empty() {
        config.names = selection.names;
    }
    if let Some(order) = selection.order {
        config.order = order;
    }
    config.validate()?;

    let cwd = config.working_dir();
    let filter = PickleFilter::new(&config.filter_options(args.features))?;
    debug!("Tag expression: {}", filter.tag_expression());
    let policy = config.order_policy()?;

    let timer = Timer::start("discovery");
    let envelopes = input::read_envelopes(&args.envelopes).await?;
    let discovery = discover(envelopes, &filter, &policy, &cwd)?;
    timer.stop();

    let entries: Vec<PlanEntry<'_>> = discovery
        .accepted_pickles()
        .map(|pickle| PlanEntry::new(&cwd, pickle))
        .collect();

    let formatter = ResultFormatter::new(config.format);
    emit(&formatter.format_plan(
        &entries,
        discovery.seed.as_deref(),
        discovery.rejected_count(),
    )?);
    Ok(())
}

/// Every document and pickle of the envelope stream, in arrival order
async fn load_catalog(config: &AppConfig, path: &Path) -> Result<Catalog> {
    let envelopes = input::read_envelopes(path).await?;
    let discovery = discover(
        envelopes,
        &PickleFilter::accept_all(),
        &OrderPolicy::Defined,
        &config.working_dir(),
    )?;
    Ok(discovery.catalog)
}

/// Stream the lifecycle file through the signal channel into a fresh aggregate
async fn aggregate(config: &AppConfig, lifecycle: PathBuf, strict: bool) -> Result<EventAggregator> {
    let mode = if strict {
        aggregator::ConsistencyMode::Strict
    } else {
        config.consistency_mode()
    };

    let timer = Timer::start("aggregation");
    let (tx, rx) = signal_channel(config.channel_capacity);
    let reader = input::spawn_signal_reader(lifecycle, tx);

    let consumed = EventAggregator::new(mode).consume(rx).await;
    let sent = reader.await.context("Signal reader task failed")??;
    let aggregator = consumed.context("Inconsistent lifecycle signal")?;
    timer.stop();

    info!(
        mode = ?aggregator.mode(),
        "Aggregated {} signals into {} attempts ({} ignored)",
        sent,
        aggregator.attempts().count(),
        aggregator.ignored_signals()
    );
    Ok(aggregator)
}

fn results_storage(config: &AppConfig) -> ResultsStorage {
    match &config.results_dir {
        Some(dir) => ResultsStorage::new(dir),
        None => ResultsStorage::default_dir(),
    }
}

fn save_aggregate(config: &AppConfig, aggregator: &EventAggregator, lifecycle: &Path) -> Result<()> {
    let run = StoredRun::new(aggregator, lifecycle.display().to_string());
    let path = results_storage(config).save(&run)?;
    eprintln!("Saved aggregate {} to {}", run.id, path.display());
    Ok(())
}

async fn run_report(config: AppConfig, args: cli::RunArgs) -> Result<()> {
    let catalog = load_catalog(&config, &args.envelopes).await?;
    let aggregator = aggregate(&config, args.lifecycle.clone(), args.strict).await?;

    let features = results::project(&catalog, &aggregator);
    emit(&ResultFormatter::new(config.format).format_report(&features)?);

    if args.save_aggregate {
        save_aggregate(&config, &aggregator, &args.lifecycle)?;
    }
    Ok(())
}

async fn run_usage(config: AppConfig, args: cli::UsageArgs) -> Result<()> {
    let run = args.run;
    let catalog = load_catalog(&config, &run.envelopes).await?;
    let definitions = input::read_step_definitions(&args.step_definitions).await?;
    let aggregator = aggregate(&config, run.lifecycle.clone(), run.strict).await?;

    let records = usage::get_usage(&config.working_dir(), &definitions, &aggregator, &catalog);
    emit(&ResultFormatter::new(config.format).format_usage(&records)?);

    if run.save_aggregate {
        save_aggregate(&config, &aggregator, &run.lifecycle)?;
    }
    Ok(())
}

async fn run_summary(config: AppConfig, args: cli::SummaryArgs) -> Result<()> {
    let aggregator = aggregate(&config, args.lifecycle.clone(), args.strict).await?;

    let summary = RunSummary::from_aggregate(&aggregator);
    emit(&ResultFormatter::new(config.format).format_summary(&summary)?);

    if args.save_aggregate {
        save_aggregate(&config, &aggregator, &args.lifecycle)?;
    }
    Ok(())
}

fn print_schema(document: cli::SchemaDocument) -> Result<()> {
    let schema = match document {
        cli::SchemaDocument::Report => schemars::schema_for!(Vec<results::FeatureReport>),
        cli::SchemaDocument::Usage => schemars::schema_for!(Vec<usage::UsageRecord>),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn manage_results(config: &AppConfig, args: cli::ResultsArgs) -> Result<()> {
    let storage = results_storage(config);
    let formatter = ResultFormatter::new(config.format);

    match args.action {
        cli::ResultsAction::List => {
            emit(&formatter.format_runs(&storage.list()?)?);
        }
        cli::ResultsAction::Show { id } => {
            let run = match id {
                Some(id) => storage.load(&id)?,
                None => storage.latest()?.with_context(|| {
                    format!("No stored runs in {}", storage.base_dir().display())
                })?,
            };
            if formatter.format() == OutputFormat::Table {
                println!("Run {} ({})", run.id, run.created_at.format("%Y-%m-%d %H:%M:%S"));
                println!("Source: {}\n", run.source);
            }
            emit(&formatter.format_summary(&run.summary)?);
        }
        cli::ResultsAction::Delete { id } => {
            storage.delete(&id)?;
            println!("✓ Deleted run {id}");
        }
    }
    Ok(())
}

fn manage_config(config: AppConfig, args: cli::ConfigArgs) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            ConfigFile::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env } => {
            if env {
                EnvConfig::load().print_summary();
            } else {
                let effective = ConfigFile {
                    app: config,
                    ..ConfigFile::default()
                };
                let output = match effective.app.format {
                    OutputFormat::Json | OutputFormat::JsonPretty => {
                        serde_json::to_string_pretty(&effective)?
                    }
                    _ => serde_yaml::to_string(&effective)?,
                };
                emit(&output);
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(ConfigFile::find)
                .context("No configuration file found")?;

            match ConfigFile::load(&path) {
                Ok(_) => println!("✓ Configuration file is valid: {}", path.display()),
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", path.display());
                    println!("  Error: {e}");
                    return Err(e.into());
                }
            }
        }

        cli::ConfigAction::Env => {
            config::print_env_help();
        }
    }
    Ok(())
}
