//! CLI entrypoint for mesh-quorum
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod commands;
mod output;
mod simulate;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use commands::{Cli, Command, OutputFormat, QueueAction};
use output::ConsoleFormatter;
use quorum_application::{EventLogger, IntentStore, NoEventLogger, VoteIntentQueue};
use quorum_domain::{ConfigIssue, GatheredCandidate, SelectionRule, fnv1a32_str, validate_write};
use quorum_domain::quorum::select_with_rule;
use quorum_infrastructure::{ConfigLoader, FaultPlan, FileConfig, JsonFileIntentStore, JsonlEventLogger};
use serde_json::{Value, json};
use simulate::SimulationOptions;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting mesh-quorum");

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {e}"))?
    };

    let issues = config.validate();
    if let Command::Config = cli.command {
        return show_config(
            &config,
            &issues,
            cli.config.as_ref(),
            cli.output.unwrap_or(OutputFormat::Text),
        );
    }
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!("{}", issue.message);
    }
    if issues.iter().any(|i| i.is_error()) {
        eprint!("{}", ConsoleFormatter::format_issues(&issues));
        bail!("Configuration is invalid. Run `mesh-quorum config` for details.");
    }

    match cli.command {
        Command::Select { candidates, rule } => {
            let rule = rule
                .map(SelectionRule::from)
                .unwrap_or_else(|| config.gather.parse_selection_rule().0);
            run_select(&candidates, rule, cli.output.unwrap_or(OutputFormat::Json))
        }
        Command::CheckWrite { path, payload } => {
            run_check_write(&path, &payload, cli.output.unwrap_or(OutputFormat::Text))
        }
        Command::Fnv { text } => {
            let hash = fnv1a32_str(&text);
            match cli.output.unwrap_or(OutputFormat::Text) {
                OutputFormat::Text => println!("{hash:08x}"),
                OutputFormat::Json => println!("{}", json!({ "input": text, "fnv1a32": hash })),
            }
            Ok(())
        }
        Command::Queue { action, queue } => run_queue(
            action,
            queue,
            &config,
            cli.output.unwrap_or(OutputFormat::Text),
        ),
        Command::Simulate {
            script,
            peers,
            drop_acks,
            lossy_first_pass,
            shallow_reads,
            contact_after_ms,
        } => {
            let script = match script {
                Some(path) => simulate::load_script(&path)?,
                None => simulate::default_script(),
            };
            let mut faults = FaultPlan::none();
            faults.drop_acks = drop_acks;
            faults.shallow_reads = shallow_reads;
            let options = SimulationOptions {
                peers,
                faults,
                lossy_first_pass,
                contact_after: contact_after_ms.map(Duration::from_millis),
            };

            let report = simulate::run(script, &options, &config, journal(&config)).await?;
            match cli.output.unwrap_or(OutputFormat::Text) {
                OutputFormat::Text => print!("{}", ConsoleFormatter::format_simulation(&report)),
                OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(&report)),
            }
            Ok(())
        }
        Command::Config => Ok(()),
    }
}

/// Install the tracing subscriber. The returned guard flushes the log file
/// on drop and must live until exit.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Initialize logging based on verbosity level
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("--log-file {} does not name a file", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

/// Expand a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// The configured replay journal, or a no-op logger.
fn journal(config: &FileConfig) -> Arc<dyn EventLogger> {
    config
        .queue
        .journal
        .as_deref()
        .map(expand_home)
        .and_then(JsonlEventLogger::new)
        .map(|logger| Arc::new(logger) as Arc<dyn EventLogger>)
        .unwrap_or_else(|| Arc::new(NoEventLogger))
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("reading stdin")?;
        return Ok(input);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn run_select(candidates: &Path, rule: SelectionRule, format: OutputFormat) -> Result<()> {
    let candidates: Vec<GatheredCandidate> = serde_json::from_str(&read_input(candidates)?)
        .context("candidates must be a JSON array of gathered candidates")?;
    for candidate in &candidates {
        candidate
            .validate()
            .map_err(|reason| anyhow!("invalid candidate {}: {reason}", candidate.candidate_id))?;
    }

    let result = select_with_rule(&candidates, rule)?;
    info!(
        selected = %result.selected.candidate_id,
        candidates = candidates.len(),
        rule = %rule,
        "Selected canonical candidate"
    );
    match format {
        OutputFormat::Text => print!("{}", ConsoleFormatter::format_selection(&result)),
        OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(&result)),
    }
    Ok(())
}

fn run_check_write(path: &str, payload: &str, format: OutputFormat) -> Result<()> {
    let payload: Value = serde_json::from_str(payload).context("payload must be valid JSON")?;
    let result = validate_write(path, &payload);

    match format {
        OutputFormat::Text => print!("{}", ConsoleFormatter::format_write_check(path, &result)),
        OutputFormat::Json => {
            let report = match &result {
                Ok(classification) => {
                    json!({ "path": path, "allowed": true, "classification": classification })
                }
                Err(violation) => {
                    json!({ "path": path, "allowed": false, "violation": violation.to_string() })
                }
            };
            println!("{}", ConsoleFormatter::format_json(&report));
        }
    }

    if result.is_err() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_queue(
    action: QueueAction,
    queue: Option<PathBuf>,
    config: &FileConfig,
    format: OutputFormat,
) -> Result<()> {
    let Some(path) = queue.or_else(|| config.queue.path.as_deref().map(expand_home)) else {
        bail!("No queue file. Pass --queue <PATH> or set queue.path in the config.");
    };
    let store: Arc<dyn IntentStore> = Arc::new(JsonFileIntentStore::new(&path));
    let queue = VoteIntentQueue::open(store, config.queue.to_queue_config())
        .with_context(|| format!("opening queue {}", path.display()))?
        .with_logger(journal(config));

    match action {
        QueueAction::List => {
            let pending = queue.pending();
            match format {
                OutputFormat::Text => print!("{}", ConsoleFormatter::format_queue(&pending)),
                OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(&pending)),
            }
        }
        QueueAction::Clear => {
            let removed = queue.clear()?;
            info!(removed, queue = %path.display(), "Cleared intent queue");
            match format {
                OutputFormat::Text => println!("Removed {removed} intent(s)"),
                OutputFormat::Json => println!("{}", json!({ "removed": removed })),
            }
        }
    }
    Ok(())
}

fn show_config(
    config: &FileConfig,
    issues: &[ConfigIssue],
    config_path: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            ConfigLoader::print_config_sources(config_path);
            println!();
            println!("Resolved configuration:");
            println!("{}", toml::to_string_pretty(config).context("rendering configuration")?);
            if issues.is_empty() {
                println!("No configuration issues.");
            } else {
                print!("{}", ConsoleFormatter::format_issues(issues));
            }
        }
        OutputFormat::Json => {
            let issues: Vec<&str> = issues.iter().map(|i| i.message.as_str()).collect();
            println!(
                "{}",
                ConsoleFormatter::format_json(&json!({ "config": config, "issues": issues }))
            );
        }
    }
    Ok(())
}
