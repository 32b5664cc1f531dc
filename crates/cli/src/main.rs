mod replay;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use threadline_core::Config;
use threadline_core::logging::{LoggingConfig, init_logging};
use threadline_transcript::{ScrollBehavior, ScrollTarget};

use replay::{Replay, StepReport, parse_script};

/// Threadline - streaming transcript coordinator
#[derive(Parser, Debug)]
#[command(name = "threadline")]
#[command(about = "Replay and inspect streaming chat transcripts", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a threadline config file (default: built-in defaults)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSONL script of stream events and print what the transcript derives
    Replay {
        /// Script file, one event per line
        #[arg(required = true, value_name = "SCRIPT")]
        script: PathBuf,

        /// Treat the first content as a conversation loaded from storage
        #[arg(long)]
        resume: bool,

        /// Print one JSON object per step
        #[arg(long)]
        json: bool,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print an example config with every option
    Example,
    /// Validate a config file
    Check {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { script, resume, json } => {
            let config = load_config(cli.config.as_deref())?;
            cmd_replay(config, &script, resume, json, cli.verbose)?
        }
        Commands::Config { action: ConfigAction::Example } => print!("{}", Config::example()),
        Commands::Config { action: ConfigAction::Check { path } } => cmd_config_check(&path, cli.verbose)?,
    }

    Ok(())
}

/// Load config from `path`, or fall back to defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e)),
        None => Ok(Config::default()),
    }
}

fn cmd_config_check(path: &Path, verbose: bool) -> Result<()> {
    let config = load_config(Some(path))?;
    println!("{} {} is valid", "Success:".green().bold(), path.display());

    if verbose {
        println!(
            "{} transcript debounce {}ms, reasoning debounce {}ms, initial scroll {}",
            "Info:".blue().bold(),
            config.scroll.transcript_debounce_ms,
            config.scroll.reasoning_debounce_ms,
            config.scroll.initial_scroll
        );
        println!("{} delete persisted on retry: {}", "Info:".blue().bold(), config.retry.delete_persisted);
        println!("{} log level {} ({})", "Info:".blue().bold(), config.logging.level, config.logging.format);
    }
    Ok(())
}

fn cmd_replay(config: Config, script: &Path, resume: bool, json: bool, verbose: bool) -> Result<()> {
    let mut logging = LoggingConfig::from(config.logging.clone());
    if verbose {
        logging = logging.with_level("debug");
    }
    let _guard = init_logging(Some(logging)).map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let source =
        std::fs::read_to_string(script).with_context(|| format!("Failed to read script {}", script.display()))?;
    let events = parse_script(&source)?;

    if verbose && !json {
        println!("{} Replaying {} events from {}", "Info:".blue().bold(), events.len(), script.display());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let mut replay = Replay::new(&config, resume);
    let reports = runtime.block_on(replay.run(events))?;

    for report in &reports {
        if json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            print_step(report);
        }
    }
    Ok(())
}

fn flag(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn print_step(report: &StepReport) {
    let policy = &report.policy;
    println!("{} {}", format!("[{:>6}ms]", report.at_ms).dimmed(), report.event.bold());
    println!(
        "           status={} visible={} loading={} reserve={} missing={} tools={} retry={}",
        policy.status,
        policy.visible_count(),
        flag(policy.should_show_loading_indicator),
        flag(policy.should_reserve_loader_min_height),
        flag(policy.is_missing_assistant_response),
        flag(policy.has_active_tool_invocations),
        flag(policy.should_offer_retry()),
    );

    for action in &report.scroll {
        let target = match action.target {
            ScrollTarget::Transcript => "transcript",
            ScrollTarget::Reasoning => "reasoning",
        };
        let behavior = match action.behavior {
            ScrollBehavior::Smooth => "smooth",
            ScrollBehavior::Instant => "instant",
        };
        println!("           {} {} ({})", "scroll".cyan(), target, behavior);
    }
    for note in &report.notes {
        println!("           {} {}", "note".yellow(), note);
    }
}
