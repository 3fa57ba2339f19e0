use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use attest_config::Config;
use attest_lifecycle::{Extension, LifecycleBuilder, RunnerEvent, StaticMetadata};
use attest_reporter::{JsonResultWriter, RunSummary, render_summary};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use log::info;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay newline-delimited runner events into a report directory
    Replay(ReplayArgs),
}

#[derive(Args)]
struct ReplayArgs {
    /// File with one JSON runner event per line
    events: PathBuf,
    /// TOML manifest of class and method metadata
    #[arg(long)]
    metadata: Option<PathBuf>,
    /// Config file; defaults to attest.toml in the working directory
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured output directory
    #[arg(long)]
    output: Option<PathBuf>,
}

fn load_config(args: &ReplayArgs) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&env::current_dir()?)?,
    };
    if let Some(output) = &args.output {
        config.output_directory.clone_from(output);
    }
    Ok(config)
}

fn read_events(path: &Path) -> anyhow::Result<Vec<(usize, RunnerEvent)>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read events from {}", path.display()))?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| -> anyhow::Result<(usize, RunnerEvent)> {
            let event = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid event", path.display(), index + 1))?;
            Ok((index + 1, event))
        })
        .collect()
}

fn run_replay(args: &ReplayArgs) -> anyhow::Result<(RunSummary, PathBuf)> {
    let config = load_config(args)?;
    let metadata = match &args.metadata {
        Some(path) => StaticMetadata::load(path)
            .with_context(|| format!("failed to load metadata from {}", path.display()))?,
        None => StaticMetadata::new(),
    };
    let events = read_events(&args.events)?;

    let output_directory = config.output_directory.clone();
    let writer = JsonResultWriter::new(&output_directory);
    let lifecycle = LifecycleBuilder::new(config, writer.clone())
        .metadata(metadata)
        .on_setup(|config| info!("writing results to {}", config.output_directory.display()))
        .build();

    let mut extension = Extension::new(lifecycle);
    for (line, event) in &events {
        extension
            .handle(event)
            .with_context(|| format!("{}:{line}: reporting failed", args.events.display()))?;
    }
    Ok((writer.summary(), output_directory))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    match &cli.command {
        Commands::Replay(args) => {
            let (summary, output_directory) = run_replay(args)?;
            render_summary(&mut io::stdout().lock(), &summary, &output_directory)?;
        }
    }
    Ok(())
}
