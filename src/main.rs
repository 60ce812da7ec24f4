use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use drivemirror::core::{CheckpointStore, Orchestrator, RunConfig};
use drivemirror::{adapters, config, context, core::hardware::resolve_volumes, logging};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "drivemirror")]
#[command(about = "Resumable, verified backup of removable drives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args, Serialize)]
struct GlobalArgs {
    /// Resolve volumes from the static `mounts` table instead of lsblk
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    simulation: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    json_logs: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up every configured volume, resuming from the last checkpoint
    Run(RunArgs),
    /// Show volume mount status and the current checkpoint
    Status,
    /// Clear the checkpoint so the next run starts from the first volume
    Reset,
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// Walk and report without copying anything
    #[arg(long)]
    dry_run: bool,

    /// Ignore the admission window
    #[arg(long)]
    force: bool,

    /// Maximum parallel copy workers
    #[arg(long)]
    max_workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::AppConfig::new(Some(&cli.global))?;
    logging::init(logging::LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
    });
    config.warn_suspicious();

    match &cli.command {
        Commands::Run(args) => run_backup(config, args).await.context("Backup run failed")?,
        Commands::Status => run_status(&config).context("Failed to read status")?,
        Commands::Reset => run_reset(&config).context("Failed to reset checkpoint")?,
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config).context("Failed to serialize config")?)
        }
    }

    Ok(())
}

async fn run_backup(config: config::AppConfig, args: &RunArgs) -> Result<()> {
    let run = RunConfig {
        dry_run: args.dry_run,
        max_parallel_workers: args.max_workers.unwrap_or(config.max_parallel_workers).max(1),
        force_admission: args.force,
    };

    let ctx = context::AppContext::new(config, run);
    let summary = Orchestrator::new(ctx).run().await?;

    if run.dry_run {
        println!("Dry run complete: {} file(s) simulated", summary.simulated);
    } else {
        println!(
            "Done: {} verified, {} failed across {} director{}",
            summary.verified,
            summary.failed,
            summary.directories_processed,
            if summary.directories_processed == 1 { "y" } else { "ies" }
        );
    }
    Ok(())
}

fn run_status(config: &config::AppConfig) -> Result<()> {
    let checkpoint = CheckpointStore::new(&config.state_file).load()?;
    let resolver = adapters::get_resolver(config.simulation, &config.mounts);
    let volumes = resolve_volumes(resolver.as_ref(), &config.volumes)?;

    println!("Checkpoint: {}", config.state_file.display());
    println!(
        "  volume {} / {}, directory {}",
        checkpoint.volume_index,
        volumes.len(),
        checkpoint.directory_index
    );
    println!("Volumes:");
    for (index, volume) in volumes.iter().enumerate() {
        let marker = if index == checkpoint.volume_index { ">" } else { " " };
        match &volume.mount_path {
            Some(path) => println!("{} {} mounted at {}", marker, volume.id, path.display()),
            None => println!("{} {} not mounted", marker, volume.id),
        }
    }
    Ok(())
}

fn run_reset(config: &config::AppConfig) -> Result<()> {
    CheckpointStore::new(&config.state_file).clear()?;
    println!("Checkpoint cleared: {}", config.state_file.display());
    Ok(())
}
