use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use replicator::config::Config;
use replicator::executor::CommandWorkload;
use replicator::feedback::reporter_for;
use replicator::manager::{ReplicationManager, TaskSummary};
use replicator::options::OptionGenerator;
use replicator::plan::Plan;
use replicator::scheduler::ExecutionAdapter;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("replicator")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("replicator.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Pipe(target));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    match &cli.command {
        Commands::Run { plan, task } => handle_run_command(plan, task.as_deref(), config).await,
        Commands::Options { plan, task } => handle_options_command(plan, task.as_deref()).await,
        Commands::Config => handle_config_command(config),
    }
}

async fn handle_run_command(plan_path: &Path, only: Option<&str>, config: &Config) -> Result<()> {
    let plan = Plan::load(plan_path).context(format!("Failed to load plan {}", plan_path.display()))?;
    let tasks = plan.select(only)?;
    let generator = Arc::new(plan.option_generator()?);
    let reporter = reporter_for(&config.reporter).context("Failed to create failure reporter")?;

    let manager = ReplicationManager::new(config, generator, Arc::new(CommandWorkload::new()), reporter);
    info!("Running {} task(s) from {}", tasks.len(), plan_path.display());

    let mut failed = Vec::new();
    for plan_task in tasks {
        let task = plan_task.task_config();
        if task.command.is_none() {
            println!("{} {} has no command, skipping", "Skipped:".yellow(), task.id);
            continue;
        }

        println!(
            "{} {} ({} replications)",
            "Running:".cyan(),
            task.id,
            plan_task.replications
        );
        match manager.run_task(&task, plan_task.replications).await {
            Ok(summary) => print_summary(&summary),
            Err(e) => {
                println!("{} {}: {}", "Failed:".red(), task.id, e);
                failed.push(task.id.to_string());
            }
        }
    }

    let dropped = manager.dropped_reports();
    manager.shutdown().await;
    if dropped > 0 {
        println!("{} {} failure report(s) dropped", "Warning:".yellow(), dropped);
    }

    if !failed.is_empty() {
        eyre::bail!("{} task(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn print_summary(summary: &TaskSummary) {
    let state = if summary.exhausted() {
        summary.state.to_string().red()
    } else {
        summary.state.to_string().green()
    };
    println!(
        "  {} dispatched {}/{}, state {}",
        summary.task, summary.dispatched, summary.requested, state
    );

    let Some(snapshot) = &summary.snapshot else {
        return;
    };
    println!(
        "  {:>4}  {:<32} {:>6} {:>8} {:>12}",
        "#", "option", "reps", "failed", "mean cost"
    );
    let best = snapshot.best_option().map(|o| o.index);
    for option in &snapshot.options {
        let mean = option
            .mean_cost
            .map(|m| format!("{:.4}", m))
            .unwrap_or_else(|| "-".to_string());
        let line = format!(
            "  {:>4}  {:<32} {:>6} {:>8} {:>12}",
            option.index, option.name, option.replications, option.failures, mean
        );
        if option.quarantined {
            println!("{}", line.red());
        } else if best == Some(option.index) {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line);
        }
    }
}

async fn handle_options_command(plan_path: &Path, only: Option<&str>) -> Result<()> {
    let plan = Plan::load(plan_path).context(format!("Failed to load plan {}", plan_path.display()))?;
    let generator = plan.option_generator()?;
    let adapter = ExecutionAdapter::new();

    for plan_task in plan.select(only)? {
        let task = plan_task.task_config();
        let options = generator.generate(&task).await?;
        println!("{} {} ({} options)", "Task:".cyan(), task.id, options.len());
        for (index, option) in options.iter().enumerate() {
            let params = adapter.adapt(&task.baseline, option);
            println!("  {:>3} {}", index, option.name.bold());
            if !option.factories.is_empty() {
                println!("      factories: {}", option.factories.join(", "));
            }
            println!("      params: {}", params.to_json()?);
        }
    }
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
