//! Weft CLI - run generation pipelines

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use weft::ast::{Pipeline, PipelineContext};
use weft::config::{mask_api_key, WeftConfig};
use weft::dag::DependencyGraph;
use weft::error::{FixSuggestion, WeftError};
use weft::expansion::KeywordExpander;
use weft::functions::FunctionRegistry;
use weft::runtime::{Runner, TaskState};
use weft::TaskKind;

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft - dynamic DAG scheduler for generation pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline file
    Run {
        /// Path to the pipeline YAML file
        file: PathBuf,

        /// Context bundle (history, user, char, fields) as JSON or YAML
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Override default provider (mock, openai)
        #[arg(short, long)]
        provider: Option<String>,

        /// Override default model
        #[arg(short, long)]
        model: Option<String>,

        /// Print the output of this task instead of the final task
        #[arg(long = "final")]
        final_task: Option<String>,

        /// Entry sets for content expansion (YAML or JSON)
        #[arg(long)]
        entries: Option<PathBuf>,

        /// Print the event log as JSON after the run
        #[arg(long)]
        events: bool,
    },

    /// Validate a pipeline file (parse + dependency analysis)
    Validate {
        /// Path to the pipeline YAML file
        file: PathBuf,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration (keys masked)
    Show,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            context,
            provider,
            model,
            final_task,
            entries,
            events,
        } => {
            let options = RunOptions {
                context,
                provider,
                model,
                final_task,
                entries,
                events,
            };
            run_pipeline(&file, options).await
        }
        Commands::Validate { file } => validate_pipeline(&file).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => show_config(),
        },
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

struct RunOptions {
    context: Option<PathBuf>,
    provider: Option<String>,
    model: Option<String>,
    final_task: Option<String>,
    entries: Option<PathBuf>,
    events: bool,
}

async fn run_pipeline(file: &Path, options: RunOptions) -> Result<(), WeftError> {
    let mut pipeline = Pipeline::from_file(file).await?;
    let config = WeftConfig::load()?.with_env();

    // CLI overrides beat pipeline settings, task settings still win
    if let Some(p) = options.provider {
        pipeline.settings.provider = Some(p);
    }
    if let Some(m) = options.model {
        pipeline.settings.model = Some(m);
    }

    let context = match &options.context {
        Some(path) => PipelineContext::from_file(path).await?,
        None => PipelineContext::default(),
    };

    let effective = pipeline.settings.or(&config.default_settings());
    println!(
        "{} Running pipeline with {} tasks | provider: {} | model: {}",
        "→".cyan(),
        pipeline.enabled_tasks().count(),
        effective.provider.as_deref().unwrap_or("(none)").cyan().bold(),
        effective.model.as_deref().unwrap_or("(default)").cyan()
    );

    let expander = match &options.entries {
        Some(path) => {
            let mut expander = KeywordExpander::new();
            if let Some(depth) = config.expansion.max_depth {
                expander = expander.with_max_depth(depth);
            }
            let expander = expander
                .load_file(path)
                .await
                .map_err(|e| WeftError::ConfigError {
                    reason: format!("{e:#}"),
                })?;
            Some(expander)
        }
        None => None,
    };

    let mut runner = Runner::with_config(pipeline, config)
        .with_context(context)
        .with_functions(FunctionRegistry::new());
    if let Some(expander) = expander {
        runner = runner.with_expander(Arc::new(expander));
    }
    if let Some(task_id) = options.final_task {
        runner = runner.with_final(task_id);
    }

    let result = runner.run().await;

    print_summary(&runner);
    if options.events {
        let events = serde_json::to_string_pretty(&runner.event_log().to_json())?;
        println!("{}", "Events:".cyan().bold());
        println!("{}", events);
    }

    let output = result?;
    println!("{}", "Output:".cyan().bold());
    match output {
        Value::String(text) => println!("{}", text),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

fn print_summary(runner: &Runner) {
    let Some(execution) = runner.execution() else {
        return;
    };
    for (index, batch) in execution.batches().iter().enumerate() {
        let names: Vec<&str> = batch.iter().map(|s| &**s).collect();
        println!("  {} {}", format!("[batch {}]", index).dimmed(), names.join(", "));
    }
    for (id, state) in execution.states() {
        let symbol = match state {
            TaskState::Completed => "✓".green(),
            TaskState::Skipped => "↷".yellow(),
            TaskState::Failed => "✗".red(),
            TaskState::Pending | TaskState::Running => "·".dimmed(),
        };
        println!("  {} {} {}", symbol, id, state.to_string().dimmed());
    }
}

async fn validate_pipeline(file: &Path) -> Result<(), WeftError> {
    let pipeline = Pipeline::from_file(file).await?;
    let enabled: Vec<_> = pipeline.enabled_tasks().cloned().collect();
    let graph = DependencyGraph::build(&enabled);

    println!("{} Pipeline '{}' is valid", "✓".green(), file.display());
    println!("  Schema: {}", pipeline.schema);
    println!(
        "  Tasks: {} ({} enabled)",
        pipeline.tasks.len(),
        enabled.len()
    );
    println!(
        "  Final: {}",
        pipeline.final_task_id().unwrap_or("(none)")
    );

    for (task, dep) in graph.missing_dependencies() {
        println!(
            "  {} '{}' depends on unknown or disabled task '{}' (will stall)",
            "⚠".yellow(),
            task,
            dep
        );
    }

    if let Err(e) = graph.detect_cycles() {
        println!("  {} {} (will stall)", "⚠".yellow(), e);
    }

    let registry = FunctionRegistry::new();
    for task in &enabled {
        if let TaskKind::Function(f) = &task.kind {
            if !registry.has_function(&f.function) {
                println!(
                    "  {} '{}' calls '{}', which is not a built-in function",
                    "⚠".yellow(),
                    task.id,
                    f.function
                );
            }
        }
    }

    Ok(())
}

fn show_config() -> Result<(), WeftError> {
    let config = WeftConfig::load()?.with_env();

    println!("{} {}", "Config:".cyan().bold(), WeftConfig::config_path().display());
    println!(
        "  provider:    {}",
        config.default_provider().unwrap_or("(none)")
    );
    println!(
        "  model:       {}",
        config.defaults.model.as_deref().unwrap_or("(default)")
    );
    if let Some(t) = config.defaults.temperature {
        println!("  temperature: {}", t);
    }
    if let Some(m) = config.defaults.max_tokens {
        println!("  max_tokens:  {}", m);
    }
    println!(
        "  openai key:  {}",
        config
            .openai_key()
            .map(|k| mask_api_key(k, 7))
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!(
        "  base url:    {}",
        config.openai_base_url().unwrap_or("(default)")
    );
    if let Some(depth) = config.expansion.max_depth {
        println!("  max depth:   {}", depth);
    }
    Ok(())
}
