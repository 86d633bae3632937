use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use weft_config::{Input, TaskKind, WorkflowConfig};
use weft_normalizer::{Normalizer, Scope};
use weft_store::{ExecutionId, SqliteStore, StateStore, StoreConfig, UsageLedger};

/// Weft - workflow configuration normalizer and execution store
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.weft)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Database URL, overriding the config file
  #[arg(long, global = true, env = "WEFT_DATABASE_URL")]
  database: Option<String>,

  /// Store config file (JSON)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Normalize a workflow against a trigger input read from stdin
  Normalize {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Normalize a workflow, then expand one of its collection tasks
  Expand {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,

    /// The collection task ID to expand
    task_id: String,
  },

  /// Inspect token usage
  Usage {
    #[command(subcommand)]
    command: UsageCommand,
  },

  /// Inspect workflow state
  State {
    #[command(subcommand)]
    command: StateCommand,
  },
}

#[derive(Subcommand)]
enum UsageCommand {
  /// Summarize usage of one or more workflow executions
  Summarize {
    #[arg(required = true)]
    workflow_exec_ids: Vec<String>,
  },
}

#[derive(Subcommand)]
enum StateCommand {
  /// Show a workflow state with its task states
  Show { workflow_exec_id: String },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  match &cli.command {
    Some(Commands::Normalize { workflow_file }) => normalize(workflow_file)?,
    Some(Commands::Expand {
      workflow_file,
      task_id,
    }) => expand(workflow_file, task_id)?,
    Some(Commands::Usage {
      command: UsageCommand::Summarize { workflow_exec_ids },
    }) => {
      let config = store_config(&cli)?;
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(summarize_usage(config, workflow_exec_ids))?;
    }
    Some(Commands::State {
      command: StateCommand::Show { workflow_exec_id },
    }) => {
      let config = store_config(&cli)?;
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(show_state(config, workflow_exec_id))?;
    }
    None => {
      println!("weft - use --help to see available commands");
    }
  }

  Ok(())
}

fn normalize(workflow_file: &Path) -> Result<()> {
  let workflow = read_workflow(workflow_file)?;
  let trigger = read_trigger_from_stdin()?;

  let normalized = Normalizer::new()
    .normalize_workflow(&workflow, &trigger)
    .context("failed to normalize workflow")?;

  println!("{}", serde_json::to_string_pretty(&normalized)?);
  Ok(())
}

fn expand(workflow_file: &Path, task_id: &str) -> Result<()> {
  let workflow = read_workflow(workflow_file)?;
  let trigger = read_trigger_from_stdin()?;

  let normalizer = Normalizer::new();
  let normalized = normalizer
    .normalize_workflow(&workflow, &trigger)
    .context("failed to normalize workflow")?;

  let collection = normalized
    .find_task(task_id)
    .with_context(|| format!("task '{task_id}' not found in workflow"))?;
  if !matches!(collection.kind, TaskKind::Collection { .. }) {
    anyhow::bail!("task '{task_id}' is not a collection");
  }

  let scope = Scope::new(normalized.id.clone(), trigger);
  let instances = normalizer
    .expand_collection(collection, &scope)
    .with_context(|| format!("failed to expand collection '{task_id}'"))?;

  info!(task_id, count = instances.len(), "expanded collection");
  println!("{}", serde_json::to_string_pretty(&instances)?);
  Ok(())
}

async fn summarize_usage(config: StoreConfig, workflow_exec_ids: &[String]) -> Result<()> {
  let store = SqliteStore::connect(&config)
    .await
    .context("failed to open store")?;

  let ids: Vec<ExecutionId> = workflow_exec_ids
    .iter()
    .map(|id| ExecutionId::from(id.as_str()))
    .collect();
  let summaries = store
    .summaries_by_workflow_exec_ids(&ids)
    .await
    .context("failed to summarize usage")?;

  println!("{}", serde_json::to_string_pretty(&summaries)?);
  Ok(())
}

async fn show_state(config: StoreConfig, workflow_exec_id: &str) -> Result<()> {
  let store = SqliteStore::connect(&config)
    .await
    .context("failed to open store")?;

  let state = store
    .get_workflow_state(&ExecutionId::from(workflow_exec_id))
    .await
    .with_context(|| format!("failed to load workflow state {workflow_exec_id}"))?;

  println!("{}", serde_json::to_string_pretty(&state)?);
  Ok(())
}

/// Store settings from `--config`, then `--database`, falling back to a
/// database file in the data directory.
fn store_config(cli: &Cli) -> Result<StoreConfig> {
  let mut config = match &cli.config {
    Some(path) => {
      let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?
    }
    None => {
      let data_dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => dirs::home_dir()
          .context("could not determine home directory")?
          .join(".weft"),
      };
      std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir: {}", data_dir.display()))?;
      StoreConfig::for_path(data_dir.join("weft.db"))
    }
  };

  if let Some(url) = &cli.database {
    config.database_url = url.clone();
  }
  Ok(config)
}

fn read_workflow(workflow_file: &Path) -> Result<WorkflowConfig> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))
}

fn read_trigger_from_stdin() -> Result<Input> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(Input::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read trigger input from stdin")?;

  if input.trim().is_empty() {
    Ok(Input::new())
  } else {
    serde_json::from_str(&input).context("failed to parse trigger input JSON from stdin")
  }
}
