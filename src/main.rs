use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use careflow_engine::{Dispatcher, EngineConfig, EngineError, WorkflowEngine};
use careflow_registry::{EchoHandler, HandlerRegistry};
use careflow_store::{SqliteStore, WorkflowStore};
use careflow_validator::{IssueSummary, validate};
use careflow_workflow::{IncomingEvent, Workflow};

/// Careflow - visual workflow automation for care coordination
#[derive(Parser)]
#[command(name = "careflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.careflow)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Engine configuration file (JSON)
  #[arg(long, global = true)]
  engine_config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Check a workflow file for structural problems
  Validate {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Run a workflow file once against an event read from stdin
  Run {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Save a workflow file into the store
  Import {
    /// Path to the workflow file (JSON)
    workflow_file: PathBuf,
  },

  /// Validate a stored workflow and mark it active
  Activate { workflow_id: String },

  /// Mark a stored workflow inactive
  Deactivate { workflow_id: String },

  /// Dispatch an event read from stdin to every active workflow
  Dispatch,

  /// Print the recorded runs of a workflow
  Runs { workflow_id: String },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("careflow=info")),
    )
    .with_writer(io::stderr)
    .init();

  let Some(command) = cli.command else {
    println!("careflow - use --help to see available commands");
    return Ok(());
  };

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".careflow"),
  };
  let config = load_engine_config(cli.engine_config.as_deref())?;

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Validate { workflow_file } => validate_workflow(&workflow_file),
      Commands::Run { workflow_file } => run_workflow(&workflow_file, config).await,
      Commands::Import { workflow_file } => import_workflow(&workflow_file, &data_dir).await,
      Commands::Activate { workflow_id } => {
        let dispatcher = open_dispatcher(&data_dir, config).await?;
        let workflow = dispatcher
          .activate(&workflow_id)
          .await
          .with_context(|| format!("failed to activate workflow '{}'", workflow_id))?;
        eprintln!("Activated workflow: {} (v{})", workflow.id, workflow.version);
        Ok(())
      }
      Commands::Deactivate { workflow_id } => {
        let dispatcher = open_dispatcher(&data_dir, config).await?;
        dispatcher
          .deactivate(&workflow_id)
          .await
          .with_context(|| format!("failed to deactivate workflow '{}'", workflow_id))?;
        eprintln!("Deactivated workflow: {}", workflow_id);
        Ok(())
      }
      Commands::Dispatch => dispatch_event(&data_dir, config).await,
      Commands::Runs { workflow_id } => list_runs(&workflow_id, &data_dir).await,
    }
  })
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
  let Some(path) = path else {
    return Ok(EngineConfig::default());
  };
  let content = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read engine config: {}", path.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse engine config: {}", path.display()))
}

fn load_workflow(workflow_file: &Path) -> Result<Workflow> {
  let content = std::fs::read_to_string(workflow_file)
    .with_context(|| format!("failed to read workflow file: {}", workflow_file.display()))?;
  Workflow::from_json(&content)
    .with_context(|| format!("failed to parse workflow file: {}", workflow_file.display()))
}

fn parse_event(input: &str) -> Result<IncomingEvent> {
  serde_json::from_str(input)
    .context("failed to parse event: expected eventType, or hour and schedule")
}

fn read_event_from_stdin() -> Result<IncomingEvent> {
  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read event from stdin")?;
  parse_event(&input)
}

/// Handlers for the CLI: every action kind echoes its rendered configuration.
fn echo_registry() -> Arc<HandlerRegistry> {
  Arc::new(HandlerRegistry::new().with_fallback(EchoHandler))
}

async fn open_store(data_dir: &Path) -> Result<Arc<SqliteStore>> {
  tokio::fs::create_dir_all(data_dir)
    .await
    .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
  let db_path = data_dir.join("careflow.db");
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store: {}", db_path.display()))?;
  Ok(Arc::new(store))
}

async fn open_dispatcher(data_dir: &Path, config: EngineConfig) -> Result<Dispatcher> {
  let store = open_store(data_dir).await?;
  let engine = WorkflowEngine::new(echo_registry(), config);
  Ok(Dispatcher::new(Arc::new(engine), store))
}

fn validate_workflow(workflow_file: &Path) -> Result<()> {
  let workflow = load_workflow(workflow_file)?;
  let issues = validate(&workflow);

  for issue in &issues {
    println!("{}", issue);
  }

  let summary = IssueSummary::from_issues(&issues);
  eprintln!(
    "{}: {} error(s), {} warning(s), {} info",
    workflow.id, summary.error_count, summary.warning_count, summary.info_count
  );

  if summary.error_count > 0 {
    bail!("workflow '{}' is not valid", workflow.id);
  }
  Ok(())
}

async fn run_workflow(workflow_file: &Path, config: EngineConfig) -> Result<()> {
  let mut workflow = load_workflow(workflow_file)?;
  eprintln!("Loaded workflow: {}", workflow.name);

  let errors: Vec<String> = validate(&workflow)
    .into_iter()
    .filter(|issue| issue.is_error())
    .map(|issue| issue.to_string())
    .collect();
  if !errors.is_empty() {
    bail!("workflow '{}' is not valid:\n{}", workflow.id, errors.join("\n"));
  }
  // A file run is an ad hoc activation.
  workflow.is_active = true;

  let event = read_event_from_stdin()?;
  eprintln!("Event: {}", event.describe());

  let engine = WorkflowEngine::new(echo_registry(), config);
  let outcome = engine.run(&workflow, &event, CancellationToken::new()).await;

  eprintln!("Run {}: {}", outcome.run_id, outcome.status);
  println!("{}", serde_json::to_string_pretty(&outcome)?);
  Ok(())
}

async fn import_workflow(workflow_file: &Path, data_dir: &Path) -> Result<()> {
  let workflow = load_workflow(workflow_file)?;
  let store = open_store(data_dir).await?;
  store
    .save_workflow(&workflow)
    .await
    .with_context(|| format!("failed to save workflow '{}'", workflow.id))?;
  eprintln!(
    "Imported workflow: {} (v{}), inactive until activated",
    workflow.id, workflow.version
  );
  Ok(())
}

async fn dispatch_event(data_dir: &Path, config: EngineConfig) -> Result<()> {
  let event = read_event_from_stdin()?;
  let dispatcher = open_dispatcher(data_dir, config).await?;

  let outcomes = match dispatcher.dispatch(&event, CancellationToken::new()).await {
    Ok(outcomes) => outcomes,
    Err(EngineError::Persist { run_ids, outcomes }) => {
      println!("{}", serde_json::to_string_pretty(&outcomes)?);
      bail!("ran {} workflow(s) but failed to record: {}", outcomes.len(), run_ids.join(", "));
    }
    Err(e) => {
      return Err(e).with_context(|| format!("failed to dispatch event '{}'", event.describe()));
    }
  };

  eprintln!("Dispatched {} to {} workflow(s)", event.describe(), outcomes.len());
  println!("{}", serde_json::to_string_pretty(&outcomes)?);
  Ok(())
}

async fn list_runs(workflow_id: &str, data_dir: &Path) -> Result<()> {
  let store = open_store(data_dir).await?;
  let runs = store
    .list_runs(workflow_id)
    .await
    .with_context(|| format!("failed to list runs of '{}'", workflow_id))?;
  println!("{}", serde_json::to_string_pretty(&runs)?);
  Ok(())
}
