mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::actions::ActionRegistry;
use crate::api::DEFAULT_MAX_BODY;
use crate::engine::types::{ExecutionStatus, TaskStatus, WorkflowDefinition, WorkflowExport};
use crate::engine::{EngineConfig, WorkflowEngine, topological_sort};

pub use config::{DEFAULT_CONFIG_FILE, TaskflowConfig, load_export, workflow_files};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(Parser)]
#[command(name = "taskflow", version, about = "DAG workflow orchestration engine")]
pub struct Cli {
    /// Path to a .env file to load (default: auto-detect .env in cwd)
    #[arg(long, global = true)]
    dotenv: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server
    Serve {
        /// Host to bind to
        #[arg(long, env = "HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,

        /// Maximum request body size in bytes (default: 1048576 = 1 MB)
        #[arg(long, env = "MAX_BODY")]
        max_body: Option<usize>,

        /// Analytics cache TTL in seconds (0 disables caching)
        #[arg(long, env = "CACHE_TTL")]
        cache_ttl: Option<u64>,

        /// Directory of exported workflow files to import at startup
        #[arg(long, env = "WORKFLOWS_DIR")]
        workflows_dir: Option<PathBuf>,

        /// Path to the YAML config file (default: auto-detect taskflow.yaml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Import an exported workflow file and execute it once
    Run {
        /// Path to the workflow file (.json, .yaml or .yml)
        file: PathBuf,

        /// Print task outputs
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check a workflow file without executing it
    Validate {
        /// Path to the workflow file (.json, .yaml or .yml)
        file: PathBuf,
    },

    /// List available actions
    Actions,
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    load_dotenv(cli.dotenv.as_deref());

    match cli.command {
        Commands::Serve {
            host,
            port,
            max_body,
            cache_ttl,
            workflows_dir,
            config,
        } => {
            let file = TaskflowConfig::load(config.as_deref())?;
            let host = host.or(file.host).unwrap_or_else(|| DEFAULT_HOST.to_string());
            let port = port.or(file.port).unwrap_or(DEFAULT_PORT);
            let max_body = max_body.or(file.max_body).unwrap_or(DEFAULT_MAX_BODY);
            let engine_config = match cache_ttl.or(file.cache_ttl_seconds) {
                Some(secs) => EngineConfig {
                    cache_ttl: Duration::from_secs(secs),
                },
                None => EngineConfig::default(),
            };

            let engine = Arc::new(WorkflowEngine::new(
                Arc::new(ActionRegistry::with_builtins()),
                engine_config,
            ));
            if let Some(dir) = workflows_dir.or(file.workflows_dir) {
                import_dir(&engine, &dir)?;
            }

            crate::api::serve(&host, port, max_body, engine).await
        }
        Commands::Run { file, verbose } => cmd_run(&file, verbose),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Actions => cmd_actions(),
    }
}

/// Load environment variables from a .env file.
/// If an explicit path is given, load from that path (warn if missing).
/// Otherwise, auto-detect .env in the current working directory (silently skip if absent).
fn load_dotenv(explicit_path: Option<&Path>) {
    match explicit_path {
        Some(path) => match dotenvy::from_path(path) {
            Ok(()) => info!("Loaded env from {}", path.display()),
            Err(e) => {
                eprintln!(
                    "Warning: Failed to load dotenv file '{}': {}",
                    path.display(),
                    e
                );
            }
        },
        None => match dotenvy::dotenv() {
            Ok(path) => info!("Loaded env from {}", path.display()),
            Err(dotenvy::Error::Io(_)) => {}
            Err(e) => {
                eprintln!("Warning: Failed to parse .env file: {}", e);
            }
        },
    }
}

/// Import every workflow file in `dir`. A file that fails to import is
/// logged and skipped.
pub fn import_dir(engine: &WorkflowEngine, dir: &Path) -> Result<usize> {
    let mut imported = 0;
    for path in workflow_files(dir)? {
        let result = load_export(&path).and_then(|export| {
            engine
                .import_workflow(export)
                .map_err(anyhow::Error::from)
        });
        match result {
            Ok(workflow) => {
                info!(workflow_id = %workflow.id, file = %path.display(), "Imported workflow");
                imported += 1;
            }
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(file = %path.display(), error = %error, "Skipped workflow file");
            }
        }
    }
    Ok(imported)
}

fn cmd_run(file: &Path, verbose: bool) -> Result<()> {
    let engine = WorkflowEngine::with_builtins();
    let export = load_export(file)?;
    let workflow = engine
        .import_workflow(export)
        .with_context(|| format!("Failed to import workflow: {}", file.display()))?;

    println!("Workflow: {} ({} tasks)", workflow.name, workflow.tasks.len());

    let execution = engine.execute_workflow(&workflow.id, "cli")?;

    println!("\nExecution ID: {}", execution.id);
    println!("Status: {}", execution.status);

    println!("\nTasks:");
    for result in &execution.task_results {
        let icon = match result.status {
            TaskStatus::Completed => "✓",
            TaskStatus::Failed => "✗",
        };
        let name = workflow
            .tasks
            .iter()
            .find(|t| t.id == result.task_id)
            .map_or(result.task_id.as_str(), |t| t.name.as_str());
        println!("  {} {} ({}ms)", icon, name, result.duration_ms);
        if let Some(ref err) = result.error {
            println!("    Error: {}", err);
        }
        if verbose && !result.output.is_empty() {
            println!("    Output: {}", serde_json::to_string(&result.output)?);
        }
    }

    if execution.status == ExecutionStatus::Failed {
        anyhow::bail!("Workflow '{}' failed", workflow.name);
    }
    Ok(())
}

/// Outcome of checking an exported workflow without running it.
pub struct ValidationReport {
    pub workflow: WorkflowDefinition,
    /// Task ids in execution order; empty when the graph has a cycle.
    pub order: Vec<String>,
    pub errors: Vec<String>,
}

/// Import `export` into `engine` and check it: every action must be
/// registered and the dependency graph must sort.
pub fn validate_export(engine: &WorkflowEngine, export: WorkflowExport) -> Result<ValidationReport> {
    let workflow = engine.import_workflow(export)?;

    let mut errors: Vec<String> = workflow
        .tasks
        .iter()
        .filter(|t| !engine.registry().contains(&t.action))
        .map(|t| format!("Task '{}' uses unknown action '{}'", t.name, t.action))
        .collect();

    let order = match topological_sort(&workflow.tasks) {
        Ok(order) => order.into_iter().map(|t| t.id.clone()).collect(),
        Err(e) => {
            errors.push(e.to_string());
            Vec::new()
        }
    };

    Ok(ValidationReport {
        workflow,
        order,
        errors,
    })
}

fn cmd_validate(file: &Path) -> Result<()> {
    let export = load_export(file)?;

    println!("Workflow: {}", export.name);
    println!("Tasks: {}", export.tasks.len());

    // A scratch engine checks ids, defaults and limits exactly as the server would.
    let engine = WorkflowEngine::with_builtins();
    let report = validate_export(&engine, export)
        .with_context(|| format!("Invalid workflow: {}", file.display()))?;

    if report.errors.is_empty() {
        println!("Validation: OK");
        println!("\nExecution order:");
        for (i, id) in report.order.iter().enumerate() {
            if let Some(task) = report.workflow.tasks.iter().find(|t| &t.id == id) {
                println!("  {}. {} [{}]", i + 1, task.name, task.action);
            }
        }
        Ok(())
    } else {
        println!("Validation: FAILED");
        for err in &report.errors {
            println!("  - {}", err);
        }
        anyhow::bail!("{} validation error(s) found", report.errors.len());
    }
}

fn cmd_actions() -> Result<()> {
    let registry = ActionRegistry::with_builtins();
    let actions = registry.list();

    println!("{:<20} DESCRIPTION", "ACTION");
    println!("{}", "-".repeat(60));

    for (name, desc) in &actions {
        println!("{:<20} {}", name, desc);
    }

    println!("\nTotal: {} action(s)", actions.len());
    Ok(())
}
