// crates/flexcli/src/main.rs

mod graph_file;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flexcore::{
    CredentialValue, ExecutionEvent, ExecutionStatus, LogLevel, MemoryCredentials, PhaseStatus,
};
use flexruntime::{build_plan, FlowRuntime, RunRequest, RuntimeConfig, TaskRegistry};
use flextasks::TaskConfig;
use graph_file::GraphFile;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flex")]
#[command(about = "WorkFlex CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow graph file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// User the run is attributed to
        #[arg(short, long, default_value = "local")]
        user: String,

        /// JSON file of `{credentialId: {key: value}}` for the user
        #[arg(short, long)]
        credentials: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file and print its phases
    Plan {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available task types
    Tasks,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            user,
            credentials,
            verbose,
        } => {
            let filter = if verbose { "debug" } else { "warn" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
                )
                .init();

            let status = run_workflow(&file, &user, credentials.as_deref()).await?;
            if status != ExecutionStatus::Completed {
                std::process::exit(1);
            }
        }

        Commands::Plan { file } => {
            print_plan(&file)?;
        }

        Commands::Tasks => {
            list_tasks();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn load_graph(file: &Path) -> Result<GraphFile> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid workflow file {}", file.display()))
}

async fn load_credentials(user: &str, file: Option<&Path>) -> Result<MemoryCredentials> {
    let credentials = MemoryCredentials::new();
    if let Some(file) = file {
        let json = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let entries: HashMap<String, CredentialValue> = serde_json::from_str(&json)
            .with_context(|| format!("invalid credentials file {}", file.display()))?;
        for (id, value) in entries {
            credentials.insert(user, id, value).await;
        }
    }
    Ok(credentials)
}

async fn run_workflow(
    file: &Path,
    user: &str,
    credentials: Option<&Path>,
) -> Result<ExecutionStatus> {
    println!("🚀 Loading workflow from: {}", file.display());

    let graph = load_graph(file)?;
    let name = graph.name.clone();
    let definition = graph.into_definition();

    println!("📋 Workflow: {}", name);
    println!("   Nodes: {}", definition.nodes.len());
    println!("   Edges: {}", definition.edges.len());
    println!();

    let task_config = TaskConfig::from_env();
    let mut registry = TaskRegistry::new();
    flextasks::register_all(&mut registry, &task_config);

    let credentials = load_credentials(user, credentials).await?;
    let services = flextasks::standard_services(&task_config, Arc::new(credentials));
    let runtime = FlowRuntime::new(registry, services, RuntimeConfig::default());

    let workflow = runtime.create_workflow(user, name, definition).await?;

    // Subscribe before the run starts so no event is missed
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { .. } => {
                    println!("▶️  Workflow started");
                }
                ExecutionEvent::PhaseStarted { node_id, task_type, .. } => {
                    println!("  ⚡ Starting phase: {} ({})", node_id, task_type);
                }
                ExecutionEvent::PhaseCompleted { duration_ms, .. } => {
                    println!("  ✅ Phase completed in {}ms", duration_ms);
                }
                ExecutionEvent::PhaseFailed { error, .. } => {
                    println!("  ❌ Phase failed: {}", error);
                }
                ExecutionEvent::PhaseLog { line, .. } => match line.level {
                    LogLevel::Info => println!("     ℹ️  {}", line.message),
                    LogLevel::Warn => println!("     ⚠️  {}", line.message),
                    LogLevel::Error => println!("     🛑 {}", line.message),
                },
                ExecutionEvent::WorkflowCompleted {
                    status,
                    credits_consumed,
                    duration_ms,
                    ..
                } => {
                    if status == ExecutionStatus::Completed {
                        println!(
                            "✨ Workflow completed in {}ms ({} credits)",
                            duration_ms, credits_consumed
                        );
                    } else {
                        println!("💥 Workflow failed after {}ms", duration_ms);
                    }
                    break;
                }
            }
        }
    });

    let handle = runtime
        .run_workflow(RunRequest::manual(workflow.id, user))
        .await?;
    let execution_id = handle.execution_id;
    let status = handle.wait().await;

    // Let the listener drain the final events
    if tokio::time::timeout(Duration::from_millis(500), event_task).await.is_err() {
        tracing::debug!("Event listener did not finish in time");
    }

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", execution_id);
    println!("   Status: {:?}", status);

    for phase in runtime.phases(execution_id).await? {
        let marker = match phase.status {
            PhaseStatus::Completed => "✅",
            PhaseStatus::Failed => "❌",
            PhaseStatus::Running => "⏳",
            PhaseStatus::Created => "⏸️ ",
        };
        println!("   {} {} {}", marker, phase.number, phase.name);
        for (key, value) in &phase.outputs {
            println!("       {}: {}", key, value.to_json());
        }
    }

    Ok(status)
}

fn print_plan(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let graph = load_graph(file)?;
    let name = graph.name.clone();
    let plan = build_plan(&graph.into_definition())?;

    println!("✅ Workflow '{}' is valid:", name);
    println!("   Nodes: {}", plan.node_count());
    println!("   Credits per run: {}", plan.credits());
    println!();

    for phase in &plan.phases {
        println!("  Phase {}:", phase.phase);
        for node in &phase.nodes {
            println!("    • {} ({})", node.node.id, node.task_type);
        }
    }

    Ok(())
}

fn list_tasks() {
    println!("📦 Available Task Types:");
    println!();

    let mut registry = TaskRegistry::new();
    flextasks::register_all(&mut registry, &TaskConfig::default());

    for definition in registry.definitions() {
        let entry = if definition.is_entry_point { ", entry point" } else { "" };
        println!(
            "  • {} ({} credits{})",
            definition.task_type, definition.credits, entry
        );
        println!("    {}", definition.description);
        for input in definition.inputs {
            let required = if input.required { " *" } else { "" };
            println!("      in:  {}{} [{:?}]", input.name, required, input.param_type);
        }
        for output in definition.outputs {
            println!("      out: {} [{:?}]", output.name, output.param_type);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&GraphFile::example())?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  flex run --file {}", output.display());

    Ok(())
}
