//! Thoughtloop CLI for inspecting the reasoning graph log.
//!
//! Usage:
//!   thoughtloop projects [--log path]
//!   thoughtloop branches <project> [--log path]
//!   thoughtloop export <project> [--branch name] [--log path]
//!   thoughtloop resume <project> [--branch name] [--limit n] [--log path]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use thoughtloop::{EngineConfig, LogStore, MockReviewer, MockSummarizer, WorkflowEngine};

#[derive(Parser)]
#[command(
    name = "thoughtloop",
    version,
    about = "Persistent actor-critic reasoning graph engine"
)]
struct Cli {
    /// Path to the append-only log file
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all projects present on the log
    Projects,
    /// List the branches of a project
    Branches {
        /// Project name or context path
        project: String,
    },
    /// Export a branch as markdown
    Export {
        /// Project name or context path
        project: String,
        /// Branch label or node id (defaults to the newest branch)
        #[arg(long)]
        branch: Option<String>,
    },
    /// Show resume context for a branch: its summaries plus the recent tail
    Resume {
        /// Project name or context path
        project: String,
        /// Branch label or node id (defaults to the newest branch)
        #[arg(long)]
        branch: Option<String>,
        /// Cap on the recent tail
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Default log path (~/.local/share/thoughtloop/graph.jsonl)
fn default_log_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("thoughtloop").join("graph.jsonl")
}

/// The CLI only reads the graph, so gateways are never invoked; mocks satisfy
/// the engine's constructor.
fn open_engine(log: Option<PathBuf>) -> Result<WorkflowEngine, String> {
    let path = log.unwrap_or_else(default_log_path);
    let store =
        LogStore::open(&path).map_err(|e| format!("failed to open log {}: {e}", path.display()))?;
    Ok(WorkflowEngine::new(
        Arc::new(store),
        Arc::new(MockReviewer::approving()),
        Arc::new(MockSummarizer::fixed("")),
        EngineConfig::default(),
    ))
}

fn cmd_projects(engine: &WorkflowEngine) -> i32 {
    match engine.list_projects() {
        Ok(projects) if projects.is_empty() => {
            println!("No projects on the log.");
            0
        }
        Ok(projects) => {
            for project in projects {
                println!("{project}");
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_branches(engine: &WorkflowEngine, project: &str) -> i32 {
    match engine.list_branches(project) {
        Ok(branches) if branches.is_empty() => {
            println!("No branches in project '{project}'.");
            0
        }
        Ok(branches) => {
            println!(
                "{:<36}  {:<20}  {:>5}  {:>5}  {:>12}",
                "HEAD", "LABEL", "NODES", "DEPTH", "UNSUMMARIZED"
            );
            for b in branches {
                println!(
                    "{:<36}  {:<20}  {:>5}  {:>5}  {:>12}",
                    b.head.to_string(),
                    b.label.as_deref().unwrap_or("-"),
                    b.node_count,
                    b.depth,
                    b.unsummarized
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_export(engine: &WorkflowEngine, project: &str, branch: Option<&str>) -> i32 {
    match engine.export_plan(project, branch) {
        Ok(markdown) => {
            print!("{markdown}");
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_resume(
    engine: &WorkflowEngine,
    project: &str,
    branch: Option<&str>,
    limit: Option<usize>,
) -> i32 {
    match engine.resume(project, branch, limit) {
        Ok(context) => {
            for summary in &context.summaries {
                println!("[summary {}]", summary.id);
                println!("{}\n", summary.content);
            }
            for node in &context.recent {
                match node.verdict {
                    Some(v) => println!("[{} {} -> {v}]", node.role, node.id),
                    None => println!("[{} {}]", node.role, node.id),
                }
                if !node.content.is_empty() {
                    println!("{}\n", node.content);
                }
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = match open_engine(cli.log) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Projects => cmd_projects(&engine),
        Commands::Branches { project } => cmd_branches(&engine, &project),
        Commands::Export { project, branch } => cmd_export(&engine, &project, branch.as_deref()),
        Commands::Resume {
            project,
            branch,
            limit,
        } => cmd_resume(&engine, &project, branch.as_deref(), limit),
    };
    std::process::exit(code);
}
