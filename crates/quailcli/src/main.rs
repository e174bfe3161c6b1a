use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quailcore::{CheckStatus, MessageLevel, NodeKind, RunEvent};
use quailruntime::config::masked_params;
use quailruntime::{NodeCatalog, Pipeline, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quail")]
#[command(about = "Data quality pipeline runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run targets and their dependencies
    Run {
        /// Pipeline configuration file
        #[arg(short, long, default_value = "quail.json")]
        config: PathBuf,

        /// Profile whose environment is used (overrides QUAIL_PROFILE)
        #[arg(short, long)]
        profile: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Print the execution plan without running anything
        #[arg(long)]
        dry_run: bool,

        /// Node ids or target groups; the default group when empty
        targets: Vec<String>,
    },

    /// Validate a pipeline configuration
    Validate {
        #[arg(short, long, default_value = "quail.json")]
        config: PathBuf,
    },

    /// List available node types, and the nodes of a pipeline
    Nodes {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the dependency graph as DOT
    Graph {
        #[arg(short, long, default_value = "quail.json")]
        config: PathBuf,
    },

    /// Create an example pipeline and dataset
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn catalog() -> NodeCatalog {
    quailnodes::standard_catalog()
}

fn load(config: &Path, profile: Option<String>) -> Result<Pipeline> {
    let runtime = RuntimeConfig {
        profile,
        ..Default::default()
    };
    Pipeline::load(config, &catalog(), runtime)
        .with_context(|| format!("failed to load {}", config.display()))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            profile,
            verbose,
            dry_run,
            targets,
        } => {
            init_logging(if verbose { "debug" } else { "warn" });
            if dry_run {
                print_plan(&config, profile, &targets)?;
                return Ok(ExitCode::SUCCESS);
            }
            run_pipeline(config, profile, targets).await
        }

        Commands::Validate { config } => {
            init_logging("warn");
            validate_pipeline(&config)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Nodes { config } => {
            init_logging("warn");
            list_nodes(config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Graph { config } => {
            init_logging("warn");
            let graph = load(&config, None)?.graph()?;
            println!("{}", graph.to_dot());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Init { output } => {
            init_logging("warn");
            create_example_pipeline(&output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_plan(config: &Path, profile: Option<String>, targets: &[String]) -> Result<()> {
    let pipeline = load(config, profile)?;
    let plan = pipeline.plan(targets)?;
    println!("🔍 Dry run: execution plan for {}", config.display());
    println!("   Profile: {}", pipeline.profile());
    println!();
    println!("{}", plan);
    Ok(())
}

async fn run_pipeline(
    config: PathBuf,
    profile: Option<String>,
    targets: Vec<String>,
) -> Result<ExitCode> {
    println!("🚀 Loading pipeline from: {}", config.display());
    let pipeline = load(&config, profile)?;
    println!("   Profile: {}", pipeline.profile());
    println!("   Nodes: {}", pipeline.registry().len());
    println!();

    let mut events = pipeline.subscribe_events();
    let event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let last = matches!(
                        event,
                        RunEvent::RunCompleted { .. } | RunEvent::RunFailed { .. }
                    );
                    print_event(&event);
                    if last {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => println!("  … {} events dropped", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // nodes run synchronously; keep them off the async workers
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(&targets)).await?;

    if tokio::time::timeout(Duration::from_millis(500), event_task).await.is_err() {
        tracing::debug!("Event printer did not finish in time");
    }

    let report = outcome?;
    println!();
    println!("📊 Run {}", report.run_id);
    println!("{}", report.summary);

    if report.summary.has_blocking_failures() {
        println!("💥 Blocking check failures");
        Ok(ExitCode::FAILURE)
    } else {
        println!("✨ No blocking failures");
        Ok(ExitCode::SUCCESS)
    }
}

fn print_event(event: &RunEvent) {
    match event {
        RunEvent::RunStarted { order, .. } => {
            println!("▶️  Run started: {}", order.join(" → "));
        }
        RunEvent::NodeStarted { node_id, kind, .. } => {
            println!("  ⚡ {} ({})", node_id, kind);
        }
        RunEvent::TaskCompleted {
            node_id,
            cached,
            duration_ms,
            ..
        } => {
            if *cached {
                println!("  ♻️  {} reused", node_id);
            } else {
                println!("  ✅ {} done in {}ms", node_id, duration_ms);
            }
        }
        RunEvent::CheckCompleted {
            node_id,
            status,
            severity,
            error,
            ..
        } => {
            let mark = match status {
                CheckStatus::Pass => "✅",
                CheckStatus::Fail => "❌",
                CheckStatus::Error => "💥",
                CheckStatus::Skip => "⏭️ ",
            };
            match error {
                Some(message) => {
                    println!("  {} {} [{}] {}: {}", mark, node_id, severity, status, message)
                }
                None => println!("  {} {} [{}] {}", mark, node_id, severity, status),
            }
        }
        RunEvent::NodeMessage {
            node_id,
            level,
            message,
            ..
        } => match level {
            MessageLevel::Info => println!("     ℹ️  [{}] {}", node_id, message),
            MessageLevel::Warning => println!("     ⚠️  [{}] {}", node_id, message),
        },
        RunEvent::RunFailed { node_id, error, .. } => match node_id {
            Some(node_id) => println!("💥 Run failed at {}: {}", node_id, error),
            None => println!("💥 Run failed: {}", error),
        },
        RunEvent::RunCompleted { duration_ms, .. } => {
            println!("🏁 Run completed in {}ms", duration_ms);
        }
    }
}

fn validate_pipeline(config: &Path) -> Result<()> {
    println!("🔍 Validating pipeline: {}", config.display());

    let pipeline = load(config, None)?;
    let graph = pipeline.graph()?;
    for name in pipeline.targets().names() {
        let members = pipeline.targets().group(name).unwrap_or_default();
        for member in members {
            if !pipeline.registry().contains(member) {
                bail!("target group '{}' names unknown node '{}'", name, member);
            }
        }
    }

    let ids = pipeline.registry().list_ids();
    println!("✅ Pipeline is valid:");
    println!("   Profile: {}", pipeline.profile());
    println!("   Tasks: {}", ids.tasks.len());
    println!("   Checks: {}", ids.checks.len());
    println!("   Dependencies: {}", graph.edge_count());
    println!(
        "   Target groups: {}",
        pipeline.targets().names().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

fn list_nodes(config: Option<&Path>) -> Result<()> {
    println!("📦 Available Node Types:");
    println!();

    let catalog = catalog();
    for node_type in catalog.list_node_types() {
        let Some(metadata) = catalog.get_metadata(&node_type) else {
            println!("  • {}", node_type);
            continue;
        };
        println!("  • {} ({})", node_type, metadata.category);
        println!("    {}", metadata.description);
        for option in &metadata.options {
            let marker = if option.required { "*" } else { " " };
            println!("      {}{:12} {}", marker, option.name, option.description);
        }
    }

    if let Some(config) = config {
        print_overview(config)?;
    }
    Ok(())
}

fn print_overview(config: &Path) -> Result<()> {
    let pipeline = load(config, None)?;
    let registry = pipeline.registry();
    println!();
    println!("🐦 Pipeline overview: {}", config.display());
    println!("   Profile: {}", pipeline.profile());

    println!();
    println!("🎯 Target groups:");
    let default_group = pipeline.targets().default_group();
    for name in pipeline.targets().names() {
        let marker = if default_group == Some(name) { " (default)" } else { "" };
        println!("  • {}{}", name, marker);
        for member in pipeline.targets().group(name).unwrap_or_default() {
            let (mark, kind) = match registry.lookup(member).map(|d| d.kind()) {
                Ok(NodeKind::Task) => ("📋", "task"),
                Ok(NodeKind::Check) => ("✅", "check"),
                Err(_) => ("❓", "unknown"),
            };
            println!("      {} {} [{}]", mark, member, kind);
        }
    }

    let ids = registry.list_ids();
    println!();
    println!("📋 Tasks:");
    for id in &ids.tasks {
        let requires = registry.lookup(id)?.requires();
        if requires.is_empty() {
            println!("  • {}", id);
        } else {
            println!("  • {} (depends on: {})", id, requires.join(", "));
        }
    }

    println!();
    println!("✅ Checks:");
    for id in &ids.checks {
        let descriptor = registry.lookup(id)?;
        let severity = descriptor.severity().map(|s| s.to_string()).unwrap_or_default();
        if descriptor.requires().is_empty() {
            println!("  • {} [{}]", id, severity);
        } else {
            let requires = descriptor.requires().join(", ");
            println!("  • {} [{}] (depends on: {})", id, severity, requires);
        }
    }

    let params = masked_params(pipeline.params());
    if !params.is_empty() {
        println!();
        println!("⚙️  Parameters:");
        for (key, value) in &params {
            println!("  • {}: {}", key, value);
        }
    }
    Ok(())
}

const EXAMPLE_DATASET: &str = r#"[
  {"order_id": 1, "customer": "ada", "amount": 12.5},
  {"order_id": 2, "customer": "grace", "amount": 40},
  {"order_id": 3, "customer": "linus", "amount": 7.25}
]
"#;

fn create_example_pipeline(output: &Path) -> Result<()> {
    let config_path = output.join("quail.json");
    let data_path = output.join("orders.json");
    for path in [&config_path, &data_path] {
        if path.exists() {
            bail!("{} already exists", path.display());
        }
    }

    let config = serde_json::json!({
        "profile": "dev",
        "envs": {
            "dev": {"warehouse": "local"},
            "prod": {"warehouse": "${WAREHOUSE_URL}"}
        },
        "params": {"min_orders": 1, "max_amount": 1000},
        "targets": {
            "daily": ["orders_not_empty", "orders_ids_unique", "orders_customer_present"],
            "full": [
                "orders_not_empty",
                "orders_ids_unique",
                "orders_customer_present",
                "orders_amount_range"
            ]
        },
        "default_target": "daily",
        "nodes": [
            {"id": "orders", "type": "dataset.json", "config": {"path": "orders.json"}},
            {"id": "orders_not_empty", "type": "check.row_count", "requires": ["orders"],
             "config": {"dataset": "orders", "min": "$min_orders"}},
            {"id": "orders_ids_unique", "type": "check.unique", "requires": ["orders"],
             "config": {"dataset": "orders", "column": "order_id"}},
            {"id": "orders_customer_present", "type": "check.not_null", "requires": ["orders"],
             "severity": "warning", "config": {"dataset": "orders", "column": "customer"}},
            {"id": "orders_amount_range", "type": "check.range", "requires": ["orders"],
             "config": {"dataset": "orders", "column": "amount", "min": 0, "max": "$max_amount"}}
        ]
    });

    std::fs::create_dir_all(output)?;
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    std::fs::write(&data_path, EXAMPLE_DATASET)?;

    println!("✨ Created example pipeline: {}", config_path.display());
    println!();
    println!("Run it with:");
    println!("  quail run --config {} full", config_path.display());
    Ok(())
}
