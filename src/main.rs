//! tessera CLI: plan and apply stacks, inspect and manage recorded resources.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tessera::config::{LogConfig, DEFAULT_CONFIG_FILE};
use tessera::setup::{assignments_to_fields, build_engine, build_manager, parse_assignment};
use tessera::{StackFile, TesseraConfig};
use tessera_core::CancellationToken;
use tessera_engine::{ExecuteError, ExecutionMode};

#[derive(Parser)]
#[command(
    name = "tessera",
    version = env!("CARGO_PKG_VERSION"),
    about = "Dependency-ordered infrastructure provisioning"
)]
struct Cli {
    /// Settings file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a stack file and print the creation order
    Plan {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Create every resource in a stack file, rolling back on failure
    Apply {
        #[arg(short, long)]
        file: PathBuf,
        /// Ready-set scheduling instead of strict creation order
        #[arg(long)]
        concurrent: bool,
        /// Custom field recorded on every created resource (key=value)
        #[arg(long = "field", value_parser = parse_assignment)]
        fields: Vec<(String, serde_json::Value)>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recorded ids of a type, or print one record
    Show {
        resource_type: String,
        id: Option<String>,
    },
    /// Live attributes of a recorded resource, from its provider
    Describe { resource_type: String, id: String },
    /// Update a recorded resource
    Update {
        resource_type: String,
        id: String,
        /// Provider argument (key=value)
        #[arg(long = "arg", value_parser = parse_assignment)]
        args: Vec<(String, serde_json::Value)>,
        /// Custom field (key=value); replaces the stored custom fields
        #[arg(long = "field", value_parser = parse_assignment)]
        fields: Vec<(String, serde_json::Value)>,
    },
    /// Delete a recorded resource and its record
    Destroy { resource_type: String, id: String },
    /// Print a default settings file
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, notice) = TesseraConfig::load_quiet(&cli.config);
    init_tracing(&config.log);
    notice.log();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            trigger.cancel();
        }
    });

    match cli.command {
        Commands::Plan { file } => {
            let stack = StackFile::load(&file)?;
            let plan = build_engine(&config).plan(stack.resources)?;
            for node in plan.nodes() {
                if node.dependencies.is_empty() {
                    println!("{:>3}. {} ({})", node.index + 1, node.id(), node.resource.resource_type);
                } else {
                    println!(
                        "{:>3}. {} ({}) after {}",
                        node.index + 1,
                        node.id(),
                        node.resource.resource_type,
                        node.dependencies.join(", ")
                    );
                }
            }
        }

        Commands::Apply {
            file,
            concurrent,
            fields,
            json,
        } => {
            let stack = StackFile::load(&file)?;
            let engine = build_engine(&config);
            let mode = if concurrent {
                ExecutionMode::Concurrent
            } else {
                engine.config().mode
            };
            let mut custom = stack.fields;
            custom.extend(assignments_to_fields(fields));

            let plan = engine.plan(stack.resources)?;
            match engine.execute(&plan, mode, &custom, &cancel).await {
                Ok(report) => {
                    if json {
                        println!("{}", report.to_json());
                    } else {
                        for created in &report.resources {
                            println!(
                                "{}  {}  {}",
                                created.id, created.record.id, created.record.backend_id
                            );
                        }
                        println!("{}", report.summary_line());
                    }
                }
                Err(e) => {
                    report_failure(&e);
                    return Err(e.into());
                }
            }
        }

        Commands::Show { resource_type, id } => {
            let manager = build_manager(&config);
            match id {
                Some(id) => {
                    let record = manager.read_resource(&resource_type, &id, &cancel).await?;
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                None => {
                    for id in manager.list_resources(&resource_type, &cancel).await? {
                        println!("{}", id);
                    }
                }
            }
        }

        Commands::Describe { resource_type, id } => {
            let manager = build_manager(&config);
            let live = manager
                .describe_resource(&resource_type, &id, &cancel)
                .await
                .with_context(|| format!("describing {} {}", resource_type, id))?;
            println!("{}", serde_json::to_string_pretty(&live)?);
        }

        Commands::Update {
            resource_type,
            id,
            args,
            fields,
        } => {
            let manager = build_manager(&config);
            let record = manager
                .update_resource(
                    &resource_type,
                    &id,
                    &assignments_to_fields(args),
                    &assignments_to_fields(fields),
                    &cancel,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Commands::Destroy { resource_type, id } => {
            let manager = build_manager(&config);
            manager.delete_resource(&resource_type, &id, &cancel).await?;
            println!("destroyed {} {}", resource_type, id);
        }

        Commands::Init => {
            print!("{}", TesseraConfig::default().to_toml());
        }
    }

    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| log.filter.as_str().into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn report_failure(e: &ExecuteError) {
    let Some(rollback) = e.rollback() else {
        return;
    };
    for id in &rollback.deleted {
        eprintln!("rolled back {}", id);
    }
    for failure in &rollback.failures {
        eprintln!(
            "LEFT BEHIND {} ({}): {}",
            failure.resource_id, failure.resource_type, failure.message
        );
    }
    if let ExecuteError::CreationFailed {
        additional_failures,
        ..
    } = e
    {
        for (id, err) in additional_failures {
            eprintln!("also failed: {}: {}", id, err);
        }
    }
}
