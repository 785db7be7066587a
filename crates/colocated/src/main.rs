//! `colocated` — plans `distributeShardsLike` repairs from an agency dump.
//!
//! Reads a snapshot of the agency (the JSON an agency read of `/` returns),
//! computes the repair plan and prints it. Nothing is written to the cluster;
//! the operator applies the printed jobs and transactions, then runs
//! `colocated plan` again on a fresh dump until the plan is empty.
//!
//! # Usage
//!
//! ```text
//! colocated plan -s agency.json               # print the repair plan
//! colocated plan -s agency.json --job-id-start 9000
//! colocated check -s agency.json              # summarize linked collections
//! curl ... | colocated plan                   # read the dump from stdin
//! colocated -c colocated.toml plan            # with a config file
//! ```

mod config;
mod render;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colocate_agency::PlanSnapshot;
use colocate_repair::{DistributeShardsLikeRepairer, RepairPlan};
use colocate_types::ShardLink;
use serde_json::Value;
use tracing::{debug, info, warn};

use config::CliConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(
    name = "colocated",
    version,
    about = "Plan distributeShardsLike repairs from an agency dump"
)]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Agency prefix (top-level key of the dump).
    #[arg(short, long, global = true, env = "COLOCATED_PREFIX")]
    prefix: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the repair plan as JSON lines.
    Plan {
        /// Agency dump to read (`-` for stdin).
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// ID of the first emitted move job.
        #[arg(long)]
        job_id_start: Option<u64>,
    },

    /// Report which linked collections are consistent.
    Check {
        /// Agency dump to read (`-` for stdin).
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = CliConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    // CLI args override config file values.
    if let Some(prefix) = cli.prefix {
        config.agency.prefix = prefix;
    }

    match cli.command {
        Commands::Plan {
            snapshot,
            job_id_start,
        } => {
            if snapshot.is_some() {
                config.agency.snapshot = snapshot;
            }
            if let Some(id) = job_id_start {
                config.jobs.id_start = id;
            }
            cmd_plan(&config)
        }
        Commands::Check { snapshot } => {
            if snapshot.is_some() {
                config.agency.snapshot = snapshot;
            }
            cmd_check(&config)
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
/// Logs go to stderr so that stdout carries only the plan.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read and parse the agency dump named by the config.
fn load_snapshot(config: &CliConfig) -> Result<PlanSnapshot> {
    let raw = match config.snapshot_path() {
        Some(path) => read_file(path)?,
        None => {
            debug!("reading agency dump from stdin");
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read agency dump from stdin")?;
            raw
        }
    };

    let dump: Value = serde_json::from_str(&raw).context("agency dump is not valid JSON")?;
    let snapshot = PlanSnapshot::from_agency_dump(&dump, &config.agency.prefix)
        .context("failed to read plan snapshot")?;

    info!(
        prefix = %config.agency.prefix,
        servers = snapshot.servers().len(),
        healthy = snapshot.healthy_servers().len(),
        collections = snapshot.collections().count(),
        "loaded agency snapshot"
    );

    Ok(snapshot)
}

fn read_file(path: &Path) -> Result<String> {
    debug!(path = %path.display(), "reading agency dump");
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read agency dump {}", path.display()))
}

// -----------------------------------------------------------------------
// colocated plan
// -----------------------------------------------------------------------

fn cmd_plan(config: &CliConfig) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let plan = DistributeShardsLikeRepairer::new(&snapshot).repair_distribute_shards_like();

    for line in render::plan_lines(
        &plan,
        &config.agency.prefix,
        &config.jobs.creator,
        config.jobs.id_start,
    ) {
        println!("{line}");
    }

    summarize(&plan)
}

/// Log a summary and fail if any collection could not be planned.
fn summarize(plan: &RepairPlan) -> Result<()> {
    let failed = plan.errors().count();
    info!(
        collections = plan.collections.len(),
        operations = plan.operations().count(),
        failed,
        "repair plan complete"
    );

    for (repair, e) in plan.errors() {
        warn!(collection = %repair.full_name, error = %e, "collection not repaired");
    }

    if failed > 0 {
        anyhow::bail!("{failed} collection(s) could not be planned");
    }
    Ok(())
}

// -----------------------------------------------------------------------
// colocated check
// -----------------------------------------------------------------------

fn cmd_check(config: &CliConfig) -> Result<()> {
    let snapshot = load_snapshot(config)?;
    let plan = DistributeShardsLikeRepairer::new(&snapshot).repair_distribute_shards_like();

    let linked = snapshot
        .collections()
        .filter(|c| c.link != ShardLink::None);

    let mut count = 0;
    for collection in linked {
        count += 1;
        println!(
            "{} ({}): {}",
            collection.full_name(),
            collection.id,
            render::check_status(plan.for_collection(&collection.id))
        );
    }
    println!("{}", render::check_summary(count, &plan));

    summarize(&plan)
}
