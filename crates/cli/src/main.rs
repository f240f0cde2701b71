//! Offline plan tool: validate a normalized plan file, or run the whole
//! import pipeline against a scratch in-memory store to preview exactly
//! what an upload would do.
//!
//! Exit codes: 0 ok, 1 validation failed, 2 internal error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};

use cadence_ingest::{ImportOptions, ImportPipeline, ImportStatus, ParsedPlan, validate_plan};
use cadence_store::{HolidayCache, ProjectStore};
use cadence_store_memory::MemoryStore;

#[derive(Parser, Debug)]
#[command(name = "cadence", about = "Plan validation and import preview for Cadence")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the validation pass only and print the report.
    Validate {
        /// Path to the normalized plan JSON.
        plan: PathBuf,
    },
    /// Run the full import pipeline against a scratch in-memory store.
    Import {
        /// Path to the normalized plan JSON.
        plan: PathBuf,
        /// Validate only; skip the execute phase.
        #[arg(long)]
        dry_run: bool,
        /// Skip the ghost check.
        #[arg(long)]
        no_ghost_check: bool,
        /// Skip recalculation after the merge.
        #[arg(long)]
        no_recalculation: bool,
        /// Take a baseline snapshot before merging.
        #[arg(long)]
        save_baseline: bool,
        /// Country for business-day calendars.
        #[arg(long, default_value = "US")]
        country: String,
    },
}

const EXIT_OK: u8 = 0;
const EXIT_VALIDATION_FAILED: u8 = 1;
const EXIT_INTERNAL_ERROR: u8 = 2;

fn load_plan(path: &PathBuf) -> Result<ParsedPlan, String> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    serde_json::from_str(&contents).map_err(|e| format!("cannot parse {}: {e}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Command::Validate { plan } => run_validate(&plan),
        Command::Import {
            plan,
            dry_run,
            no_ghost_check,
            no_recalculation,
            save_baseline,
            country,
        } => {
            run_import(
                &plan,
                dry_run,
                !no_ghost_check,
                !no_recalculation,
                save_baseline,
                country,
            )
            .await
        }
    };
    ExitCode::from(code)
}

fn run_validate(path: &PathBuf) -> u8 {
    let plan = match load_plan(path) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_INTERNAL_ERROR;
        }
    };

    let report = validate_plan(&plan);
    print_json(&report);
    if report.is_valid() {
        EXIT_OK
    } else {
        EXIT_VALIDATION_FAILED
    }
}

async fn run_import(
    path: &PathBuf,
    dry_run: bool,
    perform_ghost_check: bool,
    trigger_recalculation: bool,
    save_baseline_version: bool,
    country: String,
) -> u8 {
    let plan = match load_plan(path) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{e}");
            return EXIT_INTERNAL_ERROR;
        }
    };

    let file_hash = match std::fs::read(path) {
        Ok(bytes) => hex::encode(Sha256::digest(&bytes)),
        Err(e) => {
            eprintln!("cannot hash {}: {e}", path.display());
            return EXIT_INTERNAL_ERROR;
        }
    };

    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let holidays = Arc::new(HolidayCache::new(Arc::clone(&store)));
    let pipeline = ImportPipeline::new(store, holidays, country);

    let options = ImportOptions {
        dry_run,
        perform_ghost_check,
        trigger_recalculation,
        save_baseline_version,
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plan.json".to_owned()),
        file_hash,
        imported_by: "cli:import".to_owned(),
    };

    let report = pipeline.run(&plan, &options).await;
    print_json(&report);
    match report.status {
        ImportStatus::Success | ImportStatus::PartialSuccess => EXIT_OK,
        ImportStatus::ValidationFailed => EXIT_VALIDATION_FAILED,
        ImportStatus::Failed => EXIT_INTERNAL_ERROR,
    }
}
