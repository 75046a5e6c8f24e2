use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use roster_core::RawRecord;
use roster_ingest::clean::{self, CleanOptions, DEFAULT_CLEAN_SEED, DEFAULT_EMAIL_DOMAIN};
use roster_ingest::{
    BufferedRow, ImportConfig, ImportError, ImportHook, ImportSummary, RowRejection,
};
use roster_storage::{PgRosterStore, StoreError};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "roster")]
#[command(about = "Bulk employee CSV import")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import employees from a CSV file.
    Import {
        csv_file: PathBuf,
        /// Rows per bulk insert; overrides IMPORT_BATCH_SIZE.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Directory for run reports; overrides IMPORT_REPORTS_DIR.
        #[arg(long)]
        reports_dir: Option<PathBuf>,
    },
    /// Convert a raw HR export into the import format.
    Clean {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = DEFAULT_CLEAN_SEED)]
        seed: u64,
        #[arg(long, default_value = DEFAULT_EMAIL_DOMAIN)]
        email_domain: String,
    },
    /// Apply pending schema migrations.
    Migrate,
}

/// Prints per-row and per-batch progress to stdout.
struct ConsoleHook;

impl ImportHook for ConsoleHook {
    fn row_skipped(&self, line: u64, rejection: &RowRejection, raw: Option<&RawRecord>) {
        match raw {
            Some(raw) => println!("Skipping row {line}: {rejection}. Row: {raw}"),
            None => println!("Skipping row {line}: {rejection}"),
        }
    }

    fn batch_committed(&self, _batch: usize, _rows: usize, created_total: u64) {
        println!("Inserted {created_total} records...");
    }

    fn batch_failed(&self, batch: usize, rows: &[BufferedRow], error: &StoreError) {
        println!("Batch {batch} failed: {error}");
        for row in rows {
            println!(
                "Skipping row {}: BatchWriteFailure: {}",
                row.line, row.employee.email
            );
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Import complete: {} created, {} skipped.",
        summary.created, summary.skipped
    );
    for (reason, count) in &summary.skipped_by_reason {
        println!("  {reason}: {count}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            csv_file,
            batch_size,
            reports_dir,
        } => {
            let mut config = ImportConfig::from_env();
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size.max(1);
            }
            if reports_dir.is_some() {
                config.reports_dir = reports_dir;
            }
            match roster_ingest::run_import(&config, &csv_file, Box::new(ConsoleHook)).await {
                Ok(summary) => print_summary(&summary),
                Err(err) => {
                    if let Some(ImportError::Interrupted { summary, .. }) =
                        err.downcast_ref::<ImportError>()
                    {
                        print_summary(summary);
                    }
                    return Err(err);
                }
            }
        }
        Commands::Clean {
            input,
            output,
            seed,
            email_domain,
        } => {
            let options = CleanOptions {
                seed,
                email_domain,
                ..CleanOptions::default()
            };
            let summary = clean::clean_file(&input, &output, &options)?;
            println!(
                "Cleaned {} records into {}",
                summary.rows,
                output.display()
            );
        }
        Commands::Migrate => {
            let config = ImportConfig::from_env();
            let store = PgRosterStore::connect(&config.store_config())
                .await
                .context("connecting to database")?;
            store.migrate().await.context("applying migrations")?;
            println!("migrations applied");
        }
    }

    Ok(())
}
