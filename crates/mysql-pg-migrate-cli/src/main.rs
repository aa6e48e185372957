//! mysql-pg-migrate CLI - one-shot MySQL to PostgreSQL migration.

use clap::{Parser, Subcommand};
use mysql_pg_migrate::{Config, MigrateError, MigrationReport, Orchestrator, RunStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "mysql-pg-migrate")]
#[command(about = "One-shot MySQL to PostgreSQL schema and data migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create target tables and copy all rows
    Run {
        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Override number of tables migrated concurrently
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            target_schema,
            workers,
        } => {
            if let Some(schema) = target_schema {
                config.migration.target_schema = schema;
            }
            if let Some(w) = workers {
                config.migration.workers = w;
            }

            let orchestrator = Orchestrator::new(config)?;
            let cancel = setup_signal_handler();
            let report = orchestrator.run(cancel).await?;

            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print_summary(&report);
            }

            if report.status == RunStatus::Cancelled {
                return Err(MigrateError::Cancelled);
            }
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config)?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({} tables)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_tables
                );
                println!(
                    "  Target (PostgreSQL): {}",
                    if result.target_connected { "OK" } else { "FAILED" }
                );
                for err in &result.errors {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "health-check",
                    result.errors.join("; "),
                ));
            }
        }
    }

    Ok(())
}

fn print_summary(report: &MigrationReport) {
    println!("Migration {} ({:?})", report.run_id, report.status);
    for table in &report.tables {
        let state = match (&table.error, &table.creation) {
            (Some(err), _) => format!("ERROR: {}", err),
            (None, Some(creation)) => format!("{:?}", creation),
            (None, None) => "not started".to_string(),
        };
        println!(
            "  {} -> {}: {} inserted, {} skipped [{}]",
            table.source_table,
            table.target_table,
            table.rows_inserted,
            table.rows_skipped.len(),
            state
        );
    }
    println!(
        "\n  Tables: {}/{}  Rows: {} inserted, {} skipped  Duration: {:.1}s",
        report.tables.len(),
        report.tables_total,
        report.rows_inserted,
        report.rows_skipped,
        report.duration_seconds
    );
    if !report.failed_tables.is_empty() {
        println!("  Failed tables: {}", report.failed_tables.join(", "));
    }
}

/// Logs go to stderr so `--output-json` keeps stdout machine-readable.
fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the run on SIGINT (Ctrl-C) or SIGTERM.
///
/// The orchestrator stops at the next table boundary and still reports the
/// tables that finished.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            let mut stream = match signal(kind) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to install {} handler: {}", name, e);
                    return;
                }
            };
            stream.recv().await;
            eprintln!("\nReceived {}. Finishing the current table...", name);
            token.cancel();
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl-C handler: {}", e);
            return;
        }
        eprintln!("\nReceived Ctrl-C. Finishing the current table...");
        token.cancel();
    });

    cancel_token
}
