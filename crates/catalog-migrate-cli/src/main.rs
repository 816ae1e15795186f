//! catalog-migrate CLI - legacy MySQL library catalog to PostgreSQL.

use catalog_migrate::{Config, LanguageCode, MigrateError, MigrationResult, Orchestrator};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "catalog-migrate")]
#[command(about = "Migrate a legacy MySQL library catalog into PostgreSQL")]
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
    /// Migrate every legacy book into the catalog
    Run {
        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Override catalog language tag (tc, sc, cn)
        #[arg(long)]
        language: Option<String>,

        /// Dry run: read the source and log destination statements without writing
        #[arg(long)]
        dry_run: bool,
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
            language,
            dry_run,
        } => {
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            if let Some(language) = language {
                config.migration.language = language.parse::<LanguageCode>()?;
            }
            config.validate()?;

            let cancel_token = setup_signal_handler()?;

            let result = if dry_run {
                Orchestrator::dry_run(config).await?.run(cancel_token).await?
            } else {
                Orchestrator::new(config).await?.run(cancel_token).await?
            };

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                print_summary(&result, dry_run);
            }
        }

        Commands::HealthCheck => {
            let mut orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (MySQL): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn print_summary(result: &MigrationResult, dry_run: bool) {
    let status_msg = match (dry_run, result.status.as_str()) {
        (_, "cancelled") => "Migration cancelled.",
        (true, _) => "Dry run completed!",
        (false, _) => "Migration completed!",
    };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Books: {}/{} committed, {} skipped",
        result.records_committed, result.records_total, result.records_skipped
    );
    for (table, count) in &result.references_created {
        println!("  New {}: {}", table.table_name(), count);
    }
    println!(
        "  Links: {} subject, {} author, {} translator",
        result.links_created.subjects, result.links_created.authors, result.links_created.translators
    );
    println!("  Inventory copies: {}", result.inventory_created);
    if !result.skipped_call_ids.is_empty() {
        println!("  Skipped call numbers: {:?}", result.skipped_call_ids);
    }
}

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
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel the returned token on SIGINT or SIGTERM.
///
/// The run stops before the next record; the record in flight finishes.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Stopping after the current book...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Stopping after the current book...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
