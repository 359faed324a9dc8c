//! sqlite-pg-migrate CLI - move the movies catalog from SQLite to PostgreSQL.

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{CommitPolicy, Config, MigrateError, MigrationResult, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "Migrate the movies catalog from SQLite to PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (environment variables and .env when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

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
    /// Migrate every source table, then verify it
    Run {
        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Commit each table only after it verifies; roll it back otherwise
        #[arg(long)]
        defer_commit: bool,

        /// Load without the verification pass
        #[arg(long)]
        skip_verify: bool,
    },

    /// Compare an already populated destination against the source
    Verify {
        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
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

    setup_logging(&cli.verbosity, &cli.log_format).map_err(MigrateError::Config)?;

    let mut config = match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => {
            let config = Config::from_env()?;
            info!("Loaded configuration from environment");
            config
        }
    };

    match cli.command {
        Commands::Run {
            batch_size,
            defer_commit,
            skip_verify,
        } => {
            // Apply overrides
            if batch_size.is_some() {
                config.migration.batch_size = batch_size;
            }
            if defer_commit {
                config.migration.commit_policy = CommitPolicy::AfterVerify;
            }
            if skip_verify {
                config.migration.verify = false;
            }
            config.validate()?;

            let result = Orchestrator::new(config).await?.run().await?;
            print_result(&result, "Migration completed!", cli.output_json)?;
        }

        Commands::Verify { batch_size } => {
            if batch_size.is_some() {
                config.migration.batch_size = batch_size;
            }
            config.validate()?;

            let result = Orchestrator::new(config).await?.verify().await?;
            print_result(&result, "Verification passed!", cli.output_json)?;
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                } else {
                    println!("    Tables: {}", result.source_tables.join(", "));
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

fn print_result(
    result: &MigrationResult,
    headline: &str,
    output_json: bool,
) -> Result<(), MigrateError> {
    if output_json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    println!("\n{}", headline);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!("  Tables: {}", result.tables_total);
    for table in &result.tables {
        println!(
            "    {:<18} read {:>8}  inserted {:>8}  skipped {:>8}  verified {}",
            table.table,
            table.rows_read,
            table.rows_inserted,
            table.rows_skipped,
            if table.verified {
                table.rows_verified.to_string()
            } else {
                "-".to_string()
            }
        );
    }
    println!("  Rows read: {}", result.rows_read);
    println!("  Rows inserted: {}", result.rows_inserted);
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
