//! Revtrail CLI
//!
//! Applies migrations, prints attribution reports and live visitor counts,
//! and classifies referrers from the command line.

mod commands;

use clap::{Parser, Subcommand};
use commands::{ClassifyCommand, LiveCommand, MigrateCommand, ReportCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "REVTRAIL_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "REVTRAIL_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate(MigrateCommand),
    /// Print metrics, channels and visitors for a date range
    Report(ReportCommand),
    /// Show the channel a referrer would be classified into
    Classify(ClassifyCommand),
    /// Show visitors active right now
    Live(LiveCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // If RUST_LOG is set, use it directly; otherwise scope our crates to the
    // requested level and keep noisy dependencies at warn
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!(
            "revtrail_cli={level},\
             revtrail_core={level},\
             revtrail_database={level},\
             revtrail_migrations={level},\
             revtrail_tracking={level},\
             revtrail_revenue={level},\
             revtrail_analytics={level},\
             sqlx=warn,\
             sea_orm=warn,\
             sea_orm_migration=warn",
            level = cli.log_level
        ))?,
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed(),
        _ => tracing_subscriber::fmt::layer() // "compact" or any other value
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Migrate(cmd) => cmd.execute(),
        Commands::Report(cmd) => cmd.execute(),
        Commands::Classify(cmd) => cmd.execute(),
        Commands::Live(cmd) => cmd.execute(),
    }
}
