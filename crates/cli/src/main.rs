use clap::{Parser, Subcommand};

mod commands;
mod executors;

#[derive(Parser)]
#[command(name = "flywheel")]
#[command(about = "Token flywheel cycle engine and launch reconciler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cycle engine with background reconciliation
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
        /// Use an in-memory store seeded with a demo launch instead of
        /// Postgres; trades are logged, never executed
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one launch reconciliation pass and exit
    Reconcile {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Check a per-token config file (JSON) before writing it to the store
    ValidateConfig {
        /// Token config file path
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { config, dry_run } => {
            commands::run_engine(&config, dry_run).await?;
        }
        Commands::Reconcile { config } => {
            commands::run_reconcile(&config).await?;
        }
        Commands::ValidateConfig { file } => {
            commands::run_validate_config(&file)?;
        }
    }

    Ok(())
}
