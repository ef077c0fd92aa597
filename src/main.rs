//! Aegis - entry point.
//!
//! Serves the HTTP API by default; `ask` runs a single session from the
//! command line and `init-db` seeds the sample financial database.

use std::path::PathBuf;

use aegis::{
    api,
    config::{Config, ToolsConfig},
    tools::seed_sample_data,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SAMPLE_QUESTION: &str = "Based on our internal financials, which quarter of 2023 had the \
highest profit, what risks did Google highlight in its 2023 10-K, and what is the latest \
news on Alphabet's stock? Should we consider increasing our investment?";

#[derive(Parser)]
#[command(name = "aegis", version, about = "ReAct financial analyst agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,
    /// Answer one question and print the result.
    Ask {
        /// Question to answer (defaults to a multi-part investment question).
        question: Option<String>,
    },
    /// Create and seed the sample financial database.
    InitDb {
        /// Database file (defaults to DATABASE_PATH).
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aegis=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = Config::from_env()?;
            info!(
                "Loaded configuration: model={}, mock_mode={}",
                config.default_model, config.mock_mode
            );
            api::serve(config).await?;
        }
        Commands::Ask { question } => {
            let config = Config::from_env()?;
            let agent = api::build_agent(&config)?;
            let question = question.unwrap_or_else(|| SAMPLE_QUESTION.to_string());
            let result = agent.run(&question).await;
            if let Some(kind) = result.error_kind() {
                info!(?kind, "Session did not produce an answer");
            }
            println!("{}", result.user_message());
        }
        Commands::InitDb { path } => {
            let path = path
                .or_else(|| std::env::var_os("DATABASE_PATH").map(PathBuf::from))
                .unwrap_or_else(|| ToolsConfig::default().database_path);
            let rows = seed_sample_data(&path)
                .with_context(|| format!("Failed to seed {}", path.display()))?;
            info!("Seeded {} rows into {}", rows, path.display());
        }
    }

    Ok(())
}
