//! # corpusdb CLI
//!
//! ```bash
//! # Start the server with defaults (0.0.0.0:8000, ./data)
//! corpusdb serve
//!
//! # Override bind address and data directory
//! corpusdb serve --bind 127.0.0.1:9000 --data-dir /var/lib/corpusdb
//! ```
//!
//! Configuration comes from the environment (see [`corpusdb::config`]);
//! command-line flags override it. The Cohere credential is read from
//! `COHERE_API_KEY` — without it the server still runs, but index builds
//! and searches fail with an embedding-auth error.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use corpusdb::app::AppContext;
use corpusdb::config::Config;
use corpusdb::embedding::CohereEmbedder;
use corpusdb::server;

#[derive(Parser)]
#[command(
    name = "corpusdb",
    about = "A small in-memory vector database for text corpora",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Bind address (overrides BIND_ADDR).
        #[arg(long)]
        bind: Option<String>,

        /// Persistence directory (overrides DATA_DIR).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, data_dir } => {
            let mut config = Config::from_env()?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if config.embedding.api_key.is_none() {
                tracing::warn!(
                    "COHERE_API_KEY is not set; index builds and searches will fail until it is"
                );
            }

            let embedder = Arc::new(CohereEmbedder::new(&config.embedding)?);
            let ctx = AppContext::new(config, embedder);
            ctx.bootstrap();
            server::run_server(ctx).await?;
        }
    }

    Ok(())
}
