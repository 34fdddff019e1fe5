//! # schema-rag CLI (`srag`)
//!
//! ## Usage
//!
//! ```bash
//! srag --config ./config/srag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `srag agent` | Propose schema changes and migration DDL |
//! | `srag chat` | Answer database questions with sources (REPL without `--query`) |
//! | `srag report` | Markdown report from analytics and schema files |
//! | `srag extract <file>` | Split a saved model answer into JSON and SQL (offline) |
//! | `srag check` | Verify Gemini and Pinecone connectivity |
//! | `srag serve` | Start the HTTP server |
//!
//! Logs go to stderr; `RUST_LOG` overrides `[logging].filter`.

use clap::{Parser, Subcommand};
use schema_rag::{agent, chat, check, config, extract, report, server, services};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// schema-rag CLI: retrieval-augmented schema design, chat, and reporting.
///
/// Credentials come from the environment (`GEMINI_API_KEY`,
/// `PINECONE_API_KEY`); a `.env` file in the working directory is loaded
/// first.
#[derive(Parser)]
#[command(
    name = "srag",
    about = "schema-rag: retrieval-augmented schema design, chat, and reporting",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply when it is missing.
    #[arg(long, global = true, default_value = "./config/srag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose schema changes for a request.
    ///
    /// Retrieves reference documents, asks the model for a revised schema
    /// and migration DDL, and extracts both from the answer.
    Agent {
        /// Current schema (JSON file). Omit to design from scratch.
        #[arg(long)]
        schema: Option<PathBuf>,

        /// What to change, as text.
        #[arg(long, conflicts_with = "request_file")]
        request: Option<String>,

        /// What to change, read from a file.
        #[arg(long)]
        request_file: Option<PathBuf>,

        /// Namespace holding reference documents (default: `[retrieval].agent_namespace`).
        #[arg(long)]
        namespace: Option<String>,

        /// Reference documents to use (default: `[retrieval].default_top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the full response envelope as JSON.
        #[arg(long)]
        json: bool,

        /// Write response.md, schema_changes.json, and schema_ddl.sql here.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Ask database questions.
    Chat {
        /// Answer one question and exit. Without it, starts a REPL.
        #[arg(long)]
        query: Option<String>,

        /// Documents to cite (default: `[retrieval].chat_top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print responses as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate a markdown report from analytics and schema data.
    Report {
        /// Monthly usage analytics (JSON file).
        #[arg(long)]
        analytics: PathBuf,

        /// Current schema (JSON file).
        #[arg(long)]
        schema: PathBuf,

        /// Write the report here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Extract schema JSON and DDL from a saved model answer.
    ///
    /// Runs offline; no credentials required. Use `-` to read stdin.
    Extract {
        file: PathBuf,

        /// Print segments as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Verify credentials, connectivity, and index contents.
    Check,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let cfg = config::load(&cli.config)?;
    init_logging(&cfg.logging.filter);
    if !cli.config.exists() {
        tracing::info!("no config file at {}, using defaults", cli.config.display());
    }

    match cli.command {
        // Offline: no clients needed
        Commands::Extract { file, json } => {
            extract::run_extract(&file, cfg.extraction.markers(), json)?;
        }
        Commands::Check => {
            check::run_check(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Agent {
            schema,
            request,
            request_file,
            namespace,
            top_k,
            json,
            out_dir,
        } => {
            let pipeline = services::build_pipeline(&cfg)?;
            let args = agent::AgentArgs {
                schema,
                request,
                request_file,
                namespace: namespace.unwrap_or_else(|| cfg.retrieval.agent_namespace.clone()),
                top_k: top_k.unwrap_or(cfg.retrieval.default_top_k),
                json,
                out_dir,
            };
            agent::run_agent(&pipeline, args).await?;
        }
        Commands::Chat { query, top_k, json } => {
            let pipeline = services::build_pipeline(&cfg)?;
            let top_k = top_k.unwrap_or(cfg.retrieval.chat_top_k);
            chat::run_chat(&pipeline, query.as_deref(), top_k, json).await?;
        }
        Commands::Report {
            analytics,
            schema,
            out,
        } => {
            let pipeline = services::build_report_pipeline(&cfg)?;
            report::run_report(&pipeline, &analytics, &schema, out.as_deref()).await?;
        }
    }

    Ok(())
}
