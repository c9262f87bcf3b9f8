//! CLI entry point (`ctl`).

mod auth;
mod cache;
mod clauses;
mod config;
mod db;
mod dedup;
mod embedding;
mod errors;
mod ingest;
mod llm;
mod logging;
mod migrate;
mod models;
mod rag;
mod retry;
mod server;
mod structure;
mod vector_store;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ctl",
    about = "ContractIQ — contract and procurement document intelligence",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/contractiq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    Init,

    /// Run pending database migrations
    Migrate,

    /// Start the HTTP API server
    Serve,

    /// Upload and process a document into a workspace
    Ingest {
        /// Path to the PDF or DOCX file
        file: PathBuf,

        /// Workspace id to ingest into
        #[arg(long)]
        workspace: String,
    },

    /// Ask a question against a workspace's indexed documents
    Ask {
        /// The question to ask
        question: String,

        /// Conversation id to append the turn to
        #[arg(long)]
        conversation: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(logging::LogMode::default_for_tty());

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Migrate => {
            migrate::run_migrations(&cfg).await?;
            println!("Migrations applied.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { file, workspace } => {
            let pool = db::connect(&cfg).await?;
            let cache = cache::Cache::in_memory();
            let config = Arc::new(cfg);
            let ctx = Arc::new(ingest::IngestContext { pool, cache, config });

            let bytes = tokio::fs::read(&file).await?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("document")
                .to_string();

            let document = ingest::upload_document(ctx, &workspace, &filename, &filename, bytes).await?;
            println!("Uploaded document {} ({:?})", document.id, document.status);
        }
        Commands::Ask { question, conversation } => {
            let pool = db::connect(&cfg).await?;
            let cache = cache::Cache::in_memory();

            let workspace_id: String =
                sqlx::query_scalar("SELECT workspace_id FROM conversations WHERE id = ?")
                    .bind(&conversation)
                    .fetch_one(&pool)
                    .await?;

            let result = if !llm::LlmClient::is_available() {
                rag::answer_without_llm(&question)
            } else {
                let llm = llm::LlmClient::new(&cfg.llm)?;
                rag::answer(
                    &pool,
                    &cache,
                    &cfg.embedding,
                    &llm,
                    &workspace_id,
                    &question,
                    None,
                    &[],
                )
                .await?
            };

            println!("{}", result.answer);
            for citation in result.citations {
                println!(
                    "  [{}] {} (page {})",
                    citation.document_name, citation.section_name, citation.page_number
                );
            }
        }
    }

    Ok(())
}
