//! CLI entry point for Colloquy.
//!
//! This binary provides the `colloquy` command: an interactive chat REPL
//! plus subcommands for inspecting threads, printing history, uploading
//! documents, and checking configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod helpers;
mod repl;

use helpers::{build_assistant, env_non_empty, init_tracing, open_database};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Colloquy — a multi-thread conversational assistant.
#[derive(Parser)]
#[command(
    name = "colloquy",
    version,
    about = "Colloquy — a multi-thread conversational assistant",
    long_about = "A conversational assistant that keeps independent, persistent \
                  conversation threads, calls tools on the model's behalf, and \
                  can answer questions about an uploaded document."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive chat REPL.
    Chat {
        /// Resume a specific thread instead of the most recent one.
        #[arg(long)]
        thread: Option<String>,

        /// Print the full answer at once instead of streaming tokens.
        #[arg(long)]
        no_stream: bool,
    },

    /// List all conversation threads.
    Threads,

    /// Print a thread's history.
    History {
        /// The thread to print.
        thread_key: String,

        /// Include tool calls and tool results.
        #[arg(long)]
        all: bool,
    },

    /// Upload a document into a thread's retrieval index.
    Upload {
        /// The thread to attach the document to.
        thread_key: String,

        /// Path to the document (PDF or plain text).
        file: std::path::PathBuf,
    },

    /// Show configuration and storage status.
    Status,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // `.env` is optional; ignore a missing file.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { thread, no_stream } => repl::cmd_chat(thread, no_stream).await,
        Commands::Threads => cmd_threads().await,
        Commands::History { thread_key, all } => cmd_history(&thread_key, all).await,
        Commands::Upload { thread_key, file } => cmd_upload(&thread_key, &file).await,
        Commands::Status => cmd_status().await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: threads
// ---------------------------------------------------------------------------

async fn cmd_threads() -> Result<()> {
    init_tracing("warn");

    let db = open_database().await?;
    let store = colloquy_store::ThreadStore::new(db);
    let threads = store.list_threads().await?;

    if threads.is_empty() {
        println!("  No threads yet. Start one with `colloquy chat`.");
        return Ok(());
    }

    println!();
    for meta in threads {
        println!(
            "  {}  {}  ({} turns)",
            meta.thread_key,
            meta.title.as_deref().unwrap_or("(untitled)"),
            meta.turn_count,
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: history
// ---------------------------------------------------------------------------

async fn cmd_history(thread_key: &str, all: bool) -> Result<()> {
    init_tracing("warn");

    let db = open_database().await?;
    let assistant = build_assistant(db)?;

    println!();
    if all {
        let turns = assistant.get_full_history(thread_key).await?;
        if turns.is_empty() {
            println!("  (thread is empty or unknown)");
        }
        for turn in turns {
            let role = turn.role.as_str();
            if turn.tool_calls.is_empty() {
                println!("  [{role}] {}", turn.text());
            } else {
                let names: Vec<&str> =
                    turn.tool_calls.iter().map(|c| c.name.as_str()).collect();
                println!("  [{role}] requested tools: {}", names.join(", "));
            }
        }
    } else {
        let history = assistant.get_history(thread_key).await?;
        if history.is_empty() {
            println!("  (thread is empty or unknown)");
        }
        for entry in history {
            println!("  [{}] {}", entry.role.as_str(), entry.content);
        }
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: upload
// ---------------------------------------------------------------------------

async fn cmd_upload(thread_key: &str, file: &std::path::Path) -> Result<()> {
    init_tracing("warn");

    let db = open_database().await?;
    let assistant = build_assistant(db)?;

    let bytes =
        std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let report = assistant
        .upload_document(thread_key, &bytes, filename)
        .await?;

    println!(
        "  Indexed {} for thread {}: {} documents, {} chunks",
        filename, thread_key, report.document_count, report.chunk_count
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status() -> Result<()> {
    init_tracing("warn");

    println!();
    println!("  Colloquy Status");
    println!("  ===============");
    println!();

    let data_dir = std::path::Path::new(helpers::DATA_DIR);
    if data_dir.exists() {
        println!("  Data directory:   OK");
    } else {
        println!("  Data directory:   MISSING (created on first chat)");
    }

    let db_path = data_dir.join(helpers::DB_FILE);
    if db_path.exists() {
        println!("  Database:         OK ({})", db_path.display());
    } else {
        println!("  Database:         NOT INITIALIZED");
    }

    match helpers::resolve_llm_config() {
        Ok(cfg) => println!("  Provider:         {:?} ({})", cfg.provider, cfg.model),
        Err(e) => println!("  Provider:         ERROR ({e})"),
    }

    if env_non_empty("BRAVE_API_KEY").is_some() {
        println!("  Web search:       brave + duckduckgo");
    } else {
        println!("  Web search:       duckduckgo");
    }
    if env_non_empty("ALPHAVANTAGE_API_KEY").is_some() {
        println!("  Stock quotes:     alphavantage");
    } else {
        println!("  Stock quotes:     stooq");
    }
    if env_non_empty("OPENAI_API_KEY").is_some() {
        println!("  Embeddings:       openai");
    } else {
        println!("  Embeddings:       local hash");
    }

    println!();
    Ok(())
}
