//! Subcommand: `colloquy chat` — interactive REPL.
//!
//! Streams answers token by token, keeps a current thread, and supports
//! meta-commands for switching threads and uploading documents — the same
//! operations the original chat sidebar offered.

use std::io::{self, Write as _};

use anyhow::{Context, Result};
use tracing::info;

use colloquy_engine::{Assistant, Role, StreamItem};

use crate::helpers::{build_assistant, init_tracing, open_database};

/// Run the interactive chat REPL.
pub async fn cmd_chat(thread: Option<String>, no_stream: bool) -> Result<()> {
    init_tracing("warn");

    let db = open_database().await?;
    let assistant = build_assistant(db)?;

    // Resume the requested thread, else the most recently updated one, else
    // start fresh.
    let mut current_thread = match thread {
        Some(key) => key,
        None => match assistant.list_threads().await?.first() {
            Some(meta) => {
                println!(
                    "  Resuming thread: {} ({} turns)",
                    meta.title.as_deref().unwrap_or(&meta.thread_key),
                    meta.turn_count
                );
                meta.thread_key.clone()
            }
            None => assistant.create_thread(),
        },
    };

    print_banner(&current_thread);

    let stdin = io::stdin();
    let mut line_buf = String::new();

    loop {
        print!("> ");
        io::stdout().flush().ok();

        line_buf.clear();
        match stdin.read_line(&mut line_buf) {
            Ok(0) => {
                println!();
                info!("EOF received, exiting");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("  Error reading input: {e}");
                continue;
            }
        }

        let trimmed = line_buf.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        if let Some(rest) = trimmed.strip_prefix('/') {
            match handle_meta_command(&assistant, &mut current_thread, rest).await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => {
                    eprintln!("  Error: {e}");
                    continue;
                }
            }
        }

        if no_stream {
            match assistant.submit_user_message(&current_thread, trimmed).await {
                Ok(turn) => println!("{}\n", turn.text()),
                Err(e) => eprintln!("\n  Error: {e}\n"),
            }
            continue;
        }

        let mut rx = assistant.stream_user_message(&current_thread, trimmed).await;
        let mut streamed_anything = false;
        while let Some(item) = rx.recv().await {
            match item {
                StreamItem::Fragment(fragment) => {
                    streamed_anything = true;
                    print!("{fragment}");
                    io::stdout().flush().ok();
                }
                StreamItem::Final(turn) => {
                    if !streamed_anything {
                        print!("{}", turn.text());
                    }
                    println!("\n");
                }
                StreamItem::Failed(reason) => {
                    eprintln!("\n  Error: {reason}\n");
                }
            }
        }
    }

    info!("shutting down");
    Ok(())
}

/// Handle a `/command`.  Returns `Ok(false)` to exit the REPL.
async fn handle_meta_command(
    assistant: &Assistant,
    current_thread: &mut String,
    command: &str,
) -> Result<bool> {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    match name {
        "new" => {
            *current_thread = assistant.create_thread();
            println!("  Started new thread: {current_thread}");
        }
        "threads" => {
            let threads = assistant.list_threads().await?;
            if threads.is_empty() {
                println!("  No threads yet.");
            }
            for meta in threads {
                let marker = if meta.thread_key == *current_thread {
                    "*"
                } else {
                    " "
                };
                println!(
                    "  {marker} {}  {}  ({} turns)",
                    meta.thread_key,
                    meta.title.as_deref().unwrap_or("(untitled)"),
                    meta.turn_count,
                );
            }
        }
        "switch" => {
            let key = arg.context("usage: /switch <thread_key>")?;
            *current_thread = key.to_owned();
            println!("  Switched to thread: {current_thread}");
            print_history(assistant, current_thread).await?;
        }
        "history" => {
            print_history(assistant, current_thread).await?;
        }
        "upload" => {
            let path = arg.context("usage: /upload <file>")?;
            let bytes = std::fs::read(path).with_context(|| format!("failed to read {path}"))?;
            let filename = std::path::Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path);

            match assistant
                .upload_document(current_thread, &bytes, filename)
                .await
            {
                Ok(report) => println!(
                    "  Indexed {} ({} documents, {} chunks)",
                    filename, report.document_count, report.chunk_count
                ),
                Err(e) => println!("  Upload failed: {e}"),
            }
        }
        "quit" | "exit" => return Ok(false),
        other => {
            println!("  Unknown command: /{other}");
            println!("  Commands: /new /threads /switch <key> /history /upload <file> /quit");
        }
    }

    Ok(true)
}

async fn print_history(assistant: &Assistant, thread_key: &str) -> Result<()> {
    let history = assistant.get_history(thread_key).await?;
    if history.is_empty() {
        println!("  (no messages yet)");
        return Ok(());
    }
    for entry in history {
        let who = match entry.role {
            Role::User => "you",
            _ => "assistant",
        };
        println!("  [{who}] {}", entry.content);
    }
    Ok(())
}

fn print_banner(thread_key: &str) {
    println!();
    println!("  Colloquy v{}", env!("CARGO_PKG_VERSION"));
    println!("  Thread: {thread_key}");
    println!("  Tools: calculator, web_search, get_stock_price, get_weather, retrieve_document");
    println!("  Type a message, /threads to browse, /upload <file> to add a document,");
    println!("  or 'quit' to exit.");
    println!();
}
