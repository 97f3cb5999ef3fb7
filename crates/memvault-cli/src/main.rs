//! Debug and inspection CLI over the memvault block store.
//!
//! Owns the one store instance for the process: it is constructed here,
//! passed down by reference, and closed before exit.

use anyhow::Context;
use chrono::DateTime;
use clap::{Parser, Subcommand};
use log::info;
use memvault_store::{
    BlockDraft, BlockStore, StaticProbe, StoreOptions, block_preview,
};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::PathBuf;

/// Command-line options for the memvault inspector.
#[derive(Parser)]
#[command(name = "memvault", version)]
struct Cli {
    /// Directory holding the store database
    #[arg(long, default_value = ".memvault")]
    root: PathBuf,
    /// Store name; the database file is <store-name>.db
    #[arg(long)]
    store_name: Option<String>,
    /// Table name for block records
    #[arg(long)]
    table: Option<String>,
    /// Schema version to record on open
    #[arg(long)]
    schema_version: Option<u32>,
    /// Force the in-memory backend
    #[arg(long)]
    in_memory: bool,
    #[command(subcommand)]
    command: Command,
}

/// Inspector subcommands, one per store operation.
#[derive(Subcommand)]
enum Command {
    /// Import block drafts from a JSON-lines file
    Import { file: PathBuf },
    /// Print one block as JSON
    Get { id: String },
    /// List the blocks of a session in storage order
    List { session_url: String },
    /// List distinct sessions with block counts
    Sessions,
    /// Print aggregate store statistics
    Stats,
    /// Delete one block by id
    Delete { id: String },
    /// Remove the blocks of one session, or every block
    Clear {
        /// Only remove blocks for this session url
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut options = StoreOptions::new(&cli.root);
    if let Some(store_name) = &cli.store_name {
        options = options.with_store_name(store_name);
    }
    if let Some(table) = &cli.table {
        options = options.with_table(table);
    }
    if let Some(schema_version) = cli.schema_version {
        options = options.with_schema_version(schema_version);
    }

    let store = if cli.in_memory {
        BlockStore::open_with_probe(options, &StaticProbe(false)).await
    } else {
        BlockStore::open(options).await
    };
    info!("store opened (durable={})", store.is_durable());

    let result = run(&store, cli.command).await;
    store.close().await;
    result
}

/// Execute one subcommand against the opened store.
async fn run(store: &BlockStore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Import { file } => {
            let reader = std::fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let mut saved = 0usize;
            let mut failed = 0usize;
            for (index, line) in std::io::BufReader::new(reader).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let draft: BlockDraft = match serde_json::from_str(&line) {
                    Ok(draft) => draft,
                    Err(err) => {
                        eprintln!("line {}: {err}", index + 1);
                        failed += 1;
                        continue;
                    }
                };
                match store.save(draft).await {
                    Ok(_) => saved += 1,
                    Err(err) => {
                        eprintln!("line {}: {err}", index + 1);
                        failed += 1;
                    }
                }
            }
            println!("imported {saved} blocks ({failed} failed)");
        }
        Command::Get { id } => match store.get(&id).await? {
            Some(record) => {
                println!("{}", serde_json::to_string_pretty(&record)?);
                if let Some(embedding) = &record.embedding {
                    println!("embedding: {} bytes", embedding.len());
                }
            }
            None => println!("not found"),
        },
        Command::List { session_url } => {
            let records = store.get_by_session(&session_url).await?;
            if records.is_empty() {
                println!("no blocks for {session_url}");
                return Ok(());
            }
            for record in &records {
                println!(
                    "{} [{}..{}] {} {}",
                    record.id,
                    record.start_ordinal,
                    record.end_ordinal,
                    format_timestamp(record.timestamp),
                    block_preview(record)
                );
            }
        }
        Command::Sessions => {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for record in store.get_all().await? {
                *counts.entry(record.session_url).or_default() += 1;
            }
            if counts.is_empty() {
                println!("store is empty");
                return Ok(());
            }
            for (session_url, blocks) in counts {
                println!("{session_url}: {blocks} blocks");
            }
        }
        Command::Stats => {
            let stats = store.stats().await?;
            println!("blocks: {}", stats.blocks);
            println!("messages: {}", stats.messages);
            println!("sessions: {}", stats.sessions);
        }
        Command::Delete { id } => {
            if store.delete(&id).await? {
                println!("deleted {id}");
            } else {
                println!("not found");
            }
        }
        Command::Clear { session } => {
            let removed = store.clear(session.as_deref()).await?;
            println!("removed {removed} blocks");
        }
    }
    Ok(())
}

/// Render an epoch-millisecond timestamp for display.
fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|when| when.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::format_timestamp;
    use pretty_assertions::assert_eq;

    #[test]
    fn format_timestamp_renders_rfc3339() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn format_timestamp_falls_back_to_raw_millis() {
        assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
    }
}
