//! blobstore CLI - Command line interface for blob_store
//!
//! Every invocation opens the store, runs one command and prints the result
//! as JSON. Set `RUST_LOG=debug` to see what the store does on stderr.

use anyhow::Context;
use blob_store::{default_store_dir, BlobStore, StoreOptions};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blobstore")]
#[command(about = "A content-addressed blob store with a durable key index")]
#[command(version)]
struct Cli {
    /// Working directory of the store [default: <data dir>/blobstore]
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// JSON file with store options
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file (or stdin) under a key
    Put {
        /// The key
        key: String,
        /// File to store; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Write the content stored under a key
    Get {
        /// The key
        key: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Remove a key
    Rm {
        /// The key
        key: String,
    },

    /// List all keys and their digests
    Ls,

    /// Report index entries without blobs and blobs without keys
    Verify,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut store = open_store(&cli)?;

    match cli.command {
        Commands::Put { key, file } => {
            let digest = match file {
                Some(path) => {
                    let file = File::open(&path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    store.put(&key, file)?
                }
                None => store.put(&key, io::stdin().lock())?,
            };
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "digest": digest.to_hex()
                }),
            )?;
        }

        Commands::Get { key, output: target } => {
            let Some(mut reader) = store.get(&key)? else {
                output(
                    cli.format,
                    &serde_json::json!({
                        "status": "error",
                        "message": format!("Key not found: {}", key)
                    }),
                )?;
                std::process::exit(1);
            };
            match target {
                Some(path) => {
                    let mut file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    io::copy(&mut reader, &mut file)?;
                }
                None => {
                    let mut stdout = io::stdout().lock();
                    io::copy(&mut reader, &mut stdout)?;
                    stdout.flush()?;
                }
            }
        }

        Commands::Rm { key } => {
            let existed = store.contains(&key);
            store.remove(&key)?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "removed": existed
                }),
            )?;
        }

        Commands::Ls => {
            let entries = store.entries();
            output(
                cli.format,
                &serde_json::json!({
                    "count": entries.len(),
                    "entries": entries
                }),
            )?;
        }

        Commands::Verify => {
            let report = store.verify()?;
            output(
                cli.format,
                &serde_json::json!({
                    "clean": report.is_clean(),
                    "missing": report.missing,
                    "orphaned": report.orphaned
                }),
            )?;
        }
    }

    Ok(())
}

fn open_store(cli: &Cli) -> anyhow::Result<BlobStore> {
    let options = match &cli.config {
        Some(path) => StoreOptions::load(path)?,
        None => StoreOptions::default(),
    };
    let dir = match &cli.dir {
        Some(dir) => dir.clone(),
        None => default_store_dir()?,
    };
    let store = BlobStore::open_with(&dir, options)
        .with_context(|| format!("Failed to open store at {}", dir.display()))?;
    Ok(store)
}

fn output(format: OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::Text => serde_json::to_string_pretty(value)?,
    };
    println!("{}", text);
    Ok(())
}
