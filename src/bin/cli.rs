//! segkv CLI
//!
//! Command-line interface for a segkv data directory.

use std::path::Path;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use segkv::segment::{discover_segments, SegmentRecovery};
use segkv::{Config, SegKvError, Store};
use tracing_subscriber::{fmt, EnvFilter};

/// segkv CLI
#[derive(Parser, Debug)]
#[command(name = "segkv")]
#[command(about = "Log-structured key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./segkv_data")]
    data_dir: String,

    /// Segment size limit in KB before rotation
    #[arg(short = 'm', long, default_value = "10240")]
    max_segment_kb: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Scan every segment file and report its contents
    Segments,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,segkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match &args.command {
        Commands::Get { key } => get(&args, key),
        Commands::Put { key, value } => put(&args, key, value),
        Commands::Segments => list_segments(Path::new(&args.data_dir)),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn config(args: &Args) -> Config {
    Config::builder()
        .data_dir(&args.data_dir)
        .max_segment_size(args.max_segment_kb * 1024)
        .build()
}

fn get(args: &Args, key: &str) -> segkv::Result<ExitCode> {
    let store = Store::open_existing(config(args))?;

    let code = match store.get(key) {
        Ok(value) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Err(SegKvError::KeyNotFound) => {
            eprintln!("(not found)");
            ExitCode::FAILURE
        }
        Err(e) => return Err(e),
    };

    store.close()?;
    Ok(code)
}

fn put(args: &Args, key: &str, value: &str) -> segkv::Result<ExitCode> {
    let store = Store::open(config(args))?;
    store.put(key, value)?;
    store.close()?;
    println!("OK");
    Ok(ExitCode::SUCCESS)
}

fn list_segments(dir: &Path) -> segkv::Result<ExitCode> {
    let segments = discover_segments(dir)?;
    if segments.is_empty() {
        println!("no segments in {}", dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<10} {:>10} {:>14} {:>14}  {}",
        "SEGMENT", "ENTRIES", "VALID BYTES", "FILE BYTES", "STATUS"
    );

    let mut healthy = true;
    for (id, path) in segments {
        match SegmentRecovery::verify(&path) {
            Ok(result) => {
                let status = if result.was_truncated { "truncated tail" } else { "ok" };
                println!(
                    "{:<10} {:>10} {:>14} {:>14}  {}",
                    id, result.entries_recovered, result.valid_bytes, result.file_bytes, status
                );
            }
            Err(e) => {
                healthy = false;
                println!("{:<10} {:>10} {:>14} {:>14}  {}", id, "-", "-", "-", e);
            }
        }
    }

    Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
