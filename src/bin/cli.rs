//! CaskKV CLI
//!
//! Command-line interface over a local CaskKV log file.

use std::path::PathBuf;
use std::process::ExitCode;

use caskkv::{CaskError, Engine};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// CaskKV CLI
#[derive(Parser, Debug)]
#[command(name = "caskkv")]
#[command(about = "Log-structured key-value store")]
#[command(version)]
struct Args {
    /// Path to the database file
    #[arg(long, default_value = "bitcask.db")]
    db: PathBuf,

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
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Compact the log down to live keys
    Merge,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), CaskError> {
    let engine = Engine::open_path(&args.db)?;

    match args.command {
        Commands::Get { key } => {
            let value = engine.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::Set { key, value } => {
            engine.set(key.as_bytes(), value.as_bytes())?;
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("Key deleted successfully");
        }
        Commands::Merge => {
            engine.merge()?;
            println!("Database merged successfully");
        }
    }

    engine.close()
}
