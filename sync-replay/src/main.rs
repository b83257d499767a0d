//! sync-replay binary entry point.
//!
//! Replays a recorded stream of sync-protocol messages (IDENT, DOWNLOAD,
//! UPLOAD) against a local state database, reconstructing the client state
//! the recording describes.
//!
//! ```bash
//! sync-replay -r state.db -i messages.bin
//! sync-replay -r state.db -i messages.bin -e key.bin --verbose
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use sync_state::{EncryptionKey, StateStore};

mod replay;

/// Replay recorded sync messages against a local state database.
#[derive(Parser, Debug)]
#[command(name = "sync-replay")]
#[command(version, about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Path to the state database to create and/or apply messages to
    #[arg(short = 'r', long = "realm", value_name = "PATH")]
    realm: PathBuf,

    /// Path to a file of recorded IDENT, DOWNLOAD, and UPLOAD messages
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Path to a file holding a 64-byte database encryption key
    #[arg(short, long = "encryption-key", value_name = "PATH")]
    encryption_key: Option<PathBuf>,

    /// Print all messages, including per-changeset trace output, to stderr
    #[arg(long)]
    verbose: bool,

    /// Print version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Unrecognized arguments are collected and ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    ignored: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let threshold = if cli.verbose {
        tracing::Level::TRACE
    } else {
        tracing::Level::ERROR
    };
    tracing_subscriber::fmt()
        .with_max_level(threshold)
        .with_writer(std::io::stderr)
        .init();

    if !cli.ignored.is_empty() {
        tracing::debug!("ignoring {} unrecognized argument(s)", cli.ignored.len());
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let key = match &cli.encryption_key {
        Some(path) => {
            let bytes = std::fs::read(path).with_context(|| {
                format!("failed to read encryption key file {}", path.display())
            })?;
            Some(EncryptionKey::from_bytes(&bytes)?)
        }
        None => None,
    };

    let mut store = StateStore::open(&cli.realm, key.as_ref())
        .with_context(|| format!("failed to open state database {}", cli.realm.display()))?;

    let input = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read message file {}", cli.input.display()))?;

    replay::replay(Bytes::from(input), &mut store)?;
    Ok(())
}
