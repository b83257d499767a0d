//! The replay driver.
//!
//! Walks the recorded stream message by message and applies each one to
//! the state store: IDENT sets the client file ident, DOWNLOAD batches go
//! to the history integrator, UPLOAD changesets are applied one write
//! transaction each.

use bytes::Bytes;
use sync_state::{InstructionApplier, StateError, StateStore};
use sync_wire::{parse_message, Message, WireError};
use thiserror::Error;

/// Errors that terminate a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The input stream failed to parse.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The state store rejected an operation.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Replay a recorded message stream against `store`.
///
/// Messages are applied strictly in input order. Within a download the
/// whole changeset batch goes to the integrator in one call; an
/// integration failure is logged and the replay continues. Within an
/// upload every changeset commits its own write transaction, preserving
/// per-changeset version numbering. Any other failure ends the run,
/// leaving whatever prior transactions committed.
pub fn replay(input: Bytes, store: &mut StateStore) -> Result<(), ReplayError> {
    let mut cursor = input;
    while !cursor.is_empty() {
        let (message, rest) = parse_message(&cursor).map_err(|err| {
            tracing::error!("could not parse message in input stream: {}", err);
            err
        })?;
        cursor = rest;

        match message {
            Message::Ident(ident) => {
                store
                    .history()
                    .set_client_file_ident(ident.file_ident, true)?;
            }
            Message::Download(download) => {
                let outcome = store.history().integrate_server_changesets(
                    &download.progress,
                    download.downloadable_bytes,
                    &download.changesets,
                )?;
                if let Some(error) = outcome.error {
                    tracing::error!("failed to integrate download message: {}", error);
                }
            }
            Message::Upload(upload) => {
                for changeset in &upload.changesets {
                    let mut tx = store.start_write()?;
                    let mut applier = InstructionApplier::new(&mut tx);
                    applier.apply(changeset)?;
                    let version = tx.commit()?;
                    tracing::debug!("integrated local changeset as version {}", version);
                }
            }
        }
    }
    Ok(())
}
