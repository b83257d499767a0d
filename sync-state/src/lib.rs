//! # sync-state
//!
//! The embedded database a replay reconstructs client state into.
//!
//! [`StateStore`] owns a SQLite file holding the applied object state, the
//! local and server changeset history, and the sync metadata (client file
//! ident, progress cursors, state version counter). Local changesets are
//! applied through [`InstructionApplier`] inside a [`WriteTransaction`];
//! server changesets are integrated in batches through [`ClientHistory`].

#![warn(clippy::all)]

mod applier;
mod encrypt;
mod error;
mod history;
mod store;

pub use applier::InstructionApplier;
pub use encrypt::EncryptionKey;
pub use error::{IntegrationError, StateError, StateResult};
pub use history::{ClientHistory, IntegrationOutcome};
pub use store::{StateStore, WriteTransaction};
