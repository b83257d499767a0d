//! # sync-types
//!
//! Foundational types for the sync-replay tool.
//!
//! This crate provides the types shared by the wire parser and the state
//! store:
//! - [`SaltedFileIdent`], [`SaltedVersion`] - salted identity types
//! - [`DownloadCursor`], [`UploadCursor`], [`SyncProgress`] - resumption cursors
//! - [`Instruction`], [`Changeset`] - the changeset instruction model
//! - [`ChangesetCodecError`] - codec error type

#![warn(missing_docs)]
#![warn(clippy::all)]

mod changeset;
mod error;
mod ids;

pub use changeset::{
    decode_instructions, encode_instructions, Changeset, Instruction, RemoteChangeset, Value,
};
pub use error::ChangesetCodecError;
pub use ids::{
    DownloadCursor, SaltedFileIdent, SaltedVersion, SessionIdent, SyncProgress, UploadCursor,
    VersionInfo,
};
