//! Error types for sync-types.

use thiserror::Error;

/// Errors from the changeset instruction codec.
#[derive(Debug, Error)]
pub enum ChangesetCodecError {
    /// MessagePack encoding of an instruction list failed.
    #[error("instruction payload encode failed: {0}")]
    Encode(#[source] rmp_serde::encode::Error),

    /// MessagePack decoding of an instruction payload failed.
    #[error("instruction payload decode failed: {0}")]
    Decode(#[source] rmp_serde::decode::Error),
}
