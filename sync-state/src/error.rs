//! Error types for sync-state.

use thiserror::Error;

/// Main error type for state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The state file was created by an incompatible version.
    #[error("state file schema version mismatch: expected {expected}, got {got}")]
    SchemaVersionMismatch {
        /// Schema version this build writes.
        expected: u32,
        /// Schema version found in the file.
        got: u32,
    },

    /// The encryption key file does not hold exactly 64 bytes.
    #[error("encryption key must be exactly {expected} bytes, got {got}")]
    BadEncryptionKey {
        /// Required key file size.
        expected: usize,
        /// Size that was provided.
        got: usize,
    },

    /// Payload encryption failed.
    #[error("payload encryption failed: {0}")]
    Encrypt(String),

    /// Payload decryption or authentication failed.
    #[error("payload decryption failed")]
    Decrypt,

    /// A `Set` instruction addressed an object that does not exist.
    #[error("cannot set field on missing object {object:?} in table {table:?}")]
    MissingObject {
        /// Table the instruction addressed.
        table: String,
        /// Object key the instruction addressed.
        object: String,
    },

    /// A local changeset carried a client version already in history.
    #[error("client version {version} is already recorded in history")]
    DuplicateClientVersion {
        /// The duplicated client version.
        version: u64,
    },

    /// Value encode/decode failure.
    #[error(transparent)]
    Codec(#[from] sync_types::ChangesetCodecError),
}

/// Result alias for state store operations.
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Non-fatal outcome of integrating a batch of server changesets.
///
/// Carried as a value inside `IntegrationOutcome`, never as an `Err`:
/// a rejected batch leaves the store untouched and the replay goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrationError {
    /// A changeset's server version is not ahead of what is integrated.
    #[error("server changeset version {remote_version} is not ahead of integrated version {integrated}")]
    OutOfOrderVersion {
        /// Version carried by the offending changeset.
        remote_version: u64,
        /// Version integration had reached.
        integrated: u64,
    },

    /// The declared progress would move a cursor backwards.
    #[error("sync progress would move the {cursor} cursor backwards ({from} -> {to})")]
    ProgressRegression {
        /// Which cursor would regress.
        cursor: &'static str,
        /// Stored cursor value.
        from: u64,
        /// Declared cursor value.
        to: u64,
    },
}
