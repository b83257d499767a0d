//! Identity and progress types for the sync protocol.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a sync session.
///
/// The replay treats it as a tag carried in every message header; no
/// session state hangs off it.
pub type SessionIdent = u64;

/// A client file identifier paired with a random salt.
///
/// The salt detects forks across client reinitializations: a wiped client
/// that re-binds to the server receives a fresh salt even if it is handed
/// the same ident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaltedFileIdent {
    /// Server-assigned file identifier.
    pub ident: u64,
    /// Random salt bound to this assignment.
    pub salt: i64,
}

/// A server version paired with the salt of the server state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaltedVersion {
    /// The server version.
    pub version: u64,
    /// Salt of the snapshot that produced this version.
    pub salt: i64,
}

/// Progress marker for the download direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadCursor {
    /// Latest server version integrated locally.
    pub server_version: u64,
    /// Latest client version the server had integrated when it produced
    /// that server version.
    pub last_integrated_client_version: u64,
}

/// Progress marker for the upload direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadCursor {
    /// Latest client version sent to the server.
    pub client_version: u64,
    /// Latest server version integrated when that client version was
    /// produced.
    pub last_integrated_server_version: u64,
}

/// Paired download/upload cursors exchanged to resume synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Download-direction cursor.
    pub download: DownloadCursor,
    /// Upload-direction cursor.
    pub upload: UploadCursor,
}

/// Versions produced by integrating a batch of server changesets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    /// State version after the integrating commit.
    pub state_version: u64,
    /// Server version the download cursor points at afterwards.
    pub server_version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn salted_ident_roundtrip() {
        let ident = SaltedFileIdent {
            ident: 7,
            salt: 1234567890,
        };

        let bytes = rmp_serde::to_vec(&ident).unwrap();
        let restored: SaltedFileIdent = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(ident, restored);
    }

    #[test]
    fn salted_ident_salt_is_signed() {
        let ident = SaltedFileIdent {
            ident: 1,
            salt: -42,
        };

        let bytes = rmp_serde::to_vec(&ident).unwrap();
        let restored: SaltedFileIdent = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(restored.salt, -42);
    }

    #[test]
    fn progress_defaults_to_zero_cursors() {
        let progress = SyncProgress::default();
        assert_eq!(progress.download.server_version, 0);
        assert_eq!(progress.upload.client_version, 0);
    }
}
