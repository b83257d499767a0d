//! Client history: ident assignment and server-changeset integration.

use rusqlite::{params, TransactionBehavior};
use sync_types::{RemoteChangeset, SaltedFileIdent, SyncProgress, VersionInfo};

use crate::error::{IntegrationError, StateResult};
use crate::store::{
    bump_state_version, meta_u64, set_meta_i64, set_meta_u64, StateStore,
};

/// Outcome of [`ClientHistory::integrate_server_changesets`].
#[derive(Debug)]
pub struct IntegrationOutcome {
    /// Versions after the integration attempt.
    pub version_info: VersionInfo,
    /// Set when the batch was rejected; the store is left untouched.
    pub error: Option<IntegrationError>,
}

/// Borrowed view of the store for history operations.
pub struct ClientHistory<'a> {
    store: &'a mut StateStore,
}

impl<'a> ClientHistory<'a> {
    pub(crate) fn new(store: &'a mut StateStore) -> Self {
        Self { store }
    }

    /// Persist the server-assigned client file ident.
    ///
    /// With `fix_up_object_ids`, local history rows recorded under the
    /// placeholder file ident 0 are rewritten to the assigned ident.
    pub fn set_client_file_ident(
        &mut self,
        file_ident: SaltedFileIdent,
        fix_up_object_ids: bool,
    ) -> StateResult<()> {
        let tx = self
            .store
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        set_meta_u64(&tx, "client_file_ident", file_ident.ident)?;
        set_meta_i64(&tx, "client_file_ident_salt", file_ident.salt)?;

        if fix_up_object_ids {
            let fixed = tx.execute(
                "UPDATE client_history SET origin_file_ident = ?1 WHERE origin_file_ident = 0",
                params![file_ident.ident as i64],
            )?;
            if fixed > 0 {
                tracing::debug!(
                    "rewrote {} local history entries to file ident {}",
                    fixed,
                    file_ident.ident
                );
            }
        }

        tx.commit()?;
        tracing::debug!(
            "client file ident set to {} (salt {})",
            file_ident.ident,
            file_ident.salt
        );
        Ok(())
    }

    /// Integrate a batch of server changesets in body order.
    ///
    /// The whole batch lands in one transaction together with the advanced
    /// progress cursors. A batch failing validation is rolled back and
    /// reported through [`IntegrationOutcome::error`]; the caller decides
    /// whether that ends the run.
    pub fn integrate_server_changesets(
        &mut self,
        progress: &SyncProgress,
        downloadable_bytes: u64,
        changesets: &[RemoteChangeset],
    ) -> StateResult<IntegrationOutcome> {
        let StateStore { conn, cipher } = &mut *self.store;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored_server_version = meta_u64(&tx, "download_server_version")?;
        let stored_client_version = meta_u64(&tx, "upload_client_version")?;

        let mut error = validate_progress(
            stored_server_version,
            stored_client_version,
            progress,
        );
        if error.is_none() {
            let mut integrated = stored_server_version;
            for changeset in changesets {
                if changeset.remote_version <= integrated {
                    error = Some(IntegrationError::OutOfOrderVersion {
                        remote_version: changeset.remote_version,
                        integrated,
                    });
                    break;
                }
                integrated = changeset.remote_version;
            }
        }

        if let Some(error) = error {
            drop(tx);
            let state_version = meta_u64(conn, "state_version")?;
            return Ok(IntegrationOutcome {
                version_info: VersionInfo {
                    state_version,
                    server_version: stored_server_version,
                },
                error: Some(error),
            });
        }

        for changeset in changesets {
            let (nonce, data): (Option<Vec<u8>>, Vec<u8>) = match cipher {
                Some(cipher) => {
                    let (sealed, nonce) = cipher.seal(&changeset.data)?;
                    (Some(nonce.to_vec()), sealed)
                }
                None => (None, changeset.data.to_vec()),
            };
            tx.execute(
                "INSERT INTO server_history \
                 (remote_version, last_integrated_local_version, origin_timestamp, \
                  origin_file_ident, original_size, nonce, data) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    changeset.remote_version as i64,
                    changeset.last_integrated_local_version as i64,
                    changeset.origin_timestamp as i64,
                    changeset.origin_file_ident as i64,
                    changeset.original_changeset_size as i64,
                    nonce,
                    data,
                ],
            )?;
        }

        set_meta_u64(&tx, "download_server_version", progress.download.server_version)?;
        set_meta_u64(
            &tx,
            "download_last_integrated_client_version",
            progress.download.last_integrated_client_version,
        )?;
        set_meta_u64(&tx, "upload_client_version", progress.upload.client_version)?;
        set_meta_u64(
            &tx,
            "upload_last_integrated_server_version",
            progress.upload.last_integrated_server_version,
        )?;
        set_meta_u64(&tx, "downloadable_bytes", downloadable_bytes)?;

        let state_version = bump_state_version(&tx)?;
        tx.commit()?;

        tracing::debug!(
            "integrated {} server changeset(s) up to server version {} as state version {}",
            changesets.len(),
            progress.download.server_version,
            state_version
        );

        Ok(IntegrationOutcome {
            version_info: VersionInfo {
                state_version,
                server_version: progress.download.server_version,
            },
            error: None,
        })
    }
}

fn validate_progress(
    stored_server_version: u64,
    stored_client_version: u64,
    progress: &SyncProgress,
) -> Option<IntegrationError> {
    if progress.download.server_version < stored_server_version {
        return Some(IntegrationError::ProgressRegression {
            cursor: "download",
            from: stored_server_version,
            to: progress.download.server_version,
        });
    }
    if progress.upload.client_version < stored_client_version {
        return Some(IntegrationError::ProgressRegression {
            cursor: "upload",
            from: stored_client_version,
            to: progress.upload.client_version,
        });
    }
    None
}
