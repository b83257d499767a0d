//! Embedded SQLite state store.

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, TransactionBehavior};
use sync_types::{DownloadCursor, SaltedFileIdent, SyncProgress, UploadCursor};

use crate::encrypt::{EncryptionKey, PayloadCipher};
use crate::error::{StateError, StateResult};
use crate::history::ClientHistory;

const SCHEMA_VERSION: u32 = 1;
const BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sync_meta (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

INSERT OR IGNORE INTO sync_meta (key, value) VALUES
    ('state_version', 0),
    ('client_file_ident', 0),
    ('client_file_ident_salt', 0),
    ('download_server_version', 0),
    ('download_last_integrated_client_version', 0),
    ('upload_client_version', 0),
    ('upload_last_integrated_server_version', 0),
    ('downloadable_bytes', 0);

CREATE TABLE IF NOT EXISTS objects (
    tbl TEXT NOT NULL,
    obj TEXT NOT NULL,
    field TEXT NOT NULL,
    value BLOB,
    PRIMARY KEY (tbl, obj, field)
);

CREATE TABLE IF NOT EXISTS client_history (
    version INTEGER PRIMARY KEY,
    last_integrated_remote_version INTEGER NOT NULL,
    origin_timestamp INTEGER NOT NULL,
    origin_file_ident INTEGER NOT NULL,
    instruction_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS server_history (
    remote_version INTEGER PRIMARY KEY,
    last_integrated_local_version INTEGER NOT NULL,
    origin_timestamp INTEGER NOT NULL,
    origin_file_ident INTEGER NOT NULL,
    original_size INTEGER NOT NULL,
    nonce BLOB,
    data BLOB NOT NULL
);
"#;

/// The embedded database a replay reconstructs client state into.
#[derive(Debug)]
pub struct StateStore {
    pub(crate) conn: Connection,
    pub(crate) cipher: Option<PayloadCipher>,
}

impl StateStore {
    /// Open a state file, creating it if missing.
    ///
    /// When `key` is given, changeset payloads are encrypted at rest.
    pub fn open(path: &Path, key: Option<&EncryptionKey>) -> StateResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)?;
        Self::from_connection(conn, key)
    }

    /// Open an in-memory store (for testing).
    pub fn in_memory() -> StateResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, key: Option<&EncryptionKey>) -> StateResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        initialize_schema(&conn)?;

        let cipher = key.map(PayloadCipher::new).transpose()?;
        Ok(Self { conn, cipher })
    }

    /// Begin a write transaction.
    ///
    /// The transaction holds the store exclusively until it is committed
    /// or dropped; dropping without commit rolls back.
    pub fn start_write(&mut self) -> StateResult<WriteTransaction<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(WriteTransaction { tx })
    }

    /// History operations (ident assignment, server-changeset integration).
    pub fn history(&mut self) -> ClientHistory<'_> {
        ClientHistory::new(self)
    }

    /// Current state version (bumped once per committed transaction).
    pub fn state_version(&self) -> StateResult<u64> {
        meta_u64(&self.conn, "state_version")
    }

    /// The client file ident recorded by the last IDENT message, if any.
    pub fn client_file_ident(&self) -> StateResult<SaltedFileIdent> {
        Ok(SaltedFileIdent {
            ident: meta_u64(&self.conn, "client_file_ident")?,
            salt: meta_i64(&self.conn, "client_file_ident_salt")?,
        })
    }

    /// The sync progress recorded by the last integrated download.
    pub fn progress(&self) -> StateResult<SyncProgress> {
        Ok(SyncProgress {
            download: DownloadCursor {
                server_version: meta_u64(&self.conn, "download_server_version")?,
                last_integrated_client_version: meta_u64(
                    &self.conn,
                    "download_last_integrated_client_version",
                )?,
            },
            upload: UploadCursor {
                client_version: meta_u64(&self.conn, "upload_client_version")?,
                last_integrated_server_version: meta_u64(
                    &self.conn,
                    "upload_last_integrated_server_version",
                )?,
            },
        })
    }

    /// Bytes the server reported still queued for download.
    pub fn downloadable_bytes(&self) -> StateResult<u64> {
        meta_u64(&self.conn, "downloadable_bytes")
    }

    /// Whether `(table, object)` exists in the applied state.
    pub fn object_exists(&self, table: &str, object: &str) -> StateResult<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM objects WHERE tbl = ?1 AND obj = ?2 AND field = '')",
            params![table, object],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Raw MessagePack value of one object field, if set.
    pub fn object_field(
        &self,
        table: &str,
        object: &str,
        field: &str,
    ) -> StateResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM objects WHERE tbl = ?1 AND obj = ?2 AND field = ?3",
                params![table, object, field],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Number of objects in one table.
    pub fn object_count(&self, table: &str) -> StateResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM objects WHERE tbl = ?1 AND field = ''",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Client versions recorded in local history, in version order.
    pub fn client_history_versions(&self) -> StateResult<Vec<u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT version FROM client_history ORDER BY version")?;
        let versions = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|v| v.map(|v| v as u64))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    /// Number of server changesets integrated so far.
    pub fn server_changeset_count(&self) -> StateResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM server_history", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Payload of one integrated server changeset, decrypted if the store
    /// holds a key.
    pub fn server_changeset_data(&self, remote_version: u64) -> StateResult<Option<Vec<u8>>> {
        let row = self
            .conn
            .query_row(
                "SELECT nonce, data FROM server_history WHERE remote_version = ?1",
                params![remote_version as i64],
                |row| {
                    Ok((
                        row.get::<_, Option<Vec<u8>>>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((None, data)) => Ok(Some(data)),
            Some((Some(nonce), data)) => {
                let cipher = self.cipher.as_ref().ok_or(StateError::Decrypt)?;
                Ok(Some(cipher.open(&nonce, &data)?))
            }
        }
    }
}

/// An open write transaction on the state store.
pub struct WriteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl WriteTransaction<'_> {
    /// Commit, bumping the state version; returns the new version.
    pub fn commit(self) -> StateResult<u64> {
        let version = bump_state_version(&self.tx)?;
        self.tx.commit()?;
        Ok(version)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.tx
    }
}

fn initialize_schema(conn: &Connection) -> StateResult<()> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    match version {
        0 => {
            conn.execute_batch(SCHEMA)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        got => Err(StateError::SchemaVersionMismatch {
            expected: SCHEMA_VERSION,
            got,
        }),
    }
}

pub(crate) fn bump_state_version(conn: &Connection) -> StateResult<u64> {
    let version: i64 = conn.query_row(
        "UPDATE sync_meta SET value = value + 1 WHERE key = 'state_version' RETURNING value",
        [],
        |row| row.get(0),
    )?;
    Ok(version as u64)
}

pub(crate) fn meta_u64(conn: &Connection, key: &str) -> StateResult<u64> {
    let value: i64 = conn.query_row(
        "SELECT value FROM sync_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )?;
    Ok(value as u64)
}

pub(crate) fn meta_i64(conn: &Connection, key: &str) -> StateResult<i64> {
    let value = conn.query_row(
        "SELECT value FROM sync_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )?;
    Ok(value)
}

pub(crate) fn set_meta_u64(conn: &Connection, key: &str, value: u64) -> StateResult<()> {
    conn.execute(
        "UPDATE sync_meta SET value = ?2 WHERE key = ?1",
        params![key, value as i64],
    )?;
    Ok(())
}

pub(crate) fn set_meta_i64(conn: &Connection, key: &str, value: i64) -> StateResult<()> {
    conn.execute(
        "UPDATE sync_meta SET value = ?2 WHERE key = ?1",
        params![key, value],
    )?;
    Ok(())
}
