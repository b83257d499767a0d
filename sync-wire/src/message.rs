//! Recorded message parsing.
//!
//! Messages are dispatched on their leading ASCII tag (`ident`,
//! `download`, `upload`), each with its own header schema and, for
//! download/upload, an embedded changeset stream inside the framed body.

use bytes::Bytes;
use sync_types::{
    decode_instructions, Changeset, DownloadCursor, RemoteChangeset, SaltedFileIdent,
    SaltedVersion, SessionIdent, SyncProgress, UploadCursor,
};

use crate::body::MessageBody;
use crate::error::{HeaderError, WireError, WireResult};
use crate::header::HeaderLine;

/// IDENT message: the server-assigned client file identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerIdentMessage {
    /// Session the assignment was observed on.
    pub session_ident: SessionIdent,
    /// The assigned ident and its salt.
    pub file_ident: SaltedFileIdent,
}

/// DOWNLOAD message: a batch of server changesets plus progress cursors.
#[derive(Debug, Clone)]
pub struct DownloadMessage {
    /// Session the download was observed on.
    pub session_ident: SessionIdent,
    /// Progress cursors declared by the server.
    pub progress: SyncProgress,
    /// Latest server version at the time of the download.
    pub latest_server_version: SaltedVersion,
    /// Bytes the server still had queued for download.
    pub downloadable_bytes: u64,
    /// The server changesets, in body order.
    pub changesets: Vec<RemoteChangeset>,
}

/// UPLOAD message: a batch of locally produced changesets.
#[derive(Debug, Clone)]
pub struct UploadMessage {
    /// Session the upload was observed on.
    pub session_ident: SessionIdent,
    /// Upload-direction cursor declared by the client.
    pub upload_progress: UploadCursor,
    /// Server version the client had locked during the upload.
    pub locked_server_version: u64,
    /// The decoded local changesets, in body order.
    pub changesets: Vec<Changeset>,
}

/// One recorded protocol message.
#[derive(Debug, Clone)]
pub enum Message {
    /// IDENT message.
    Ident(ServerIdentMessage),
    /// DOWNLOAD message.
    Download(DownloadMessage),
    /// UPLOAD message.
    Upload(UploadMessage),
}

fn header_context(context: &'static str) -> impl Fn(HeaderError) -> WireError {
    move |source| WireError::Header { context, source }
}

/// Detach one message from the front of `input`.
///
/// Returns the parsed message and the rest of the stream, which begins
/// immediately after the message's last body byte.
pub fn parse_message(input: &Bytes) -> WireResult<(Message, Bytes)> {
    let mut line = HeaderLine::new(input, b' ');
    let tag = line.token_field().map_err(header_context("message tag"))?;
    let rest = line.finish().map_err(header_context("message tag"))?;
    let after_tag = input.slice(input.len() - rest.len()..);

    match tag {
        "ident" => parse_ident(&after_tag).map(|(m, rest)| (Message::Ident(m), rest)),
        "download" => parse_download(&after_tag).map(|(m, rest)| (Message::Download(m), rest)),
        "upload" => parse_upload(&after_tag).map(|(m, rest)| (Message::Upload(m), rest)),
        _ => Err(WireError::UnknownMessageType {
            tag: tag.to_string(),
        }),
    }
}

fn parse_ident(input: &Bytes) -> WireResult<(ServerIdentMessage, Bytes)> {
    let ctx = header_context("ident message");
    let mut line = HeaderLine::new(input, b'\n');
    let session_ident: SessionIdent = line.int_field().map_err(&ctx)?;
    let ident: u64 = line.int_field().map_err(&ctx)?;
    let salt: i64 = line.int_field().map_err(&ctx)?;
    let rest = line.finish().map_err(&ctx)?;

    let message = ServerIdentMessage {
        session_ident,
        file_ident: SaltedFileIdent { ident, salt },
    };
    Ok((message, input.slice(input.len() - rest.len()..)))
}

fn parse_download(input: &Bytes) -> WireResult<(DownloadMessage, Bytes)> {
    let ctx = header_context("download message");
    let mut line = HeaderLine::new(input, b'\n');
    let session_ident: SessionIdent = line.int_field().map_err(&ctx)?;
    let download_server_version: u64 = line.int_field().map_err(&ctx)?;
    let download_last_integrated_client_version: u64 = line.int_field().map_err(&ctx)?;
    let latest_version: u64 = line.int_field().map_err(&ctx)?;
    let latest_salt: i64 = line.int_field().map_err(&ctx)?;
    let upload_client_version: u64 = line.int_field().map_err(&ctx)?;
    let upload_last_integrated_server_version: u64 = line.int_field().map_err(&ctx)?;
    let downloadable_bytes: u64 = line.int_field().map_err(&ctx)?;
    let is_body_compressed: u64 = line.int_field().map_err(&ctx)?;
    let uncompressed_body_size: usize = line.int_field().map_err(&ctx)?;
    let compressed_body_size: usize = line.int_field().map_err(&ctx)?;
    let rest = line.finish().map_err(&ctx)?;
    let after_header = input.slice(input.len() - rest.len()..);

    let progress = SyncProgress {
        download: DownloadCursor {
            server_version: download_server_version,
            last_integrated_client_version: download_last_integrated_client_version,
        },
        upload: UploadCursor {
            client_version: upload_client_version,
            last_integrated_server_version: upload_last_integrated_server_version,
        },
    };
    let latest_server_version = SaltedVersion {
        version: latest_version,
        salt: latest_salt,
    };

    let framed = MessageBody::parse(
        &after_header,
        compressed_body_size,
        uncompressed_body_size,
        is_body_compressed != 0,
    )?;

    tracing::trace!(
        "decoding download message: download {{server: {}, client: {}}}, upload {{server: {}, client: {}}}, latest: {}",
        progress.download.server_version,
        progress.download.last_integrated_client_version,
        progress.upload.last_integrated_server_version,
        progress.upload.client_version,
        latest_server_version.version
    );

    let record_ctx = header_context("download changeset");
    let mut changesets = Vec::new();
    let mut body_view = framed.body;
    while !body_view.is_empty() {
        let mut line = HeaderLine::new(&body_view, b'\n');
        let remote_version: u64 = line.int_field().map_err(&record_ctx)?;
        let last_integrated_local_version: u64 = line.int_field().map_err(&record_ctx)?;
        let origin_timestamp: u64 = line.int_field().map_err(&record_ctx)?;
        let origin_file_ident: u64 = line.int_field().map_err(&record_ctx)?;
        let original_changeset_size: u64 = line.int_field().map_err(&record_ctx)?;
        let changeset_size: usize = line.int_field().map_err(&record_ctx)?;
        let rest = line.finish().map_err(&record_ctx)?;

        let payload_start = body_view.len() - rest.len();
        let available = rest.len();
        if changeset_size > available {
            tracing::error!(
                "changeset length is {} but buffer size is {}",
                changeset_size,
                available
            );
            return Err(WireError::ChangesetTooLong {
                declared: changeset_size,
                available,
            });
        }

        let data = body_view.slice(payload_start..payload_start + changeset_size);
        if tracing::enabled!(tracing::Level::TRACE) {
            // Trace-only decode of the opaque payload; a payload that does
            // not decode poisons the whole record.
            let instructions = decode_instructions(&data)?;
            tracing::trace!(
                "found download changeset: server version: {}, client version: {}, origin: {}, {} instruction(s)",
                remote_version,
                last_integrated_local_version,
                origin_file_ident,
                instructions.len()
            );
        }

        changesets.push(RemoteChangeset {
            remote_version,
            last_integrated_local_version,
            origin_timestamp,
            origin_file_ident,
            original_changeset_size,
            data,
        });
        body_view = body_view.slice(payload_start + changeset_size..);
    }

    let message = DownloadMessage {
        session_ident,
        progress,
        latest_server_version,
        downloadable_bytes,
        changesets,
    };
    Ok((message, framed.remaining))
}

fn parse_upload(input: &Bytes) -> WireResult<(UploadMessage, Bytes)> {
    let ctx = header_context("upload message");
    let mut line = HeaderLine::new(input, b'\n');
    let session_ident: SessionIdent = line.int_field().map_err(&ctx)?;
    let is_body_compressed: u64 = line.int_field().map_err(&ctx)?;
    let uncompressed_body_size: usize = line.int_field().map_err(&ctx)?;
    let compressed_body_size: usize = line.int_field().map_err(&ctx)?;
    let upload_client_version: u64 = line.int_field().map_err(&ctx)?;
    let upload_last_integrated_server_version: u64 = line.int_field().map_err(&ctx)?;
    let locked_server_version: u64 = line.int_field().map_err(&ctx)?;
    let rest = line.finish().map_err(&ctx)?;
    let after_header = input.slice(input.len() - rest.len()..);

    let framed = MessageBody::parse(
        &after_header,
        compressed_body_size,
        uncompressed_body_size,
        is_body_compressed != 0,
    )?;

    let record_ctx = header_context("upload changeset");
    let mut changesets = Vec::new();
    let mut body_view = framed.body;
    while !body_view.is_empty() {
        let mut line = HeaderLine::new(&body_view, b'\n');
        let version: u64 = line.int_field().map_err(&record_ctx)?;
        let last_integrated_remote_version: u64 = line.int_field().map_err(&record_ctx)?;
        let origin_timestamp: u64 = line.int_field().map_err(&record_ctx)?;
        let origin_file_ident: u64 = line.int_field().map_err(&record_ctx)?;
        let changeset_size: usize = line.int_field().map_err(&record_ctx)?;
        let rest = line.finish().map_err(&record_ctx)?;

        let payload_start = body_view.len() - rest.len();
        let available = rest.len();
        if changeset_size > available {
            tracing::error!(
                "changeset length is {} but buffer size is {}",
                changeset_size,
                available
            );
            return Err(WireError::ChangesetTooLong {
                declared: changeset_size,
                available,
            });
        }

        tracing::trace!(
            "found upload changeset: {} {} {} {} {}",
            last_integrated_remote_version,
            version,
            origin_timestamp,
            origin_file_ident,
            changeset_size
        );

        let payload = &body_view[payload_start..payload_start + changeset_size];
        let instructions = decode_instructions(payload).map_err(|err| {
            tracing::error!(
                "error decoding changeset produced at client version {}: {}",
                version,
                err
            );
            WireError::ChangesetDecode(err)
        })?;

        changesets.push(Changeset {
            version,
            last_integrated_remote_version,
            origin_timestamp,
            origin_file_ident,
            instructions,
        });
        body_view = body_view.slice(payload_start + changeset_size..);
    }

    let message = UploadMessage {
        session_ident,
        upload_progress: UploadCursor {
            client_version: upload_client_version,
            last_integrated_server_version: upload_last_integrated_server_version,
        },
        locked_server_version,
        changesets,
    };
    Ok((message, framed.remaining))
}
