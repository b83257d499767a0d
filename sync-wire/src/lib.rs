//! # sync-wire
//!
//! Parser for recorded sync-protocol message streams.
//!
//! A recorded stream is a concatenation of IDENT, DOWNLOAD, and UPLOAD
//! messages. Each message starts with an ASCII tag, followed by a
//! newline-terminated header line of decimal fields, followed (for
//! DOWNLOAD/UPLOAD) by a body of declared size that may be
//! zlib-compressed. Bodies contain a sequence of changeset records, each
//! with its own header line and opaque instruction payload.
//!
//! [`parse_message`] detaches one message from the front of a stream;
//! callers loop until the stream is empty.

#![warn(clippy::all)]

mod body;
mod error;
mod header;
mod message;

pub use error::{HeaderError, WireError, WireResult};
pub use message::{parse_message, DownloadMessage, Message, ServerIdentMessage, UploadMessage};
