//! Error types for sync-wire.

use thiserror::Error;

/// Failure modes of the header tokenizer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// Input ran out before the line was complete.
    #[error("header ended before the line was complete")]
    UnexpectedEnd,

    /// An integer field did not start with a digit.
    #[error("integer field does not start with a digit (byte 0x{found:02x})")]
    NotAnInteger {
        /// The offending byte.
        found: u8,
    },

    /// An integer field overflowed the wide 64-bit parse.
    #[error("integer field overflows 64 bits")]
    Overflow,

    /// An integer parsed fine but does not fit the declared field width.
    #[error("integer field value {value} does not fit the declared width")]
    OutOfRange {
        /// The wide value that failed to narrow.
        value: i64,
    },

    /// A field was followed by something other than a space or the end
    /// delimiter.
    #[error("expected space or end delimiter after field (byte 0x{found:02x})")]
    BadSeparator {
        /// The offending byte.
        found: u8,
    },

    /// A token field was empty.
    #[error("token field is empty")]
    EmptyToken,

    /// A token field held non-UTF-8 bytes.
    #[error("token field is not valid UTF-8")]
    BadToken,

    /// The line was not terminated by its end delimiter.
    #[error("header line not terminated by its end delimiter")]
    MissingDelimiter,
}

/// Errors produced while parsing a recorded message stream.
#[derive(Debug, Error)]
pub enum WireError {
    /// A header line failed to tokenize.
    #[error("malformed {context} header: {source}")]
    Header {
        /// Which header was being parsed.
        context: &'static str,
        /// The tokenizer failure.
        #[source]
        source: HeaderError,
    },

    /// The leading message tag is not `ident`, `download`, or `upload`.
    #[error("unknown message type {tag:?}")]
    UnknownMessageType {
        /// The tag that was found.
        tag: String,
    },

    /// A body declared more bytes than the stream still holds.
    #[error("message body is bigger ({declared}) than available bytes ({available})")]
    BodyTooShort {
        /// Declared body size.
        declared: usize,
        /// Bytes actually remaining.
        available: usize,
    },

    /// The decompressor rejected a compressed body.
    #[error("error decompressing message body: {0}")]
    Decompress(#[from] flate2::DecompressError),

    /// The decompressor produced a different number of bytes than the
    /// header declared.
    #[error("decompressed body is {actual} bytes but {declared} were declared")]
    DecompressedSizeMismatch {
        /// Declared uncompressed size.
        declared: usize,
        /// Size the decompressor produced.
        actual: usize,
    },

    /// A changeset record declared more payload than its body holds.
    #[error("changeset length is {declared} but buffer size is {available}")]
    ChangesetTooLong {
        /// Declared changeset size.
        declared: usize,
        /// Bytes left in the body.
        available: usize,
    },

    /// A changeset instruction payload failed to decode.
    #[error(transparent)]
    ChangesetDecode(#[from] sync_types::ChangesetCodecError),
}

/// Result alias for wire parsing.
pub type WireResult<T> = std::result::Result<T, WireError>;
