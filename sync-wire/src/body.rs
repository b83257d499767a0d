//! Body framing for DOWNLOAD/UPLOAD messages.
//!
//! A message body is either carried verbatim (zero-copy slice of the
//! input) or zlib-compressed, in which case it is inflated into a fresh
//! buffer of the declared uncompressed size. Either way the result is a
//! reference-counted [`Bytes`] buffer that outlives every changeset slice
//! cut from it.

use bytes::Bytes;
use flate2::{Decompress, FlushDecompress, Status};

use crate::error::WireError;

#[derive(Debug)]
pub(crate) struct MessageBody {
    /// The body, exactly `uncompressed_size` bytes.
    pub body: Bytes,
    /// The input stream after the body region.
    pub remaining: Bytes,
}

impl MessageBody {
    pub fn parse(
        input: &Bytes,
        compressed_size: usize,
        uncompressed_size: usize,
        is_compressed: bool,
    ) -> Result<MessageBody, WireError> {
        if is_compressed {
            if input.len() < compressed_size {
                tracing::error!(
                    "compressed message body is bigger ({}) than available bytes ({})",
                    compressed_size,
                    input.len()
                );
                return Err(WireError::BodyTooShort {
                    declared: compressed_size,
                    available: input.len(),
                });
            }

            // One spare byte of capacity so a stream inflating past the
            // declared size shows up as a length mismatch instead of a
            // silently truncated buffer.
            let mut body = Vec::with_capacity(uncompressed_size + 1);
            let mut inflate = Decompress::new(true);
            let status = inflate
                .decompress_vec(&input[..compressed_size], &mut body, FlushDecompress::Finish)
                .map_err(|err| {
                    tracing::error!("error decompressing message body: {}", err);
                    WireError::Decompress(err)
                })?;
            if status != Status::StreamEnd || body.len() != uncompressed_size {
                tracing::error!(
                    "decompressed body is {} bytes but {} were declared",
                    body.len(),
                    uncompressed_size
                );
                return Err(WireError::DecompressedSizeMismatch {
                    declared: uncompressed_size,
                    actual: body.len(),
                });
            }

            Ok(MessageBody {
                body: Bytes::from(body),
                remaining: input.slice(compressed_size..),
            })
        } else {
            if input.len() < uncompressed_size {
                tracing::error!(
                    "message body is bigger ({}) than available bytes ({})",
                    uncompressed_size,
                    input.len()
                );
                return Err(WireError::BodyTooShort {
                    declared: uncompressed_size,
                    available: input.len(),
                });
            }
            Ok(MessageBody {
                body: input.slice(..uncompressed_size),
                remaining: input.slice(uncompressed_size..),
            })
        }
    }
}
