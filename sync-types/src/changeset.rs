//! Changeset instruction model.
//!
//! A changeset is the unit of history exchanged during sync: the batch of
//! operational-transform instructions one client version produced. Inside
//! recorded DOWNLOAD/UPLOAD message bodies the instruction list travels as
//! a MessagePack payload; [`decode_instructions`] and
//! [`encode_instructions`] are the two directions of that codec.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ChangesetCodecError;

/// A field value carried by [`Instruction::Set`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean field value.
    Bool(bool),
    /// Signed integer field value.
    Int(i64),
    /// UTF-8 string field value.
    String(String),
    /// Opaque binary field value.
    Bytes(Vec<u8>),
}

impl Value {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ChangesetCodecError> {
        rmp_serde::to_vec(self).map_err(ChangesetCodecError::Encode)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChangesetCodecError> {
        rmp_serde::from_slice(bytes).map_err(ChangesetCodecError::Decode)
    }
}

/// A single operational-transform instruction.
///
/// Instructions address objects by `(table, object)` key. Ordering within
/// a changeset is significant: later instructions see the effects of
/// earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Create an object. Creating an existing object is a no-op.
    CreateObject {
        /// Table holding the object.
        table: String,
        /// Object key within the table.
        object: String,
    },
    /// Delete an object and all its fields.
    EraseObject {
        /// Table holding the object.
        table: String,
        /// Object key within the table.
        object: String,
    },
    /// Set one field of an existing object.
    Set {
        /// Table holding the object.
        table: String,
        /// Object key within the table.
        object: String,
        /// Field name to assign.
        field: String,
        /// Value to assign.
        value: Value,
    },
    /// Remove every object of a table.
    ClearTable {
        /// Table to clear.
        table: String,
    },
}

/// A server-originated changeset carried by a DOWNLOAD message.
///
/// The instruction payload stays opaque on this path; `data` is a
/// reference-counted slice of the message body it was cut from, so the
/// body buffer outlives every changeset taken out of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteChangeset {
    /// Server version this changeset produced.
    pub remote_version: u64,
    /// Latest local version the server had integrated when producing it.
    pub last_integrated_local_version: u64,
    /// Origin wall-clock timestamp, in seconds.
    pub origin_timestamp: u64,
    /// File ident of the originating client.
    pub origin_file_ident: u64,
    /// Size of the changeset before server-side transformation.
    pub original_changeset_size: u64,
    /// Opaque instruction payload.
    pub data: Bytes,
}

/// A decoded local changeset: header fields plus instruction list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    /// Client version this changeset produced.
    pub version: u64,
    /// Latest server version integrated when it was produced.
    pub last_integrated_remote_version: u64,
    /// Origin wall-clock timestamp, in seconds.
    pub origin_timestamp: u64,
    /// File ident of the producing client (0 before ident assignment).
    pub origin_file_ident: u64,
    /// The decoded instruction list.
    pub instructions: Vec<Instruction>,
}

/// Decode a MessagePack instruction payload.
pub fn decode_instructions(bytes: &[u8]) -> Result<Vec<Instruction>, ChangesetCodecError> {
    rmp_serde::from_slice(bytes).map_err(ChangesetCodecError::Decode)
}

/// Encode an instruction list into its MessagePack payload form.
pub fn encode_instructions(instructions: &[Instruction]) -> Result<Vec<u8>, ChangesetCodecError> {
    rmp_serde::to_vec(instructions).map_err(ChangesetCodecError::Encode)
}
