//! Blob codec: header records to flat, stamped byte buffers and back
//!
//! Layout of a blob:
//!
//! ```text
//! +--------------------+----------------------+---------------------+
//! | stamp (u32 LE)     | freshness (u64 LE)   | payload             |
//! +--------------------+----------------------+---------------------+
//! ```
//!
//! The payload is the record in canonical field order. Scalars use a fixed
//! little-endian layout, strings and lists are a u64 length followed by
//! their contents, and every optional field or substructure is preceded by
//! a one-byte presence flag. Nested MIME parts are written depth first, at
//! most `MAX_BODY_DEPTH` levels deep.

mod schema;

pub use schema::{SchemaFingerprint, BLOB_FORMAT_VERSION};

use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use crate::header::{Body, Header, MAX_BODY_DEPTH};
use bincode::Options;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of the fixed prefix preceding the payload
pub const PREFIX_LEN: usize = 4 + 8;

/// Freshness marker to embed when storing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Freshness {
    /// Use the current UNIX time in seconds
    #[default]
    CurrentTime,
    /// Origin-defined marker, e.g. an IMAP UIDVALIDITY
    Marker(u64),
}

impl Freshness {
    pub fn resolve(self) -> u64 {
        match self {
            Self::Marker(marker) => marker,
            Self::CurrentTime => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

impl From<u64> for Freshness {
    fn from(marker: u64) -> Self {
        Self::Marker(marker)
    }
}

/// A decoded record together with the marker it was stored with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedHeader {
    pub header: Header,
    pub freshness: u64,
}

/// Encodes and validates blobs against one schema fingerprint
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobCodec {
    fingerprint: SchemaFingerprint,
}

impl BlobCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fingerprint(fingerprint: SchemaFingerprint) -> Self {
        Self { fingerprint }
    }

    pub fn fingerprint(&self) -> SchemaFingerprint {
        self.fingerprint
    }

    /// Flatten a header into a stamped blob
    pub fn encode(&self, header: &Header, freshness: Freshness) -> Result<Vec<u8>> {
        let depth = header.content.as_ref().map_or(0, Body::depth);
        if depth > MAX_BODY_DEPTH {
            return Err(CacheError::Serialization {
                key: String::new(),
                operation: SerializationOp::Encode,
                source: format!("MIME structure is {depth} levels deep, limit is {MAX_BODY_DEPTH}")
                    .into(),
                recovery_hint: RecoveryHint::Ignore,
            });
        }

        let size = payload_options()
            .serialized_size(header)
            .map_err(encode_error)?;

        let mut blob = Vec::with_capacity(PREFIX_LEN + size as usize);
        blob.extend_from_slice(&self.fingerprint.value().to_le_bytes());
        blob.extend_from_slice(&freshness.resolve().to_le_bytes());
        payload_options()
            .serialize_into(&mut blob, header)
            .map_err(encode_error)?;

        Ok(blob)
    }

    /// Decode a blob, refusing it unless its stamp matches this codec
    pub fn decode(&self, key: &[u8], blob: &[u8]) -> Result<CachedHeader> {
        let (stamp, freshness, payload) = split(key, blob)?;

        if stamp != self.fingerprint.value() {
            return Err(CacheError::VersionMismatch {
                key: String::from_utf8_lossy(key).into_owned(),
                expected_version: self.fingerprint.value(),
                actual_version: stamp,
                recovery_hint: RecoveryHint::ClearAndRetry,
            });
        }

        let header = decode_payload(key, payload)?;
        Ok(CachedHeader { header, freshness })
    }
}

/// Decode a blob without checking its stamp.
///
/// For callers that fetched raw bytes and apply their own validity policy.
/// All bounds checks still apply.
pub fn restore(blob: &[u8]) -> Result<CachedHeader> {
    let (_, freshness, payload) = split(b"", blob)?;
    let header = decode_payload(b"", payload)?;
    Ok(CachedHeader { header, freshness })
}

/// Read the stamp of a blob without decoding it
pub fn stamp_of(blob: &[u8]) -> Option<SchemaFingerprint> {
    let bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    Some(SchemaFingerprint::from_raw(u32::from_le_bytes(bytes)))
}

fn split<'a>(key: &[u8], blob: &'a [u8]) -> Result<(u32, u64, &'a [u8])> {
    if blob.len() < PREFIX_LEN {
        return Err(CacheError::corruption(
            key,
            format!("blob of {} bytes is shorter than its prefix", blob.len()),
        ));
    }

    let (stamp, rest) = blob.split_at(4);
    let (freshness, payload) = rest.split_at(8);

    let stamp = u32::from_le_bytes(stamp.try_into().map_err(|_| prefix_error(key))?);
    let freshness = u64::from_le_bytes(freshness.try_into().map_err(|_| prefix_error(key))?);

    Ok((stamp, freshness, payload))
}

fn decode_payload(key: &[u8], payload: &[u8]) -> Result<Header> {
    let header: Header = payload_options()
        .with_limit(payload.len() as u64)
        .deserialize(payload)
        .map_err(|e| CacheError::Serialization {
            key: String::from_utf8_lossy(key).into_owned(),
            operation: SerializationOp::Decode,
            source: e,
            recovery_hint: RecoveryHint::ClearAndRetry,
        })?;

    if !header.is_consistent() {
        return Err(CacheError::corruption(
            key,
            "real subject offset lies outside the subject",
        ));
    }

    Ok(header)
}

fn payload_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

fn prefix_error(key: &[u8]) -> CacheError {
    CacheError::corruption(key, "malformed blob prefix")
}

fn encode_error(source: bincode::Error) -> CacheError {
    CacheError::Serialization {
        key: String::new(),
        operation: SerializationOp::Encode,
        source,
        recovery_hint: RecoveryHint::Manual {
            instructions: "Report the header that failed to encode".to_string(),
        },
    }
}
