//! Write operations for the file store
//!
//! This module handles writing objects with compression
//! and checksum generation.

use super::format::StorageHeader;
use crate::backend::CompressionConfig;
use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use crc32c::{crc32c, crc32c_append};
use std::path::Path;
use zstd::stream::encode_all as zstd_encode;

/// Write one object with compression and checksums
pub fn write_object(
    path: &Path,
    key: &[u8],
    data: &[u8],
    compression: &CompressionConfig,
) -> Result<()> {
    let should_compress = compression.should_compress(data.len());

    tracing::trace!(
        "Write decision - path: {:?}, data_len: {}, min_size: {}, should_compress: {}",
        path,
        data.len(),
        compression.min_size,
        should_compress
    );

    let payload = if should_compress {
        zstd_encode(data, compression.level.clamp(1, 22)).map_err(|e| CacheError::Compression {
            operation: "compress",
            source: Box::new(e),
            recovery_hint: RecoveryHint::Manual {
                instructions: "Check compression settings".to_string(),
            },
        })?
    } else {
        data.to_vec()
    };

    let key_len = u32::try_from(key.len()).map_err(|_| {
        CacheError::configuration(
            format!("key of {} bytes is too long", key.len()),
            RecoveryHint::Manual {
                instructions: "Use a shorter message key".to_string(),
            },
        )
    })?;
    let data_crc = crc32c_append(crc32c(key), &payload);

    let header = StorageHeader::new(
        key_len,
        data.len() as u64,
        payload.len() as u64,
        data_crc,
        should_compress,
    );

    let header_bytes = bincode::serialize(&header).map_err(|e| CacheError::Serialization {
        key: String::from_utf8_lossy(key).into_owned(),
        operation: SerializationOp::Encode,
        source: e,
        recovery_hint: RecoveryHint::Manual {
            instructions: "Check header serialization".to_string(),
        },
    })?;

    let mut output = Vec::with_capacity(header_bytes.len() + key.len() + payload.len());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(key);
    output.extend_from_slice(&payload);

    hcache_utils::write_atomic(path, &output)
        .map_err(|e| CacheError::io(path, "write object file", e))
}
