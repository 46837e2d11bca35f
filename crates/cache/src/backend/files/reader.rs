//! Read operations for the file store
//!
//! This module handles reading objects with decompression
//! and checksum verification.

use super::format::StorageHeader;
use crate::backend::compression::{decompress_bounded, decompress_error, MAX_DECOMPRESSED_SIZE};
use crate::errors::{CacheError, Result};
use crc32c::{crc32c, crc32c_append};
use std::fs;
use std::io;
use std::path::Path;
use zstd::stream::read::Decoder as ZstdDecoder;

/// Read one object, verifying it belongs to `key`.
///
/// A missing file, or a file holding a different key, reads as absent.
pub fn read_object(path: &Path, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let file_data = match fs::read(path) {
        Ok(d) => d,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(path, "read object file", e)),
    };

    let header_size = StorageHeader::encoded_len();
    if file_data.len() < header_size {
        return Err(CacheError::corruption(key, "object file shorter than its header"));
    }

    let header: StorageHeader = bincode::deserialize(&file_data[..header_size])?;
    header.validate(key)?;

    let rest = &file_data[header_size..];
    let key_len = header.key_len as usize;
    if rest.len() < key_len || rest.len() - key_len != header.compressed_size as usize {
        return Err(CacheError::corruption(key, "object file size does not match its header"));
    }

    let (stored_key, data) = rest.split_at(key_len);

    let actual_crc = crc32c_append(crc32c(stored_key), data);
    if actual_crc != header.data_crc {
        return Err(CacheError::corruption(
            key,
            format!(
                "data CRC mismatch: expected {:08x}, got {:08x}",
                header.data_crc, actual_crc
            ),
        ));
    }

    if stored_key != key {
        tracing::debug!("Object {:?} holds a different key, treating as absent", path);
        return Ok(None);
    }

    let value = if header.is_compressed() {
        let expected = usize::try_from(header.uncompressed_size)
            .ok()
            .filter(|size| *size <= MAX_DECOMPRESSED_SIZE)
            .ok_or_else(|| {
                CacheError::corruption(
                    key,
                    format!("declared size {} is too large", header.uncompressed_size),
                )
            })?;
        let decoder = ZstdDecoder::new(data).map_err(decompress_error)?;
        decompress_bounded(key, decoder, expected)?
    } else {
        data.to_vec()
    };

    if value.len() as u64 != header.uncompressed_size {
        return Err(CacheError::corruption(key, "decompressed size does not match its header"));
    }

    Ok(Some(value))
}
