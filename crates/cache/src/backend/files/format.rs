//! On-disk format of a single object file
//!
//! ```text
//! [StorageHeader][key bytes][data, zstd-compressed if flagged]
//! ```

use crate::errors::{CacheError, RecoveryHint, Result};
use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Magic number for object files: "HCFS" (Header Cache File Store)
pub const OBJECT_MAGIC: u32 = 0x4843_4653;

/// Current object format version
pub const OBJECT_VERSION: u16 = 1;

/// Binary header in front of every object file
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct StorageHeader {
    /// Magic number for validation
    magic: u32,
    /// Object format version
    version: u16,
    /// Flags (bit 0: compressed)
    flags: u16,
    /// CRC32C of the header (excluding this field)
    header_crc: u32,
    /// Timestamp when written
    timestamp: u64,
    /// Uncompressed data size
    pub uncompressed_size: u64,
    /// Compressed data size (same as uncompressed if not compressed)
    pub compressed_size: u64,
    /// Length of the key stored after the header
    pub key_len: u32,
    /// CRC32C of the key and data
    pub data_crc: u32,
    /// Reserved for future use
    reserved: [u8; 8],
}

impl StorageHeader {
    const FLAG_COMPRESSED: u16 = 1 << 0;

    pub fn new(
        key_len: u32,
        uncompressed_size: u64,
        compressed_size: u64,
        data_crc: u32,
        compressed: bool,
    ) -> Self {
        let mut header = Self {
            magic: OBJECT_MAGIC,
            version: OBJECT_VERSION,
            flags: if compressed { Self::FLAG_COMPRESSED } else { 0 },
            header_crc: 0,
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            uncompressed_size,
            compressed_size,
            key_len,
            data_crc,
            reserved: [0u8; 8],
        };

        header.header_crc = header.calculate_crc();
        header
    }

    /// Serialized size of a header
    pub fn encoded_len() -> usize {
        bincode::serialized_size(&Self::default()).unwrap_or(0) as usize
    }

    fn calculate_crc(&self) -> u32 {
        let mut temp = *self;
        temp.header_crc = 0;

        match bincode::serialize(&temp) {
            Ok(bytes) => crc32c(&bytes),
            Err(_) => 0,
        }
    }

    pub fn validate(&self, key: &[u8]) -> Result<()> {
        if self.magic != OBJECT_MAGIC {
            return Err(CacheError::corruption(
                key,
                format!(
                    "invalid magic number: expected {:08x}, got {:08x}",
                    OBJECT_MAGIC, self.magic
                ),
            ));
        }

        if self.version > OBJECT_VERSION {
            return Err(CacheError::Corruption {
                key: String::from_utf8_lossy(key).into_owned(),
                reason: format!("unsupported object version: {}", self.version),
                recovery_hint: RecoveryHint::Manual {
                    instructions: "Update hcache to read this cache directory".to_string(),
                },
            });
        }

        let expected_crc = self.calculate_crc();
        if self.header_crc != expected_crc {
            return Err(CacheError::corruption(
                key,
                format!(
                    "header CRC mismatch: expected {:08x}, got {:08x}",
                    expected_crc, self.header_crc
                ),
            ));
        }

        Ok(())
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & Self::FLAG_COMPRESSED != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_fixed_size() {
        let header = StorageHeader::new(3, 100, 40, 0xabcd, true);
        let bytes = bincode::serialize(&header).unwrap();
        assert_eq!(bytes.len(), StorageHeader::encoded_len());
        assert_eq!(StorageHeader::encoded_len(), 52);
    }

    #[test]
    fn test_validate_detects_tampering() {
        let header = StorageHeader::new(1, 10, 10, 0, false);
        assert!(header.validate(b"k").is_ok());
        assert!(!header.is_compressed());

        let mut bytes = bincode::serialize(&header).unwrap();
        bytes[20] ^= 0xff;
        let tampered: StorageHeader = bincode::deserialize(&bytes).unwrap();
        assert!(tampered.validate(b"k").unwrap_err().is_corruption());

        let mut bytes = bincode::serialize(&header).unwrap();
        bytes[0] = 0;
        let tampered: StorageHeader = bincode::deserialize(&bytes).unwrap();
        assert!(tampered.validate(b"k").is_err());
    }
}
