//! Value compression shared by the engines that compress blobs themselves
//!
//! Packed values carry a one-byte codec tag so a store written with
//! compression on stays readable with compression off, and the reverse.

use crate::errors::{CacheError, RecoveryHint, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

/// Default zstd compression level (3 = fast with good compression)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Largest value that is compressed, and so the most a decompression may yield
pub const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Compression configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Whether compression is enabled
    pub enabled: bool,
    /// Compression level, clamped to the range of the codec in use
    pub level: i32,
    /// Minimum size in bytes before compression is applied
    pub min_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: DEFAULT_COMPRESSION_LEVEL,
            min_size: 64,
        }
    }
}

impl CompressionConfig {
    pub fn should_compress(&self, len: usize) -> bool {
        self.enabled && len >= self.min_size && len <= MAX_DECOMPRESSED_SIZE
    }
}

/// Codec applied to a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueCodec {
    Plain = 0,
    Zstd = 1,
    Deflate = 2,
}

impl ValueCodec {
    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Plain),
            1 => Some(Self::Zstd),
            2 => Some(Self::Deflate),
            _ => None,
        }
    }
}

/// Tag and, if configured, compress a value with `codec`
pub fn pack(codec: ValueCodec, config: &CompressionConfig, data: &[u8]) -> Result<Vec<u8>> {
    let codec = if config.should_compress(data.len()) {
        codec
    } else {
        ValueCodec::Plain
    };

    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(codec as u8);

    match codec {
        ValueCodec::Plain => out.extend_from_slice(data),
        ValueCodec::Zstd => {
            let level = config.level.clamp(1, 22);
            let compressed = zstd::stream::encode_all(data, level).map_err(compress_error)?;
            out.extend_from_slice(&compressed);
        }
        ValueCodec::Deflate => {
            let level = config.level.clamp(0, 9) as u32;
            let mut encoder = DeflateEncoder::new(out, flate2::Compression::new(level));
            encoder.write_all(data).map_err(compress_error)?;
            out = encoder.finish().map_err(compress_error)?;
        }
    }

    Ok(out)
}

/// Strip the tag and decompress a value written by `pack`
pub fn unpack(key: &[u8], stored: &[u8]) -> Result<Vec<u8>> {
    let (&tag, data) = stored
        .split_first()
        .ok_or_else(|| CacheError::corruption(key, "stored value is empty"))?;

    match ValueCodec::from_tag(tag) {
        Some(ValueCodec::Plain) => Ok(data.to_vec()),
        Some(ValueCodec::Zstd) => {
            let decoder = zstd::stream::read::Decoder::new(data).map_err(decompress_error)?;
            decompress_bounded(key, decoder, MAX_DECOMPRESSED_SIZE)
        }
        Some(ValueCodec::Deflate) => {
            decompress_bounded(key, DeflateDecoder::new(data), MAX_DECOMPRESSED_SIZE)
        }
        None => Err(CacheError::corruption(
            key,
            format!("unknown value codec tag {tag}"),
        )),
    }
}

/// Drain `decoder`, failing once it yields more than `limit` bytes
pub fn decompress_bounded<R: Read>(key: &[u8], decoder: R, limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(decompress_error)?;

    if out.len() > limit {
        return Err(CacheError::corruption(
            key,
            format!("value decompresses past {limit} bytes"),
        ));
    }
    Ok(out)
}

fn compress_error(source: std::io::Error) -> CacheError {
    CacheError::Compression {
        operation: "compress",
        source: Box::new(source),
        recovery_hint: RecoveryHint::Manual {
            instructions: "Check compression settings".to_string(),
        },
    }
}

pub(crate) fn decompress_error(source: std::io::Error) -> CacheError {
    CacheError::Compression {
        operation: "decompress",
        source: Box::new(source),
        recovery_hint: RecoveryHint::ClearAndRetry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> CompressionConfig {
        CompressionConfig {
            enabled: true,
            min_size: 0,
            ..CompressionConfig::default()
        }
    }

    #[test]
    fn test_pack_respects_config() {
        let data = b"Subject: the same words again and again and again".repeat(8);

        let plain = pack(ValueCodec::Zstd, &CompressionConfig::default(), &data).unwrap();
        assert_eq!(plain[0], ValueCodec::Plain as u8);
        assert_eq!(&plain[1..], data.as_slice());

        for codec in [ValueCodec::Zstd, ValueCodec::Deflate] {
            let packed = pack(codec, &enabled(), &data).unwrap();
            assert_eq!(packed[0], codec as u8);
            assert!(packed.len() < data.len());
            assert_eq!(unpack(b"k", &packed).unwrap(), data);
        }
    }

    #[test]
    fn test_small_values_stay_plain() {
        let config = CompressionConfig {
            enabled: true,
            min_size: 1024,
            ..CompressionConfig::default()
        };
        let packed = pack(ValueCodec::Deflate, &config, b"tiny").unwrap();
        assert_eq!(packed, b"\0tiny");
    }

    #[test]
    fn test_oversized_values_stay_plain() {
        assert!(enabled().should_compress(MAX_DECOMPRESSED_SIZE));
        assert!(!enabled().should_compress(MAX_DECOMPRESSED_SIZE + 1));
    }

    #[test]
    fn test_decompression_is_bounded() {
        let data = vec![0u8; 4096];
        let compressed = zstd::stream::encode_all(data.as_slice(), 3).unwrap();

        let decoder = zstd::stream::read::Decoder::new(compressed.as_slice()).unwrap();
        assert_eq!(decompress_bounded(b"k", decoder, 4096).unwrap(), data);

        let decoder = zstd::stream::read::Decoder::new(compressed.as_slice()).unwrap();
        let err = decompress_bounded(b"k", decoder, 1024).unwrap_err();
        assert!(err.is_corruption());

        let deflated = pack(ValueCodec::Deflate, &enabled(), &data).unwrap();
        let err = decompress_bounded(b"k", DeflateDecoder::new(&deflated[1..]), 100).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_unpack_rejects_garbage() {
        assert!(unpack(b"k", b"").unwrap_err().is_corruption());
        assert!(unpack(b"k", &[9, 1, 2]).unwrap_err().is_corruption());
        assert!(matches!(
            unpack(b"k", &[ValueCodec::Zstd as u8, 1, 2, 3]),
            Err(CacheError::Compression { .. })
        ));
    }
}
