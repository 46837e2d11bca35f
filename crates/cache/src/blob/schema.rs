//! Schema fingerprints used as validity stamps

use crate::header::Header;
use crc32c::{crc32c, crc32c_append};
use std::fmt;

/// Version of the blob framing (stamp, marker, payload encoding rules)
pub const BLOB_FORMAT_VERSION: u32 = 1;

/// Fingerprint of a record layout.
///
/// Blobs stamped with a different fingerprint are never decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaFingerprint(u32);

impl SchemaFingerprint {
    /// Fingerprint of the `Header` layout compiled into this crate
    pub fn current() -> Self {
        Self::of_layout(Header::LAYOUT)
    }

    /// Fingerprint of an arbitrary layout description
    pub fn of_layout(layout: &str) -> Self {
        let seed = crc32c(&BLOB_FORMAT_VERSION.to_le_bytes());
        Self(crc32c_append(seed, layout.as_bytes()))
    }

    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Default for SchemaFingerprint {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(SchemaFingerprint::current(), SchemaFingerprint::current());
        assert_eq!(
            SchemaFingerprint::current(),
            SchemaFingerprint::of_layout(Header::LAYOUT)
        );
    }

    #[test]
    fn test_fingerprint_tracks_layout() {
        let extended = format!("{};Extra{{field:u8}}", Header::LAYOUT);
        assert_ne!(
            SchemaFingerprint::current(),
            SchemaFingerprint::of_layout(&extended)
        );
        assert_eq!(SchemaFingerprint::from_raw(0xdead_beef).to_string(), "deadbeef");
    }
}
