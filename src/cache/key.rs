//! Filename-safe cache keys derived from content digests.
//!
//! Keys use the RFC 4648 base32 alphabet without padding: uppercase letters
//! and the digits `2`-`7`. Unlike base64 the alphabet has no `/` or `+`, and
//! a 128-bit digest always encodes to the same fixed length.

use std::fmt;

use data_encoding::BASE32_NOPAD;

use super::digest::{ContentDigest, DIGEST_LEN};

/// Encoded length of a digest: 128 bits in 5-bit groups, rounded up.
pub const KEY_LEN: usize = (DIGEST_LEN * 8).div_ceil(5);

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Encode a digest. Pure and injective; the trailing partial group is
    /// always zero-filled, so every digest has exactly one key.
    pub fn from_digest(digest: &ContentDigest) -> Self {
        Self(BASE32_NOPAD.encode(digest.as_bytes()))
    }

    /// Accept a string only if it could have been produced by [`CacheKey::from_digest`].
    pub fn parse(value: &str) -> Option<Self> {
        // Decoding rejects non-zero fill bits, so only encoder output passes.
        let well_formed = value.len() == KEY_LEN
            && BASE32_NOPAD
                .decode(value.as_bytes())
                .is_ok_and(|bytes| bytes.len() == DIGEST_LEN);

        well_formed.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self.0)
    }
}

impl From<&ContentDigest> for CacheKey {
    fn from(digest: &ContentDigest) -> Self {
        Self::from_digest(digest)
    }
}
