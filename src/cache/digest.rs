//! Streaming content digests for result files.

use std::{
    fmt,
    fs::File,
    io::{self, ErrorKind, Read},
    path::Path,
};

use super::error::{CacheError, CacheResult};

/// Bytes read per iteration while hashing; bounds memory use on small hosts.
pub const HASH_BLOCK_SIZE: usize = 64 * 1024;

pub const DIGEST_LEN: usize = 16;

/// 128-bit MD5 digest of a source file's full byte content.
///
/// Identical bytes always produce the same digest. Distinct contents are
/// assumed never to collide; a collision would make two sources share one
/// cache entry, which is an accepted risk at this digest size.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Digest an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({self})")
    }
}

/// Hash a reader to exhaustion in [`HASH_BLOCK_SIZE`] blocks.
///
/// A digest is only returned once the reader reports end of stream.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<ContentDigest> {
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; HASH_BLOCK_SIZE];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => context.consume(&buffer[..read]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    Ok(ContentDigest(context.compute().0))
}

/// Hash the file at `path` without loading it into memory.
pub fn digest_file(path: &Path) -> CacheResult<ContentDigest> {
    let unreadable = |source| CacheError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unreadable)?;
    digest_reader(file).map_err(unreadable)
}
