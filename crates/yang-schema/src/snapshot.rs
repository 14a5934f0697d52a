//! Best-effort binary snapshot of a compiled module, gated behind the
//! `snapshot` feature. Not meant to be cross-version stable — a leading
//! format tag lets a future version refuse to load an old snapshot instead
//! of misinterpreting it.

use serde::{Deserialize, Serialize};

pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub format_version: u16,
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("unsupported snapshot format version {0}, expected {SNAPSHOT_FORMAT_VERSION}")]
    UnsupportedVersion(u16),
    #[error("postcard serialization failed: {0}")]
    Postcard(#[from] postcard::Error),
}

/// Serialize any `Serialize` value (callers pass a serializable view of a
/// compiled module assembled from the dictionary blob plus the arena
/// vectors) prefixed with the format header.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    let mut buf = postcard::to_allocvec(&SnapshotHeader {
        format_version: SNAPSHOT_FORMAT_VERSION,
    })?;
    buf.extend(postcard::to_allocvec(value)?);
    Ok(buf)
}

pub fn deserialize<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, SnapshotError> {
    let (header, rest): (SnapshotHeader, _) = postcard::take_from_bytes(bytes)?;
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(header.format_version));
    }
    let (value, _) = postcard::take_from_bytes(rest)?;
    Ok(value)
}
