//! Header decoder for pooled-container files.
//!
//! A pool directory holds fixed-layout files whose first sector embeds the
//! logical name of the payload they carry:
//!
//! | offset | size | field                                   |
//! |-------:|-----:|-----------------------------------------|
//! | 0      | 512  | NUL-terminated UTF-8 logical path       |
//! | 512    | 4    | flags                                   |
//! | 516    | 8    | digest of bytes `0..516` (two LE `u32`) |
//! | 4096   | ..   | payload                                 |
//!
//! A digest mismatch means "not a pooled container", which is an ordinary
//! outcome rather than an error.

use crate::error::CoreResult;
use crate::fs::store::Store;

/// Size of one pool sector; the payload starts here.
pub const SECTOR_SIZE: u64 = 4096;
/// Length of the logical-path field.
pub const HEADER_MAX_PATH_SIZE: usize = 512;
/// Length of the flags field that follows the path.
pub const HEADER_FLAGS_SIZE: usize = 4;
/// Length of the stored digest.
pub const HEADER_DIGEST_SIZE: usize = 8;
/// Bytes covered by the digest (path + flags).
pub const HEADER_CORPUS_SIZE: usize = HEADER_MAX_PATH_SIZE + HEADER_FLAGS_SIZE;
/// Offset of the stored digest.
pub const HEADER_OFFSET_DIGEST: usize = HEADER_CORPUS_SIZE;
/// Bytes needed to decode a header.
pub const HEADER_SIZE: usize = HEADER_CORPUS_SIZE + HEADER_DIGEST_SIZE;
/// Offset of the payload.
pub const HEADER_OFFSET_DATA: u64 = SECTOR_SIZE;

/// Name reported for a valid container with an empty path field.
pub const UNASSOCIATED: &str = "unassociated!";

const DIGEST_SEED_1: u32 = 0xdead_beef;
const DIGEST_SEED_2: u32 = 0x41c6_ce57;

/// Result of decoding a recognized container header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolName {
    /// The container carries this logical path.
    Named(String),
    /// The container is valid but not associated with any logical path.
    Unassociated,
}

impl PoolName {
    /// The recovered name, or `None` for an unassociated slot.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Unassociated => None,
        }
    }

    /// Display form: the logical path or [`UNASSOCIATED`].
    pub fn as_str(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::Unassociated => UNASSOCIATED,
        }
    }
}

/// Computes the two-word digest over a header corpus.
///
/// Each word runs `h = 31 * h + byte * 307` with wrapping `u32` arithmetic,
/// seeded with `0xdeadbeef` and `0x41c6ce57` respectively.
pub fn compute_digest(corpus: &[u8]) -> [u32; 2] {
    let mut h1 = DIGEST_SEED_1;
    let mut h2 = DIGEST_SEED_2;
    for &byte in corpus {
        let term = u32::from(byte).wrapping_mul(307);
        h1 = h1.wrapping_mul(31).wrapping_add(term);
        h2 = h2.wrapping_mul(31).wrapping_add(term);
    }
    [h1, h2]
}

/// Decodes a header from the first [`HEADER_SIZE`] bytes of a file.
///
/// Returns `None` when the buffer is too short or the stored digest does
/// not match the computed one.
pub fn decode_header(header: &[u8]) -> Option<PoolName> {
    if header.len() < HEADER_SIZE {
        return None;
    }
    let corpus = &header[..HEADER_CORPUS_SIZE];
    let stored = read_digest(&header[HEADER_OFFSET_DIGEST..HEADER_SIZE])?;
    if stored != compute_digest(corpus) {
        return None;
    }

    // Only the path field holds the name; the flags never do.
    let path_field = &corpus[..HEADER_MAX_PATH_SIZE];
    match path_field.iter().position(|&b| b == 0) {
        Some(0) | None => Some(PoolName::Unassociated),
        Some(end) => Some(PoolName::Named(
            String::from_utf8_lossy(&path_field[..end]).into_owned(),
        )),
    }
}

/// Reads the header of `path` from `store` and decodes it.
///
/// # Errors
///
/// Propagates store failures; an unrecognized file is `Ok(None)`.
pub async fn decode_file(store: &dyn Store, path: &str) -> CoreResult<Option<PoolName>> {
    let header = store.read_range(path, 0, HEADER_SIZE as u64).await?;
    let decoded = decode_header(&header);
    tracing::debug!(path, recognized = decoded.is_some(), "decoded pool header");
    Ok(decoded)
}

/// Builds a valid header for `name` (empty for an unassociated slot).
///
/// Names longer than the path field are truncated at a byte boundary.
pub fn encode_header(name: &str, flags: u32) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    let bytes = name.as_bytes();
    let len = bytes.len().min(HEADER_MAX_PATH_SIZE - 1);
    header[..len].copy_from_slice(&bytes[..len]);
    header[HEADER_MAX_PATH_SIZE..HEADER_CORPUS_SIZE].copy_from_slice(&flags.to_le_bytes());

    let [h1, h2] = compute_digest(&header[..HEADER_CORPUS_SIZE]);
    header[HEADER_OFFSET_DIGEST..HEADER_OFFSET_DIGEST + 4].copy_from_slice(&h1.to_le_bytes());
    header[HEADER_OFFSET_DIGEST + 4..HEADER_SIZE].copy_from_slice(&h2.to_le_bytes());
    header
}

fn read_digest(bytes: &[u8]) -> Option<[u32; 2]> {
    let first: [u8; 4] = bytes.get(0..4)?.try_into().ok()?;
    let second: [u8; 4] = bytes.get(4..8)?.try_into().ok()?;
    Some([u32::from_le_bytes(first), u32::from_le_bytes(second)])
}
