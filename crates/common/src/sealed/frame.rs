//! Tagged, versioned multi-part framing
//!
//! A file's storage slot holds several parts at once (sealed content, key
//! bundle, write signature). Each part sits behind an explicit, validated
//! big-endian length prefix:
//!
//! ```text
//! [ version: u8 ][ count: u8 ]
//!   then per part: [ len: u32 BE ][ bytes ]
//! ```
//!
//! Decoding validates the version tag, the part count, and every length with
//! checked arithmetic before slicing, and rejects trailing bytes. New fields
//! can be appended as new parts under a bumped version without ambiguity.

/// Current frame format version.
pub const FRAME_VERSION: u8 = 1;

/// Fixed header size: version byte + part count byte.
pub const HEADER_SIZE: usize = 2;

/// Width of each part's length prefix.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Maximum number of parts in one frame.
pub const MAX_PARTS: usize = 8;

/// Errors from frame encoding/decoding. All decode failures are structural
/// ("malformed"), distinct from authentication failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    #[error("unsupported frame version: {0}")]
    BadVersion(u8),
    #[error("invalid part count: {0}")]
    BadCount(u8),
    #[error("part {index} length {len} exceeds remaining {remaining} bytes")]
    LengthOverflow {
        index: usize,
        len: u32,
        remaining: usize,
    },
    #[error("{0} trailing bytes after last part")]
    TrailingBytes(usize),
    #[error("part too large: {0} bytes")]
    PartTooLarge(usize),
}

/// Encode `parts` into a single framed blob.
///
/// # Errors
///
/// Fails if there are no parts, too many parts, or any part exceeds the
/// `u32` length-prefix range.
pub fn encode(parts: &[&[u8]]) -> Result<Vec<u8>, FrameError> {
    if parts.is_empty() || parts.len() > MAX_PARTS {
        return Err(FrameError::BadCount(parts.len() as u8));
    }

    let mut total = HEADER_SIZE;
    for part in parts {
        if part.len() > u32::MAX as usize {
            return Err(FrameError::PartTooLarge(part.len()));
        }
        total += LEN_PREFIX_SIZE + part.len();
    }

    let mut out = Vec::with_capacity(total);
    out.push(FRAME_VERSION);
    out.push(parts.len() as u8);
    for part in parts {
        out.extend_from_slice(&(part.len() as u32).to_be_bytes());
        out.extend_from_slice(part);
    }
    Ok(out)
}

/// Decode a framed blob into its parts.
///
/// Every boundary is validated before slicing; trailing bytes after the last
/// declared part are rejected.
pub fn decode(blob: &[u8]) -> Result<Vec<&[u8]>, FrameError> {
    if blob.len() < HEADER_SIZE {
        return Err(FrameError::TooShort(blob.len()));
    }
    let version = blob[0];
    if version != FRAME_VERSION {
        return Err(FrameError::BadVersion(version));
    }
    let count = blob[1];
    if count == 0 || count as usize > MAX_PARTS {
        return Err(FrameError::BadCount(count));
    }

    let mut parts = Vec::with_capacity(count as usize);
    let mut offset = HEADER_SIZE;
    for index in 0..count as usize {
        let remaining = blob.len() - offset;
        if remaining < LEN_PREFIX_SIZE {
            return Err(FrameError::TooShort(blob.len()));
        }
        let mut len_bytes = [0u8; LEN_PREFIX_SIZE];
        len_bytes.copy_from_slice(&blob[offset..offset + LEN_PREFIX_SIZE]);
        let len = u32::from_be_bytes(len_bytes);
        offset += LEN_PREFIX_SIZE;

        let remaining = blob.len() - offset;
        if len as usize > remaining {
            return Err(FrameError::LengthOverflow {
                index,
                len,
                remaining,
            });
        }
        parts.push(&blob[offset..offset + len as usize]);
        offset += len as usize;
    }

    if offset != blob.len() {
        return Err(FrameError::TrailingBytes(blob.len() - offset));
    }
    Ok(parts)
}

/// Decode a frame expected to contain exactly `n` parts.
pub fn decode_exact(blob: &[u8], n: usize) -> Result<Vec<&[u8]>, FrameError> {
    let parts = decode(blob)?;
    if parts.len() != n {
        return Err(FrameError::BadCount(parts.len() as u8));
    }
    Ok(parts)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let parts: [&[u8]; 3] = [b"sealed content", b"key bundle", b"signature"];
        let blob = encode(&parts).unwrap();
        let decoded = decode(&blob).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0], b"sealed content");
        assert_eq!(decoded[1], b"key bundle");
        assert_eq!(decoded[2], b"signature");
    }

    #[test]
    fn test_empty_parts_allowed() {
        let parts: [&[u8]; 2] = [b"", b"x"];
        let blob = encode(&parts).unwrap();
        let decoded = decode(&blob).unwrap();
        assert_eq!(decoded[0], b"");
        assert_eq!(decoded[1], b"x");
    }

    #[test]
    fn test_decode_empty_blob() {
        assert_eq!(decode(b"").unwrap_err(), FrameError::TooShort(0));
        assert_eq!(decode(&[FRAME_VERSION]).unwrap_err(), FrameError::TooShort(1));
    }

    #[test]
    fn test_decode_minimum_size_blob() {
        // version + count=1 + len=0: the smallest valid frame
        let blob = encode(&[b"".as_slice()]).unwrap();
        assert_eq!(blob.len(), HEADER_SIZE + LEN_PREFIX_SIZE);
        assert_eq!(decode(&blob).unwrap(), vec![b"".as_slice()]);

        // one byte short of the minimum
        assert!(matches!(
            decode(&blob[..blob.len() - 1]).unwrap_err(),
            FrameError::TooShort(_)
        ));
    }

    #[test]
    fn test_decode_bad_version() {
        let mut blob = encode(&[b"a".as_slice()]).unwrap();
        blob[0] = 99;
        assert_eq!(decode(&blob).unwrap_err(), FrameError::BadVersion(99));
    }

    #[test]
    fn test_decode_bad_count() {
        let mut blob = encode(&[b"a".as_slice()]).unwrap();
        blob[1] = 0;
        assert_eq!(decode(&blob).unwrap_err(), FrameError::BadCount(0));

        blob[1] = MAX_PARTS as u8 + 1;
        assert!(matches!(decode(&blob).unwrap_err(), FrameError::BadCount(_)));
    }

    #[test]
    fn test_decode_length_prefix_exceeds_remaining() {
        let mut blob = Vec::new();
        blob.push(FRAME_VERSION);
        blob.push(1);
        blob.extend_from_slice(&1000u32.to_be_bytes());
        blob.extend_from_slice(b"short");
        assert!(matches!(
            decode(&blob).unwrap_err(),
            FrameError::LengthOverflow { len: 1000, .. }
        ));
    }

    #[test]
    fn test_decode_max_length_prefix() {
        // u32::MAX length prefix must not wrap when compared against remaining
        let mut blob = Vec::new();
        blob.push(FRAME_VERSION);
        blob.push(1);
        blob.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            decode(&blob).unwrap_err(),
            FrameError::LengthOverflow { .. }
        ));
    }

    #[test]
    fn test_decode_trailing_bytes_rejected() {
        let mut blob = encode(&[b"part".as_slice()]).unwrap();
        blob.extend_from_slice(b"junk");
        assert_eq!(decode(&blob).unwrap_err(), FrameError::TrailingBytes(4));
    }

    #[test]
    fn test_decode_exact_count_mismatch() {
        let blob = encode(&[b"one".as_slice(), b"two".as_slice()]).unwrap();
        assert!(decode_exact(&blob, 2).is_ok());
        assert!(decode_exact(&blob, 3).is_err());
    }
}
