// ---------------------------------------------------------------------------
// file_header – Store file header with magic bytes, version, and checksum
// ---------------------------------------------------------------------------
//
// Header format (32 bytes, fixed-size, little-endian):
//   [0..4]   Magic bytes: "ISEL"
//   [4..8]   Format version (u32)
//   [8..12]  Flags (u32: bit 0 = payload is lz4-compressed)
//   [12..20] Timestamp (Unix epoch seconds, u64)
//   [20..24] Record count (u32)
//   [24..28] Uncompressed payload size (u32)
//   [28..32] xxHash32 checksum of the stored payload (everything after the header)
//
// On write: encode records -> maybe compress -> prepend header
// On read:  check magic -> check version -> validate checksum -> strip header

use xxhash_rust::xxh32::xxh32;

/// Magic bytes identifying an island grid store file.
pub const MAGIC: [u8; 4] = *b"ISEL";

pub const HEADER_SIZE: usize = 32;

pub const HEADER_FORMAT_VERSION: u32 = 1;

pub const FLAG_COMPRESSED: u32 = 1;

const XXHASH_SEED: u32 = 0;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("store file is too short ({len} bytes, need at least {min} for the header)", min = HEADER_SIZE)]
    TooShort { len: usize },
    #[error("not an island grid store file (bad magic bytes)")]
    BadMagic,
    #[error("store file uses header format version {0}, this build supports up to {max}", max = HEADER_FORMAT_VERSION)]
    UnsupportedVersion(u32),
    #[error("checksum mismatch (expected {expected:#010X}, got {computed:#010X})")]
    ChecksumMismatch { expected: u32, computed: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub format_version: u32,
    pub flags: u32,
    pub timestamp: u64,
    pub record_count: u32,
    pub uncompressed_size: u32,
    pub checksum: u32,
}

impl FileHeader {
    /// Header for `payload` as it will be stored on disk.
    pub fn new(payload: &[u8], record_count: u32, uncompressed_size: u32, flags: u32) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            format_version: HEADER_FORMAT_VERSION,
            flags,
            timestamp,
            record_count,
            uncompressed_size,
            checksum: xxh32(payload, XXHASH_SEED),
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Returns `[header (32 bytes)] ++ [payload]`.
pub fn wrap_with_header(payload: &[u8], record_count: u32, uncompressed_size: u32, flags: u32) -> Vec<u8> {
    let header = FileHeader::new(payload, record_count, uncompressed_size, flags);
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());

    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&header.format_version.to_le_bytes());
    out.extend_from_slice(&header.flags.to_le_bytes());
    out.extend_from_slice(&header.timestamp.to_le_bytes());
    out.extend_from_slice(&header.record_count.to_le_bytes());
    out.extend_from_slice(&header.uncompressed_size.to_le_bytes());
    out.extend_from_slice(&header.checksum.to_le_bytes());

    out.extend_from_slice(payload);
    out
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Parses and validates the header, returning it with the payload slice.
pub fn unwrap_header(bytes: &[u8]) -> Result<(FileHeader, &[u8]), HeaderError> {
    if bytes.len() >= 4 && bytes[..4] != MAGIC {
        return Err(HeaderError::BadMagic);
    }
    if bytes.len() < HEADER_SIZE {
        return Err(HeaderError::TooShort { len: bytes.len() });
    }

    let format_version = le_u32(bytes, 4);
    if format_version > HEADER_FORMAT_VERSION {
        return Err(HeaderError::UnsupportedVersion(format_version));
    }
    let flags = le_u32(bytes, 8);
    let timestamp = u64::from_le_bytes([
        bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
    ]);
    let record_count = le_u32(bytes, 20);
    let uncompressed_size = le_u32(bytes, 24);
    let checksum = le_u32(bytes, 28);

    let payload = &bytes[HEADER_SIZE..];
    let computed = xxh32(payload, XXHASH_SEED);
    if computed != checksum {
        return Err(HeaderError::ChecksumMismatch {
            expected: checksum,
            computed,
        });
    }

    Ok((
        FileHeader {
            format_version,
            flags,
            timestamp,
            record_count,
            uncompressed_size,
            checksum,
        },
        payload,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_and_unwrap() {
        let payload = b"three cells worth of bytes";
        let wrapped = wrap_with_header(payload, 3, payload.len() as u32, 0);

        assert_eq!(&wrapped[..4], b"ISEL");
        assert_eq!(wrapped.len(), HEADER_SIZE + payload.len());

        let (header, body) = unwrap_header(&wrapped).unwrap();
        assert_eq!(header.format_version, HEADER_FORMAT_VERSION);
        assert_eq!(header.record_count, 3);
        assert!(!header.is_compressed());
        assert_eq!(body, payload);
    }

    #[test]
    fn test_compressed_flag_survives() {
        let wrapped = wrap_with_header(b"x", 1, 400, FLAG_COMPRESSED);
        let (header, _) = unwrap_header(&wrapped).unwrap();
        assert!(header.is_compressed());
        assert_eq!(header.uncompressed_size, 400);
    }

    #[test]
    fn test_empty_payload() {
        let wrapped = wrap_with_header(b"", 0, 0, 0);
        assert_eq!(wrapped.len(), HEADER_SIZE);
        let (header, body) = unwrap_header(&wrapped).unwrap();
        assert_eq!(header.record_count, 0);
        assert!(body.is_empty());
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let mut wrapped = wrap_with_header(b"payload", 1, 7, 0);
        let last = wrapped.len() - 1;
        wrapped[last] ^= 0xFF;

        let err = unwrap_header(&wrapped).unwrap_err();
        assert!(matches!(err, HeaderError::ChecksumMismatch { .. }));
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut wrapped = wrap_with_header(b"payload", 1, 7, 0);
        wrapped[..4].copy_from_slice(b"ZZZZ");
        assert_eq!(unwrap_header(&wrapped).unwrap_err(), HeaderError::BadMagic);
    }

    #[test]
    fn test_future_version_rejected() {
        let mut wrapped = wrap_with_header(b"payload", 1, 7, 0);
        wrapped[4..8].copy_from_slice(&999u32.to_le_bytes());
        assert_eq!(
            unwrap_header(&wrapped).unwrap_err(),
            HeaderError::UnsupportedVersion(999)
        );
    }

    #[test]
    fn test_truncated_header_detected() {
        assert_eq!(
            unwrap_header(b"ISEL\x01\x00").unwrap_err(),
            HeaderError::TooShort { len: 6 }
        );
        assert_eq!(
            unwrap_header(b"").unwrap_err(),
            HeaderError::TooShort { len: 0 }
        );
    }
}
