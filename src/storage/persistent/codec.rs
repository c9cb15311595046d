//! Binary framing for blob files.
//!
//! A blob file is a header followed by two frames, the key and the payload:
//!
//! ```text
//! [magic: 4 bytes][version: 1 byte]
//! [version: 1 byte][length: 4 bytes LE][key bytes][crc32: 4 bytes LE]
//! [version: 1 byte][length: 4 bytes LE][payload bytes][crc32: 4 bytes LE]
//! ```

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};

use crc32fast::Hasher;

/// Current codec version.
const CODEC_VERSION: u8 = 1;

/// Magic bytes identifying a consolidata blob file.
pub const MAGIC: [u8; 4] = *b"CNSL";

/// Largest frame accepted on read (256 MiB).
const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

fn crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Frames `data` with version, length and checksum.
///
/// # Errors
/// Returns `InvalidInput` if `data` exceeds the maximum frame size.
pub fn encode_frame(data: &[u8]) -> IoResult<Vec<u8>> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(IoError::new(
            ErrorKind::InvalidInput,
            format!("frame size {} exceeds maximum {}", data.len(), MAX_FRAME_SIZE),
        ));
    }
    #[allow(clippy::cast_possible_truncation)]
    let len = data.len() as u32;

    let mut out = Vec::with_capacity(1 + 4 + data.len() + 4);
    out.push(CODEC_VERSION);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(&crc(data).to_le_bytes());
    Ok(out)
}

/// Reads one frame, verifying version and checksum.
///
/// # Errors
/// - unsupported version
/// - declared length above the maximum
/// - CRC mismatch (corruption)
/// - short read
pub fn decode_frame(reader: &mut impl Read) -> IoResult<Vec<u8>> {
    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != CODEC_VERSION {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("unsupported codec version: {} (expected {})", version[0], CODEC_VERSION),
        ));
    }

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("frame size {len} exceeds maximum {MAX_FRAME_SIZE}"),
        ));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored = u32::from_le_bytes(crc_bytes);
    let computed = crc(&data);
    if stored != computed {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("CRC mismatch: stored={stored:08x}, computed={computed:08x} (data corrupted)"),
        ));
    }

    Ok(data)
}

/// Write the file header (magic + version).
pub fn write_header(writer: &mut impl Write) -> IoResult<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[CODEC_VERSION])?;
    Ok(())
}

/// Read and validate the file header.
pub fn read_header(reader: &mut impl Read) -> IoResult<u8> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}"),
        ));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    Ok(version[0])
}

/// Encodes a complete blob file: header, key frame, payload frame.
///
/// # Errors
/// Propagates frame-size errors.
pub fn encode_blob(key: &str, payload: &[u8]) -> IoResult<Vec<u8>> {
    let mut out = Vec::with_capacity(5 + key.len() + payload.len() + 18);
    write_header(&mut out)?;
    out.extend_from_slice(&encode_frame(key.as_bytes())?);
    out.extend_from_slice(&encode_frame(payload)?);
    Ok(out)
}

/// Reads only the header and key frame of a blob file.
///
/// # Errors
/// Fails on a bad header, corrupt key frame, or non-UTF-8 key.
pub fn decode_key(reader: &mut impl Read) -> IoResult<String> {
    read_header(reader)?;
    let key = decode_frame(reader)?;
    String::from_utf8(key).map_err(|e| IoError::new(ErrorKind::InvalidData, e))
}

/// Reads a complete blob file.
///
/// # Errors
/// Fails on any header, framing, or checksum error.
pub fn decode_blob(reader: &mut impl Read) -> IoResult<(String, Vec<u8>)> {
    let key = decode_key(reader)?;
    let payload = decode_frame(reader)?;
    Ok((key, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_blob_roundtrip() {
        let encoded = encode_blob("fp.dupDocIDs", b"[1,2,3]").unwrap();
        let (key, payload) = decode_blob(&mut Cursor::new(encoded)).unwrap();
        assert_eq!(key, "fp.dupDocIDs");
        assert_eq!(payload, b"[1,2,3]");
    }

    #[test]
    fn test_detects_corruption() {
        let mut encoded = encode_blob("k", b"payload bytes").unwrap();
        let last = encoded.len() - 6;
        encoded[last] ^= 0xFF;
        let err = decode_blob(&mut Cursor::new(encoded)).unwrap_err();
        assert!(err.to_string().contains("CRC"));
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let mut bad = vec![CODEC_VERSION];
        bad.extend_from_slice(&(300_000_000u32).to_le_bytes());
        let err = decode_frame(&mut Cursor::new(bad)).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = read_header(&mut Cursor::new(b"XXXX\x01".to_vec())).unwrap_err();
        assert!(err.to_string().contains("invalid magic"));
    }

    #[test]
    fn test_truncated_payload() {
        let encoded = encode_blob("k", b"0123456789").unwrap();
        let cut = encoded[..encoded.len() - 3].to_vec();
        assert!(decode_blob(&mut Cursor::new(cut)).is_err());
    }
}
