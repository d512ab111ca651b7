//! Variable-length integer encoding for table columns
//!
//! Uses VByte encoding (7 bits per byte with continuation bit). Strings are
//! stored as a varint byte length followed by UTF-8 bytes.

use std::io::{self, Read, Result, Write};

/// Longest valid encoding of a u64
pub const MAX_VARINT_BYTES: usize = 10;

/// Encode u64 as variable-length integer
pub fn encode_varint(mut value: u64, writer: &mut impl Write) -> Result<usize> {
    let mut bytes_written = 0;
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }
        writer.write_all(&[byte])?;
        bytes_written += 1;
        if value == 0 {
            break;
        }
    }
    Ok(bytes_written)
}

/// Decode variable-length integer
pub fn decode_varint(reader: &mut impl Read) -> Result<u64> {
    let mut value = 0u64;
    let mut buf = [0u8; 1];

    for i in 0..MAX_VARINT_BYTES {
        reader.read_exact(&mut buf)?;
        let byte = buf[0];
        let shift = 7 * i as u32;
        let bits = (byte & 0x7F) as u64;
        // The tenth byte may only carry the top bit of a u64
        if i == MAX_VARINT_BYTES - 1 && bits > 1 {
            break;
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflow"))
}

/// Encode a length-prefixed UTF-8 string
pub fn encode_str(s: &str, writer: &mut impl Write) -> Result<usize> {
    let prefix = encode_varint(s.len() as u64, writer)?;
    writer.write_all(s.as_bytes())?;
    Ok(prefix + s.len())
}

/// Decode a length-prefixed UTF-8 string
///
/// `limit` caps the declared length so a corrupt prefix cannot trigger a
/// huge allocation.
pub fn decode_str(reader: &mut impl Read, limit: usize) -> Result<String> {
    let len = decode_varint(reader)?;
    if len > limit as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("string length {} exceeds remaining {} bytes", len, limit),
        ));
    }
    let mut bytes = vec![0u8; len as usize];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_varint_roundtrip() {
        let test_values = vec![0, 1, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX];
        for &value in &test_values {
            let mut buf = Vec::new();
            encode_varint(value, &mut buf).unwrap();
            let decoded = decode_varint(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_varint_sizes() {
        let mut buf = Vec::new();
        assert_eq!(encode_varint(127, &mut buf).unwrap(), 1);
        assert_eq!(encode_varint(128, &mut buf).unwrap(), 2);
        assert_eq!(encode_varint(u64::MAX, &mut buf).unwrap(), MAX_VARINT_BYTES);
    }

    #[test]
    fn test_varint_overflow() {
        let buf = [0xFFu8; 11];
        let err = decode_varint(&mut Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_varint_truncated() {
        let buf = [0x80u8, 0x80];
        let err = decode_varint(&mut Cursor::new(&buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_str_roundtrip() {
        let mut buf = Vec::new();
        encode_str("Konto eröffnen", &mut buf).unwrap();
        encode_str("", &mut buf).unwrap();
        let mut reader = Cursor::new(&buf);
        assert_eq!(decode_str(&mut reader, buf.len()).unwrap(), "Konto eröffnen");
        assert_eq!(decode_str(&mut reader, buf.len()).unwrap(), "");
    }

    #[test]
    fn test_str_length_limit() {
        let mut buf = Vec::new();
        encode_varint(1_000_000, &mut buf).unwrap();
        let err = decode_str(&mut Cursor::new(&buf), 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_str_invalid_utf8() {
        let buf = [2u8, 0xC3, 0x28];
        let err = decode_str(&mut Cursor::new(&buf), buf.len()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
