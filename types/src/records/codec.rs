//! Little-endian field helpers for program record layouts.
//!
//! The program stores integers little-endian, strings and vectors behind a `u32` length, and
//! optional values behind a one-byte tag. The `commonware_codec` primitives are big-endian, so
//! record codecs go through these helpers instead.

use bytes::{Buf, BufMut};
use commonware_codec::Error;

pub fn read_u8(reader: &mut impl Buf) -> Result<u8, Error> {
    if !reader.has_remaining() {
        return Err(Error::EndOfBuffer);
    }
    Ok(reader.get_u8())
}

pub fn read_u32_le(reader: &mut impl Buf) -> Result<u32, Error> {
    if reader.remaining() < 4 {
        return Err(Error::EndOfBuffer);
    }
    Ok(reader.get_u32_le())
}

pub fn read_u64_le(reader: &mut impl Buf) -> Result<u64, Error> {
    if reader.remaining() < 8 {
        return Err(Error::EndOfBuffer);
    }
    Ok(reader.get_u64_le())
}

pub fn read_bool(reader: &mut impl Buf) -> Result<bool, Error> {
    match read_u8(reader)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::Invalid("bool", "not 0 or 1")),
    }
}

pub fn write_bool(value: bool, writer: &mut impl BufMut) {
    writer.put_u8(u8::from(value));
}

/// Read a one-byte tag (0 = absent, 1 = present) followed by the value when present.
pub fn read_option<B: Buf, T>(
    reader: &mut B,
    read: impl FnOnce(&mut B) -> Result<T, Error>,
) -> Result<Option<T>, Error> {
    match read_u8(reader)? {
        0 => Ok(None),
        1 => Ok(Some(read(reader)?)),
        tag => Err(Error::InvalidEnum(tag)),
    }
}

pub fn write_option<B: BufMut, T>(value: &Option<T>, writer: &mut B, write: impl FnOnce(&T, &mut B)) {
    match value {
        None => writer.put_u8(0),
        Some(inner) => {
            writer.put_u8(1);
            write(inner, writer);
        }
    }
}

pub fn option_encode_size<T>(value: &Option<T>, size: impl FnOnce(&T) -> usize) -> usize {
    1 + value.as_ref().map_or(0, size)
}

/// Write a string as `u32` little-endian length followed by UTF-8 bytes.
pub fn write_string(s: &str, writer: &mut impl BufMut) {
    let bytes = s.as_bytes();
    writer.put_u32_le(bytes.len() as u32);
    writer.put_slice(bytes);
}

/// Read a `u32` little-endian length-prefixed UTF-8 string of at most `max_len` bytes.
pub fn read_string(reader: &mut impl Buf, max_len: usize) -> Result<String, Error> {
    let len = read_u32_le(reader)? as usize;
    if len > max_len {
        return Err(Error::Invalid("String", "too long"));
    }
    if reader.remaining() < len {
        return Err(Error::EndOfBuffer);
    }
    let mut bytes = vec![0u8; len];
    reader.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| Error::Invalid("String", "invalid UTF-8"))
}

pub fn string_encode_size(s: &str) -> usize {
    4 + s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_string_rejects_too_long() {
        let mut buf = Vec::new();
        write_string("hello", &mut buf);
        let err = read_string(&mut buf.as_slice(), 4).expect_err("should reject too-long string");
        assert!(matches!(err, Error::Invalid("String", "too long")));
    }

    #[test]
    fn read_string_rejects_truncated_buffers() {
        let mut buf = Vec::new();
        buf.put_u32_le(3);
        buf.extend_from_slice(b"ab");
        let err = read_string(&mut buf.as_slice(), 10).expect_err("should reject truncated buffer");
        assert!(matches!(err, Error::EndOfBuffer));
    }

    #[test]
    fn read_string_rejects_invalid_utf8() {
        let mut buf = Vec::new();
        buf.put_u32_le(2);
        buf.extend_from_slice(&[0xff, 0xff]);
        let err = read_string(&mut buf.as_slice(), 10).expect_err("should reject invalid UTF-8");
        assert!(matches!(err, Error::Invalid("String", "invalid UTF-8")));
    }

    #[test]
    fn string_length_prefix_is_little_endian() {
        let mut buf = Vec::new();
        write_string("abc", &mut buf);
        assert_eq!(buf, vec![3, 0, 0, 0, b'a', b'b', b'c']);
        assert_eq!(string_encode_size("abc"), buf.len());
    }

    #[test]
    fn option_tags() {
        let mut buf = Vec::new();
        write_option(&Some(7u64), &mut buf, |v, w| w.put_u64_le(*v));
        write_option(&None::<u64>, &mut buf, |v, w| w.put_u64_le(*v));
        assert_eq!(buf.len(), 1 + 8 + 1);

        let mut reader = buf.as_slice();
        assert_eq!(read_option(&mut reader, read_u64_le).unwrap(), Some(7));
        assert_eq!(read_option(&mut reader, read_u64_le).unwrap(), None);

        let err = read_option(&mut [2u8].as_slice(), read_u64_le).unwrap_err();
        assert!(matches!(err, Error::InvalidEnum(2)));
    }

    #[test]
    fn bool_rejects_other_values() {
        assert!(read_bool(&mut [1u8].as_slice()).unwrap());
        assert!(!read_bool(&mut [0u8].as_slice()).unwrap());
        assert!(matches!(
            read_bool(&mut [2u8].as_slice()),
            Err(Error::Invalid("bool", _))
        ));
        assert!(matches!(read_u64_le(&mut [0u8; 7].as_slice()), Err(Error::EndOfBuffer)));
    }
}
