//! Wire framing: tags, varints, zigzag, fixed-width and length-delimited payloads.
//!
//! [`ProtoWriter`] writes to any `std::io::Write` sink; [`ProtoReader`] walks a
//! byte slice by position without copying, in the same spirit as a cursor over
//! the input. Fixed-width values are always little-endian.

use crate::codec::CodecError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

/// Largest legal field number, `2^29 - 1`.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Field numbers set aside by the protocol-buffer implementation.
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<u32> = 19000..=19999;
/// A varint never spans more than this many bytes.
pub const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => WireType::Varint,
            1 => WireType::Fixed64,
            2 => WireType::LengthDelimited,
            3 => WireType::StartGroup,
            4 => WireType::EndGroup,
            5 => WireType::Fixed32,
            _ => return None,
        })
    }
}

pub fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << 3) | wire_type as u32
}

pub fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

pub fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

pub fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

pub fn varint_size(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}

pub fn tag_size(field_number: u32) -> usize {
    varint_size(make_tag(field_number, WireType::Varint) as u64)
}

/// Decode one varint from the front of `buf`, returning the value and bytes consumed.
pub fn decode_varint(buf: &[u8]) -> Result<(u64, usize), CodecError> {
    let mut value = 0u64;
    for (i, &b) in buf.iter().enumerate().take(MAX_VARINT_LEN) {
        value |= ((b & 0x7f) as u64) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if buf.len() < MAX_VARINT_LEN {
        Err(CodecError::CorruptData("truncated varint".to_string()))
    } else {
        Err(CodecError::CorruptData("malformed varint".to_string()))
    }
}

pub struct ProtoWriter<W: Write> {
    inner: W,
}

impl<W: Write> ProtoWriter<W> {
    pub fn new(inner: W) -> Self {
        ProtoWriter { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_varint(&mut self, mut v: u64) -> Result<(), CodecError> {
        while v >= 0x80 {
            self.inner.write_u8((v as u8 & 0x7f) | 0x80)?;
            v >>= 7;
        }
        self.inner.write_u8(v as u8)?;
        Ok(())
    }

    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<(), CodecError> {
        self.write_varint(make_tag(field_number, wire_type) as u64)
    }

    pub fn write_fixed32(&mut self, v: u32) -> Result<(), CodecError> {
        self.inner.write_u32::<LittleEndian>(v)?;
        Ok(())
    }

    pub fn write_fixed64(&mut self, v: u64) -> Result<(), CodecError> {
        self.inner.write_u64::<LittleEndian>(v)?;
        Ok(())
    }

    /// Length prefix followed by the bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.write_varint(bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.inner.write_all(bytes)?;
        Ok(())
    }
}

/// Reads framed values from a byte slice.
pub struct ProtoReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ProtoReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ProtoReader {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    fn remaining(&self) -> &'a [u8] {
        let bytes: &'a [u8] = *self.cursor.get_ref();
        &bytes[self.position().min(bytes.len())..]
    }

    /// Input consumed since `start`, e.g. the raw bytes of a field just skipped.
    pub fn slice_from(&self, start: usize) -> &'a [u8] {
        let bytes: &'a [u8] = *self.cursor.get_ref();
        &bytes[start.min(bytes.len())..self.position().min(bytes.len())]
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining().is_empty()
    }

    fn advance(&mut self, n: usize) {
        self.cursor.set_position((self.position() + n) as u64);
    }

    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        let (value, len) = decode_varint(self.remaining())?;
        self.advance(len);
        Ok(value)
    }

    /// Field number and wire type of the next field.
    pub fn read_tag(&mut self) -> Result<(u32, WireType), CodecError> {
        let tag = self.read_varint()?;
        let tag = u32::try_from(tag).map_err(|_| CodecError::CorruptData(format!("tag out of range: {}", tag)))?;
        let field_number = tag >> 3;
        if field_number == 0 {
            return Err(CodecError::CorruptData("invalid field number 0".to_string()));
        }
        let wire_type = WireType::from_u8((tag & 7) as u8)
            .ok_or_else(|| CodecError::CorruptData(format!("invalid wire type {}", tag & 7)))?;
        Ok((field_number, wire_type))
    }

    pub fn read_fixed32(&mut self) -> Result<u32, CodecError> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| CodecError::CorruptData("truncated fixed32".to_string()))
    }

    pub fn read_fixed64(&mut self) -> Result<u64, CodecError> {
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| CodecError::CorruptData("truncated fixed64".to_string()))
    }

    /// Length-prefixed payload, borrowed from the input.
    pub fn read_length_delimited(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.read_varint()?;
        if len > i32::MAX as u64 {
            return Err(CodecError::CorruptData(format!("negative length: {}", len as i64)));
        }
        let len = len as usize;
        let rest = self.remaining();
        if len > rest.len() {
            return Err(CodecError::CorruptData(format!(
                "truncated length-delimited field: need {} bytes, have {}",
                len,
                rest.len()
            )));
        }
        self.advance(len);
        Ok(&rest[..len])
    }

    /// Skip the payload of a field whose tag was just read.
    ///
    /// Nested groups are tracked on an explicit stack, so input depth never
    /// grows the call stack.
    pub fn skip_field(&mut self, field_number: u32, wire_type: WireType) -> Result<(), CodecError> {
        match wire_type {
            WireType::Varint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.read_fixed64()?;
            }
            WireType::Fixed32 => {
                self.read_fixed32()?;
            }
            WireType::LengthDelimited => {
                self.read_length_delimited()?;
            }
            WireType::StartGroup => {
                let mut open = vec![field_number];
                while let Some(&current) = open.last() {
                    if self.is_at_end() {
                        return Err(CodecError::CorruptData(format!("unterminated group {}", current)));
                    }
                    let (inner, inner_type) = self.read_tag()?;
                    match inner_type {
                        WireType::EndGroup if inner == current => {
                            open.pop();
                        }
                        WireType::EndGroup => {
                            return Err(CodecError::CorruptData(format!(
                                "mismatched end group: expected {}, got {}",
                                current, inner
                            )));
                        }
                        WireType::StartGroup => open.push(inner),
                        other => self.skip_field(inner, other)?,
                    }
                }
            }
            WireType::EndGroup => {
                return Err(CodecError::CorruptData(format!("unexpected end group {}", field_number)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varint(v: u64) -> Vec<u8> {
        let mut w = ProtoWriter::new(Vec::new());
        w.write_varint(v).expect("write");
        w.into_inner()
    }

    #[test]
    fn varint_boundaries() {
        assert_eq!(varint(0), vec![0x00]);
        assert_eq!(varint(127), vec![0x7f]);
        assert_eq!(varint(128), vec![0x80, 0x01]);
        assert_eq!(varint(300), vec![0xac, 0x02]);
        assert_eq!(varint(i32::MAX as u64), vec![0xff, 0xff, 0xff, 0xff, 0x07]);
        assert_eq!(varint(u64::MAX).len(), 10);
        assert_eq!(varint_size(u64::MAX), 10);
        assert_eq!(varint_size(300), 2);
    }

    #[test]
    fn varint_decode_reports_consumed() {
        assert_eq!(decode_varint(&[0xac, 0x02, 0xff]).expect("decode"), (300, 2));
        let (v, n) = decode_varint(&varint(u64::MAX)).expect("decode");
        assert_eq!((v, n), (u64::MAX, 10));
    }

    #[test]
    fn varint_ten_continuation_bytes_is_corrupt() {
        let bytes = [0xffu8; 11];
        assert!(matches!(decode_varint(&bytes), Err(CodecError::CorruptData(_))));
        assert!(matches!(decode_varint(&[0x80, 0x80]), Err(CodecError::CorruptData(_))));
    }

    #[test]
    fn zigzag_mapping() {
        assert_eq!(zigzag32(0), 0);
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag32(1), 2);
        assert_eq!(zigzag32(-2), 3);
        assert_eq!(zigzag32(i32::MIN), u32::MAX);
        assert_eq!(zigzag64(i64::MIN), u64::MAX);
        for n in [0, 1, -1, 12345, -12345, i32::MAX, i32::MIN] {
            assert_eq!(unzigzag32(zigzag32(n)), n);
            assert_eq!(unzigzag64(zigzag64(n as i64)), n as i64);
        }
    }

    #[test]
    fn tag_byte() {
        assert_eq!(make_tag(2, WireType::Varint), 0x10);
        assert_eq!(make_tag(1, WireType::LengthDelimited), 0x0a);
        assert_eq!(tag_size(15), 1);
        assert_eq!(tag_size(16), 2);
    }

    #[test]
    fn length_delimited_bounds() {
        let mut r = ProtoReader::new(&[0x03, b'a', b'b', b'c', 0x09]);
        assert_eq!(r.read_length_delimited().expect("payload"), b"abc");
        assert!(matches!(r.read_length_delimited(), Err(CodecError::CorruptData(_))));

        let mut negative = ProtoReader::new(&[0xff, 0xff, 0xff, 0xff, 0x0f]);
        let err = negative.read_length_delimited().expect_err("negative");
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn truncated_fixed_width() {
        let mut r = ProtoReader::new(&[1, 2, 3]);
        assert!(matches!(r.read_fixed32(), Err(CodecError::CorruptData(_))));
    }

    #[test]
    fn skip_group() {
        // field 1 start-group { field 2 varint 5 } field 1 end-group, then field 3 varint 1
        let bytes = [0x0b, 0x10, 0x05, 0x0c, 0x18, 0x01];
        let mut r = ProtoReader::new(&bytes);
        let (n, wt) = r.read_tag().expect("tag");
        r.skip_field(n, wt).expect("skip");
        assert_eq!(r.position(), 4);
        assert_eq!(r.read_tag().expect("tag"), (3, WireType::Varint));
    }

    #[test]
    fn skip_nested_groups_without_recursion() {
        let mut bytes = vec![0x0b; 100_000];
        bytes.extend(std::iter::repeat(0x0c).take(100_000));
        let mut r = ProtoReader::new(&bytes);
        let (n, wt) = r.read_tag().expect("tag");
        r.skip_field(n, wt).expect("skip");
        assert!(r.is_at_end());

        let open_only = vec![0x0b; 100_000];
        let mut r = ProtoReader::new(&open_only);
        let (n, wt) = r.read_tag().expect("tag");
        assert!(matches!(r.skip_field(n, wt), Err(CodecError::CorruptData(_))));

        // field 1 { field 2 { } field 3 end }
        let mut r = ProtoReader::new(&[0x0b, 0x13, 0x1c]);
        let (n, wt) = r.read_tag().expect("tag");
        let err = r.skip_field(n, wt).expect_err("mismatched");
        assert!(err.to_string().contains("expected 2, got 3"));
    }
}
