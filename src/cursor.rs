//! Bounds-checked big-endian reads over a window of borrowed bytes.

use crate::boxes::FourCC;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// A read position inside `data`, where `data[0]` sits at absolute offset `base`.
///
/// Positions taken and returned by the cursor are always absolute, so a
/// sub-cursor over a box payload reports the same offsets as the cursor over
/// the whole file.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    base: u64,
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base(data, 0)
    }

    pub fn with_base(data: &'a [u8], base: u64) -> Self {
        ByteCursor { data, base, pos: 0 }
    }

    /// Absolute offset of the first byte in the window.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Absolute offset one past the last byte in the window.
    pub fn end(&self) -> u64 {
        self.base + self.data.len() as u64
    }

    /// Absolute offset of the next read.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }

    pub fn remaining(&self) -> u64 {
        (self.data.len() - self.pos) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn out_of_bounds(&self, offset: u64, needed: u64) -> Error {
        Error::OutOfBounds {
            offset,
            needed,
            available: self.end().saturating_sub(offset),
        }
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset < self.base || offset > self.end() {
            return Err(self.out_of_bounds(offset, 0));
        }
        self.pos = (offset - self.base) as usize;
        Ok(())
    }

    pub fn skip(&mut self, n: u64) -> Result<()> {
        if n > self.remaining() {
            return Err(self.out_of_bounds(self.position(), n));
        }
        self.pos += n as usize;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: u64) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(self.out_of_bounds(self.position(), n));
        }
        let start = self.pos;
        self.pos += n as usize;
        Ok(&self.data[start..self.pos])
    }

    /// Everything from the current position to the end of the window.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Look at `n` bytes at an absolute offset without moving.
    pub fn peek_at(&self, offset: u64, n: u64) -> Result<&'a [u8]> {
        if offset < self.base || offset + n > self.end() {
            return Err(self.out_of_bounds(offset, n));
        }
        let start = (offset - self.base) as usize;
        Ok(&self.data[start..start + n as usize])
    }

    /// A new cursor restricted to `[start, end)` (absolute offsets).
    pub fn sub_cursor(&self, start: u64, end: u64) -> Result<ByteCursor<'a>> {
        let slice = self.peek_at(start, end.saturating_sub(start))?;
        Ok(ByteCursor::with_base(slice, start))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.read_bytes(2)?))
    }

    pub fn read_u24(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u24(self.read_bytes(3)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(self.read_bytes(8)?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.read_bytes(8)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(BigEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(BigEndian::read_f64(self.read_bytes(8)?))
    }

    /// Unsigned integer of 1..=8 bytes.
    pub fn read_uint(&mut self, n: u64) -> Result<u64> {
        debug_assert!((1..=8).contains(&n));
        Ok(BigEndian::read_uint(self.read_bytes(n)?, n as usize))
    }

    /// Sign-extended integer of 1..=8 bytes.
    pub fn read_int(&mut self, n: u64) -> Result<i64> {
        debug_assert!((1..=8).contains(&n));
        Ok(BigEndian::read_int(self.read_bytes(n)?, n as usize))
    }

    /// 16.16 fixed point.
    pub fn read_fixed16_16(&mut self) -> Result<f64> {
        Ok(self.read_i32()? as f64 / 65536.0)
    }

    /// 8.8 fixed point.
    pub fn read_fixed8_8(&mut self) -> Result<f64> {
        Ok(self.read_i16()? as f64 / 256.0)
    }

    pub fn read_fourcc(&mut self) -> Result<FourCC> {
        let b = self.read_bytes(4)?;
        Ok(FourCC([b[0], b[1], b[2], b[3]]))
    }

    /// Version byte and 24-bit flags of a full box.
    pub fn read_version_flags(&mut self) -> Result<(u8, u32)> {
        let version = self.read_u8()?;
        let flags = self.read_u24()?;
        Ok((version, flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_and_tracks_absolute_position() {
        let data = [0x00, 0x01, 0xff, 0xfe, 0x00, 0x00, 0x00, 0x2a, b'f', b't', b'y', b'p'];
        let mut cur = ByteCursor::with_base(&data, 100);

        assert_eq!(cur.read_u16().unwrap(), 1);
        assert_eq!(cur.read_i16().unwrap(), -2);
        assert_eq!(cur.position(), 104);
        assert_eq!(cur.read_u32().unwrap(), 42);
        assert_eq!(cur.read_fourcc().unwrap(), FourCC(*b"ftyp"));
        assert!(cur.is_empty());
    }

    #[test]
    fn read_past_end_is_out_of_bounds() {
        let data = [1u8, 2, 3];
        let mut cur = ByteCursor::with_base(&data, 10);
        match cur.read_u32() {
            Err(Error::OutOfBounds {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 10);
                assert_eq!(needed, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected OutOfBounds, got {:?}", other),
        }
        // failed read does not move the cursor
        assert_eq!(cur.position(), 10);
    }

    #[test]
    fn variable_width_ints_sign_extend() {
        let data = [0xff, 0xff, 0xfe, 0x00, 0x80];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.read_int(3).unwrap(), -2);
        assert_eq!(cur.read_uint(2).unwrap(), 0x80);
    }

    #[test]
    fn sub_cursor_keeps_absolute_offsets() {
        let data: Vec<u8> = (0u8..32).collect();
        let cur = ByteCursor::new(&data);
        let mut sub = cur.sub_cursor(8, 16).unwrap();
        assert_eq!(sub.base(), 8);
        assert_eq!(sub.end(), 16);
        assert_eq!(sub.read_u8().unwrap(), 8);
        assert!(sub.seek(17).is_err());
        assert!(cur.sub_cursor(30, 40).is_err());
    }
}
