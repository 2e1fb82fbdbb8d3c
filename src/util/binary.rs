//! Little-endian primitive reader/writer over byte buffers.
//!
//! Every read checks the remaining length first, so nothing is consumed past
//! the declared width of a field.

use std::io::Cursor;

use anyhow::Result;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::BinaryError;

pub struct DataReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> DataReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(BinaryError::UnexpectedEnd { needed, remaining }.into());
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.cursor.read_u8()?)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        Ok(self.cursor.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.cursor.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        Ok(self.cursor.read_u64::<LittleEndian>()?)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.ensure(1)?;
        Ok(self.cursor.read_i8()?)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.ensure(2)?;
        Ok(self.cursor.read_i16::<LittleEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.cursor.read_i32::<LittleEndian>()?)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        Ok(self.cursor.read_i64::<LittleEndian>()?)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(4)?;
        Ok(self.cursor.read_f32::<LittleEndian>()?)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.ensure(8)?;
        Ok(self.cursor.read_f64::<LittleEndian>()?)
    }

    /// Borrow the next `len` bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.ensure(len)?;
        let start = self.position();
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }
}

#[derive(Debug, Default, Clone)]
pub struct DataWriter {
    data: Vec<u8>,
}

impl DataWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(1024),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.data.write_u8(value)?)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        Ok(self.data.write_u16::<LittleEndian>(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.data.write_u32::<LittleEndian>(value)?)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        Ok(self.data.write_u64::<LittleEndian>(value)?)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        Ok(self.data.write_i8(value)?)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        Ok(self.data.write_i16::<LittleEndian>(value)?)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.data.write_i32::<LittleEndian>(value)?)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        Ok(self.data.write_i64::<LittleEndian>(value)?)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        Ok(self.data.write_f32::<LittleEndian>(value)?)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        Ok(self.data.write_f64::<LittleEndian>(value)?)
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        self.data.extend_from_slice(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn little_endian_roundtrip() -> Result<()> {
        let mut w = DataWriter::new();
        w.write_u8(0xab)?;
        w.write_u16(0x1234)?;
        w.write_u32(0xdeadbeef)?;
        w.write_u64(u64::MAX)?;
        w.write_i16(-2)?;
        assert_eq!(
            &w.as_slice()[..7],
            &[0xab, 0x34, 0x12, 0xef, 0xbe, 0xad, 0xde]
        );

        let data = w.into_vec();
        let mut r = DataReader::new(&data);
        assert_eq!(r.read_u8()?, 0xab);
        assert_eq!(r.read_u16()?, 0x1234);
        assert_eq!(r.read_u32()?, 0xdeadbeef);
        assert_eq!(r.read_u64()?, u64::MAX);
        assert_eq!(r.read_i16()?, -2);
        assert!(r.is_empty());
        Ok(())
    }

    #[test]
    fn short_read_does_not_consume() {
        let data = [1u8, 2, 3];
        let mut r = DataReader::new(&data);
        let err = r.read_u32().unwrap_err();
        assert_eq!(
            err.downcast_ref::<BinaryError>(),
            Some(&BinaryError::UnexpectedEnd {
                needed: 4,
                remaining: 3
            })
        );
        assert_eq!(r.position(), 0);
        assert_eq!(r.read_bytes(3).unwrap(), &[1, 2, 3]);
        assert!(r.read_u8().is_err());
    }
}
