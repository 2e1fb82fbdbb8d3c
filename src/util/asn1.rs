//! Low level DER writer and reader.
//!
//! [Encoder] writes headers with a placeholder length and fixes lengths up
//! when a constructed element is closed. The reader side only accepts the
//! subset produced by DER: single byte tags and minimal definite lengths.

use anyhow::Result;

use crate::{error::DerError, util::binary::DataReader};

/// Longest length prefix accepted when reading.
const MAX_LENGTH_BYTES: usize = 4;

pub fn encode_len(len: usize) -> Vec<u8> {
    if len < 0x80 {
        return vec![len as u8];
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let mut out = Vec::with_capacity(1 + bytes.len() - skip);
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
    out
}

pub fn write_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&encode_len(len));
}

pub fn write_tlv(buf: &mut Vec<u8>, tag: u8, val: &[u8]) {
    buf.push(tag);
    write_len(buf, val.len());
    buf.extend_from_slice(val);
}

/// Read single byte tag. High tag number form is not part of anything we decode.
pub fn read_tag(reader: &mut DataReader) -> Result<u8> {
    let tag = reader.read_u8()?;
    if tag & 0x1f == 0x1f {
        return Err(DerError::UnsupportedTag(tag).into());
    }
    Ok(tag)
}

/// Read definite length in minimal encoding.
pub fn read_size(reader: &mut DataReader) -> Result<usize> {
    let b1 = reader.read_u8()? as usize;
    if b1 & 0x80 == 0 {
        return Ok(b1);
    }
    let size = b1 & 0x7f;
    if size == 0 || size > MAX_LENGTH_BYTES {
        return Err(DerError::InvalidLength.into());
    }
    let mut out = 0usize;
    for i in 0..size {
        let c = reader.read_u8()? as usize;
        if i == 0 && c == 0 {
            return Err(DerError::InvalidLength.into());
        }
        out = (out << 8) | c;
    }
    if out < 0x80 {
        return Err(DerError::InvalidLength.into());
    }
    Ok(out)
}

/// Read complete element header and borrow its content.
pub fn read_element<'a>(reader: &mut DataReader<'a>) -> Result<(u8, &'a [u8])> {
    let tag = read_tag(reader)?;
    let size = read_size(reader)?;
    let content = reader.read_bytes(size)?;
    Ok((tag, content))
}

/// DER INTEGER content for unsigned value: minimal big-endian, leading zero when high bit set.
pub fn uint_content(val: u64) -> Vec<u8> {
    let bytes = val.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    let mut out = Vec::with_capacity(9 - skip);
    if bytes[skip] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(&bytes[skip..]);
    out
}

#[derive(Debug, Clone)]
struct Asn1EncoderStackEntry {
    pos: usize,
}

#[derive(Debug, Clone)]
pub struct Encoder {
    buffer: Vec<u8>,
    stack: Vec<Asn1EncoderStackEntry>,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            stack: Vec::new(),
        }
    }
    pub fn start_seq(&mut self, tag: u8) {
        self.buffer.push(tag);
        self.stack.push(Asn1EncoderStackEntry {
            pos: self.buffer.len() - 1,
        });
        self.buffer.push(0);
    }
    pub fn fix(&mut self) {
        while !self.stack.is_empty() {
            self.end_seq()
        }
    }
    pub fn end_seq(&mut self) {
        if let Some(a) = self.stack.pop() {
            let s = self.buffer.len() - a.pos - 2;
            let len = encode_len(s);
            self.buffer.splice(a.pos + 1..a.pos + 2, len);
        }
    }
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
    pub fn write_tlv(&mut self, tag: u8, val: &[u8]) {
        write_tlv(&mut self.buffer, tag, val)
    }
    pub fn write_raw(&mut self, val: &[u8]) {
        self.buffer.extend_from_slice(val)
    }
    pub fn write_octet_string(&mut self, val: &[u8]) {
        self.write_tlv(0x04, val)
    }
    pub fn write_string(&mut self, val: &str) {
        self.write_tlv(0x0c, val.as_bytes())
    }
    pub fn write_string_with_tag(&mut self, tag: u8, val: &str) {
        self.write_tlv(tag, val.as_bytes())
    }
    pub fn write_bool(&mut self, val: bool) {
        self.write_tlv(0x01, &[if val { 0xff } else { 0 }])
    }
    pub fn write_uint(&mut self, val: u64) {
        self.write_tlv(0x02, &uint_content(val))
    }
    pub fn write_oid(&mut self, val: &str) -> Result<()> {
        let oid = const_oid::ObjectIdentifier::new(val)
            .map_err(|e| DerError::InvalidOid(format!("{} ({})", val, e)))?;
        self.write_tlv(0x06, oid.as_bytes());
        Ok(())
    }

    pub fn encode(mut self) -> Vec<u8> {
        self.fix();
        self.buffer
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(
            read_size(&mut DataReader::new(&[0x82, 0x27, 0x32])).unwrap(),
            10034
        );
        assert_eq!(read_size(&mut DataReader::new(&[0x08])).unwrap(), 8);
        assert_eq!(encode_len(0x7f), vec![0x7f]);
        assert_eq!(encode_len(0x80), vec![0x81, 0x80]);
        assert_eq!(encode_len(0x1234), vec![0x82, 0x12, 0x34]);
        assert_eq!(encode_len(0x10000), vec![0x83, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn rejects_non_der_lengths() {
        for data in [
            &[0x80u8][..],
            &[0x81, 0x10],
            &[0x82, 0x00, 0x90],
            &[0x85, 1, 1, 1, 1, 1],
        ] {
            let err = read_size(&mut DataReader::new(data)).unwrap_err();
            assert_eq!(
                err.downcast_ref::<DerError>(),
                Some(&DerError::InvalidLength)
            );
        }
        assert!(read_tag(&mut DataReader::new(&[0x1f, 0x81])).is_err());
    }

    #[test]
    fn integers() {
        let mut e = Encoder::new();
        e.write_uint(127);
        e.write_uint(128);
        e.write_uint(256);
        e.write_uint(0);
        assert_eq!(
            e.encode(),
            vec![0x02, 0x01, 0x7f, 0x02, 0x02, 0x0, 0x80, 0x02, 0x02, 0x1, 0x0, 0x02, 0x01, 0x00]
        );
        assert_eq!(uint_content(u64::MAX), vec![0, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn nested_length_fixup() -> Result<()> {
        let mut e = Encoder::new();
        e.start_seq(0x30);
        e.write_bool(true);
        e.start_seq(0x30);
        e.write_octet_string(&[0xaa; 200]);
        e.end_seq();
        e.write_oid("1.2.840.10045.4.3.2")?;
        let out = e.encode();
        assert_eq!(&out[..2], &[0x30, 0x81]);
        assert_eq!(out[2] as usize, out.len() - 3);
        assert_eq!(&out[3..6], &[0x01, 0x01, 0xff]);
        assert_eq!(&out[6..9], &[0x30, 0x81, 203]);
        assert_eq!(
            hex::encode(&out[out.len() - 10..]),
            "06082a8648ce3d040302"
        );

        let mut r = DataReader::new(&out);
        let (tag, content) = read_element(&mut r)?;
        assert_eq!(tag, 0x30);
        assert_eq!(content.len(), out.len() - 3);
        assert!(r.is_empty());
        Ok(())
    }

    #[test]
    fn bad_oid() {
        let mut e = Encoder::new();
        assert!(e.write_oid("not.an.oid").is_err());
    }
}
