//! Canonical wire encoding.
//!
//! - Unsigned integers are big-endian.
//! - bits = u32 bit_len || ceil(bit_len / 8) packed bytes, pad bits zero
//! - digests and identifiers are 32 raw bytes
//! - trailing bytes are rejected by message decoders.

use thiserror::Error;

use crate::auth::constants::MAX_WIRE_BITS;
use crate::bits::{BitVector, BitsError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated input")]
    Truncated,
    #[error("length exceeds remaining bytes")]
    LengthOutOfRange,
    #[error("trailing bytes not permitted")]
    TrailingBytes,
    #[error("invalid value: {0}")]
    Invalid(&'static str),
}

impl From<BitsError> for CodecError {
    fn from(_: BitsError) -> Self {
        CodecError::Invalid("bit vector")
    }
}

#[derive(Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self { Self { buf, pos: 0 } }
    pub fn remaining(&self) -> usize { self.buf.len().saturating_sub(self.pos) }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n { return Err(CodecError::Truncated); }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
    pub fn read_exact<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let b = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(b);
        Ok(out)
    }
    pub fn read_bits(&mut self) -> Result<BitVector, CodecError> {
        let len = self.read_u32()? as usize;
        if len > MAX_WIRE_BITS { return Err(CodecError::Invalid("bit length")); }
        let nbytes = len.div_ceil(8);
        if self.remaining() < nbytes { return Err(CodecError::LengthOutOfRange); }
        Ok(BitVector::from_bytes(self.take(nbytes)?, len)?)
    }
    pub fn finish(&self) -> Result<(), CodecError> {
        if self.remaining() != 0 { Err(CodecError::TrailingBytes) } else { Ok(()) }
    }
}

#[derive(Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self { Self { buf: Vec::new() } }
    pub fn into_vec(self) -> Vec<u8> { self.buf }
    pub fn write_u8(&mut self, v: u8) { self.buf.push(v); }
    pub fn write_u32(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_be_bytes()); }
    pub fn write_bytes(&mut self, b: &[u8]) { self.buf.extend_from_slice(b); }
    pub fn write_bits(&mut self, v: &BitVector) {
        self.write_u32(v.len() as u32);
        self.write_bytes(v.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_roundtrip_unaligned() {
        let v = BitVector::from_bits([true, false, true, true, false]);
        let mut w = Writer::new();
        w.write_bits(&v);
        let buf = w.into_vec();
        assert_eq!(buf, vec![0, 0, 0, 5, 0b1011_0000]);
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_bits().unwrap(), v);
        r.finish().unwrap();
    }

    #[test]
    fn bits_reject_oversized_length() {
        let mut w = Writer::new();
        w.write_u32((MAX_WIRE_BITS + 1) as u32);
        let buf = w.into_vec();
        assert_eq!(Reader::new(&buf).read_bits().unwrap_err(), CodecError::Invalid("bit length"));
    }

    #[test]
    fn bits_reject_short_body_and_pad() {
        assert_eq!(
            Reader::new(&[0, 0, 0, 16, 0xAA]).read_bits().unwrap_err(),
            CodecError::LengthOutOfRange
        );
        assert_eq!(
            Reader::new(&[0, 0, 0, 4, 0xAF]).read_bits().unwrap_err(),
            CodecError::Invalid("bit vector")
        );
    }

    #[test]
    fn finish_rejects_trailing() {
        let mut r = Reader::new(&[1, 2]);
        r.read_u8().unwrap();
        assert_eq!(r.finish().unwrap_err(), CodecError::TrailingBytes);
    }
}
