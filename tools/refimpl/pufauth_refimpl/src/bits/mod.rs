//! Fixed-length bit vectors and SHA-256 digests.
//!
//! Bits are packed MSB-first: bit 0 is the most significant bit of byte 0.
//! Pad bits in the final byte are always zero, so two vectors with the same
//! bits always have the same bytes.

use core::fmt;

use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::traits::{Hash, RandomSource};

pub const SZ_DIGEST: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitsError {
    #[error("length mismatch: {left} vs {right} bits")]
    LengthMismatch { left: usize, right: usize },
    #[error("increment does not fit a {width}-bit signed value")]
    Overflow { width: usize },
    #[error("digest mismatch")]
    IntegrityViolation,
    #[error("malformed bit vector: {0}")]
    Malformed(&'static str),
}

fn byte_len(bits: usize) -> usize {
    bits.div_ceil(8)
}

#[derive(Clone, PartialEq, Eq, Zeroize)]
pub struct BitVector {
    bytes: Vec<u8>,
    len: usize,
}

impl BitVector {
    pub fn zeros(len: usize) -> Self {
        Self { bytes: vec![0u8; byte_len(len)], len }
    }

    /// Wrap packed bytes holding exactly `len` bits. Rejects a wrong byte
    /// count and set pad bits so every vector has one canonical encoding.
    pub fn from_bytes(bytes: &[u8], len: usize) -> Result<Self, BitsError> {
        if bytes.len() != byte_len(len) {
            return Err(BitsError::Malformed("byte count does not match bit length"));
        }
        let pad = bytes.len() * 8 - len;
        if pad > 0 {
            let mask = (1u8 << pad) - 1;
            if bytes[bytes.len() - 1] & mask != 0 {
                return Err(BitsError::Malformed("non-zero pad bits"));
            }
        }
        Ok(Self { bytes: bytes.to_vec(), len })
    }

    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut out = Self::zeros(0);
        for b in bits {
            out.push(b);
        }
        out
    }

    /// Uniformly random vector whose first bit is forced to zero.
    ///
    /// Read as a signed integer the value is non-negative and at most
    /// `2^(len-1) - 1`, so adding a small constant cannot wrap for any
    /// width the protocol accepts.
    pub fn random(len: usize, rng: &mut dyn RandomSource) -> Self {
        let mut bytes = vec![0u8; byte_len(len)];
        rng.fill(&mut bytes);
        let mut v = Self { bytes, len };
        v.clear_padding();
        if len > 0 {
            v.set(0, false);
        }
        v
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        (self.bytes[i / 8] >> (7 - i % 8)) & 1 == 1
    }

    fn set(&mut self, i: usize, value: bool) {
        let mask = 1u8 << (7 - i % 8);
        if value {
            self.bytes[i / 8] |= mask;
        } else {
            self.bytes[i / 8] &= !mask;
        }
    }

    fn push(&mut self, value: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, value);
    }

    fn clear_padding(&mut self) {
        let pad = self.bytes.len() * 8 - self.len;
        if pad > 0 {
            if let Some(last) = self.bytes.last_mut() {
                *last &= !((1u8 << pad) - 1);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.bit(i))
    }

    pub fn xor(&self, other: &Self) -> Result<Self, BitsError> {
        if self.len != other.len {
            return Err(BitsError::LengthMismatch { left: self.len, right: other.len });
        }
        let bytes = self
            .bytes
            .iter()
            .zip(other.bytes.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        Ok(Self { bytes, len: self.len })
    }

    pub fn concat(&self, other: &Self) -> Self {
        if self.len % 8 == 0 {
            let mut bytes = Vec::with_capacity(self.bytes.len() + other.bytes.len());
            bytes.extend_from_slice(&self.bytes);
            bytes.extend_from_slice(&other.bytes);
            return Self { bytes, len: self.len + other.len };
        }
        let mut out = self.clone();
        for b in other.iter() {
            out.push(b);
        }
        out
    }

    /// Add `k` to the value read as a two's-complement integer of this
    /// vector's width, re-encoding at the same width.
    pub fn increment(&self, k: u32) -> Result<Self, BitsError> {
        let width = self.len;
        if width == 0 {
            return Err(BitsError::Overflow { width });
        }
        let negative = self.bit(0);
        let mut out = self.clone();
        let mut carry = 0u8;
        for pos in 0..width {
            let idx = width - 1 - pos;
            let kb = if pos < 32 { ((k >> pos) & 1) as u8 } else { 0 };
            let s = u8::from(self.bit(idx)) + kb + carry;
            out.set(idx, s & 1 == 1);
            carry = s >> 1;
        }
        // Everything above the top bit of the true sum: sign extension of
        // the input, the bits of k that did not fit, and the final carry.
        let k_high = if width < 32 { i64::from(k >> width) } else { 0 };
        let sign: i64 = if negative { -1 } else { 0 };
        let high = sign + k_high + i64::from(carry);
        let fits = match high {
            0 => !out.bit(0),
            -1 => out.bit(0),
            _ => false,
        };
        if fits {
            Ok(out)
        } else {
            Err(BitsError::Overflow { width })
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for BitVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({}b, {})", self.len, self.to_hex())
    }
}

pub fn xor(a: &BitVector, b: &BitVector) -> Result<BitVector, BitsError> {
    a.xor(b)
}

pub fn concat(a: &BitVector, b: &BitVector) -> BitVector {
    a.concat(b)
}

pub fn random_bits(len: usize, rng: &mut dyn RandomSource) -> BitVector {
    BitVector::random(len, rng)
}

pub fn increment(v: &BitVector, k: u32) -> Result<BitVector, BitsError> {
    v.increment(k)
}

#[derive(Clone, Copy, PartialEq, Eq, Zeroize)]
pub struct Digest(pub [u8; SZ_DIGEST]);

impl Digest {
    /// SHA-256 over the packed bytes of `bits`.
    pub fn of(hash: &dyn Hash, bits: &BitVector) -> Self {
        Self(hash.sha256(bits.as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; SZ_DIGEST] {
        &self.0
    }

    pub fn to_bits(&self) -> BitVector {
        BitVector { bytes: self.0.to_vec(), len: SZ_DIGEST * 8 }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// Constant-time digest comparison.
pub fn verify_digest(expected: &Digest, actual: &Digest) -> Result<(), BitsError> {
    if bool::from(expected.0.ct_eq(&actual.0)) {
        Ok(())
    } else {
        Err(BitsError::IntegrityViolation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::stdcrypto::{SeededRandom, StdCrypto};

    fn bits(s: &str) -> BitVector {
        BitVector::from_bits(s.chars().map(|c| c == '1'))
    }

    #[test]
    fn xor_rejects_length_mismatch() {
        let err = bits("1010").xor(&bits("10101")).unwrap_err();
        assert_eq!(err, BitsError::LengthMismatch { left: 4, right: 5 });
    }

    #[test]
    fn xor_is_bitwise() {
        assert_eq!(bits("1100").xor(&bits("1010")).unwrap(), bits("0110"));
    }

    #[test]
    fn concat_handles_unaligned_operands() {
        let v = bits("101").concat(&bits("11110000011"));
        assert_eq!(v, bits("10111110000011"));
        assert_eq!(v.len(), 14);
        assert_eq!(v.as_bytes(), &[0b1011_1110, 0b0000_1100]);
    }

    #[test]
    fn concat_aligned_keeps_bytes() {
        let a = BitVector::from_bytes(&[0xAB], 8).unwrap();
        let b = BitVector::from_bytes(&[0xCD, 0xE0], 12).unwrap();
        let v = a.concat(&b);
        assert_eq!(v.len(), 20);
        assert_eq!(v.as_bytes(), &[0xAB, 0xCD, 0xE0]);
    }

    #[test]
    fn from_bytes_rejects_pad_bits_and_bad_count() {
        assert!(BitVector::from_bytes(&[0xFF], 4).is_err());
        assert!(BitVector::from_bytes(&[0xF0, 0x00], 4).is_err());
        assert!(BitVector::from_bytes(&[0xF0], 4).is_ok());
    }

    #[test]
    fn increment_positive_and_negative_values() {
        assert_eq!(bits("0010").increment(1).unwrap(), bits("0011"));
        assert_eq!(bits("0101").increment(2).unwrap(), bits("0111"));
        assert_eq!(bits("1111").increment(1).unwrap(), bits("0000"));
        assert_eq!(bits("1000").increment(10).unwrap(), bits("0010"));
        assert_eq!(bits("0011").increment(0).unwrap(), bits("0011"));
    }

    #[test]
    fn increment_detects_overflow() {
        assert_eq!(bits("0111").increment(1).unwrap_err(), BitsError::Overflow { width: 4 });
        assert!(bits("0110").increment(2).is_err());
        assert!(bits("0000").increment(16).is_err());
        assert!(BitVector::zeros(0).increment(1).is_err());
    }

    #[test]
    fn increment_carries_across_bytes() {
        let v = BitVector::from_bytes(&[0x00, 0xFF], 16).unwrap();
        let out = v.increment(1).unwrap();
        assert_eq!(out.as_bytes(), &[0x01, 0x00]);
    }

    #[test]
    fn random_bits_leading_zero() {
        let mut rng = SeededRandom::from_seed(1);
        for len in [1usize, 3, 8, 13, 16, 64] {
            for _ in 0..64 {
                let v = random_bits(len, &mut rng);
                assert_eq!(v.len(), len);
                assert!(!v.bit(0));
                assert!(BitVector::from_bytes(v.as_bytes(), len).is_ok());
            }
        }
    }

    #[test]
    fn verify_digest_matches_and_rejects() {
        let c = StdCrypto;
        let a = Digest::of(&c, &bits("10110011"));
        let b = Digest::of(&c, &bits("10110010"));
        assert!(verify_digest(&a, &a).is_ok());
        assert_eq!(verify_digest(&a, &b).unwrap_err(), BitsError::IntegrityViolation);
    }

    #[test]
    fn digest_bits_are_256_wide() {
        let c = StdCrypto;
        let d = Digest::of(&c, &bits("1"));
        let v = d.to_bits();
        assert_eq!(v.len(), 256);
        assert_eq!(v.as_bytes(), d.as_bytes());
    }
}
