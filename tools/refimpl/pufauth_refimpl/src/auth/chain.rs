//! Hash-chain values shared by both parties.
//!
//! Every digest is SHA-256 over the concatenated bit vectors:
//!
//! - auth1    = H(n || r)
//! - auth2    = H(n || m+1 || r')
//! - auth3    = H(n || m+2)
//! - next_sid = H(n || m+2 || sid)
//! - c'       = H(n || m || c), repeated to the challenge width
//!
//! where r is the stored response, r' the response to c'.

use super::types::Identifier;
use crate::bits::{BitVector, Digest};
use crate::crypto::traits::Hash;

pub fn auth1(hash: &dyn Hash, n: &BitVector, response: &BitVector) -> Digest {
    Digest::of(hash, &n.concat(response))
}

pub fn auth2(hash: &dyn Hash, n: &BitVector, m_plus_1: &BitVector, next_response: &BitVector) -> Digest {
    Digest::of(hash, &n.concat(m_plus_1).concat(next_response))
}

pub fn auth3(hash: &dyn Hash, n: &BitVector, m_plus_2: &BitVector) -> Digest {
    Digest::of(hash, &n.concat(m_plus_2))
}

pub fn next_sid(hash: &dyn Hash, n: &BitVector, m_plus_2: &BitVector, sid: &Identifier) -> Identifier {
    Identifier::from_digest(Digest::of(hash, &n.concat(m_plus_2).concat(&sid.to_bits())))
}

/// Next-round challenge: the digest of `n || m || challenge`, repeated
/// until it covers `width` bits and truncated there. Both sides compute
/// it independently so the challenge never crosses the wire.
pub fn derive_next_challenge(
    hash: &dyn Hash,
    n: &BitVector,
    m: &BitVector,
    challenge: &BitVector,
    width: usize,
) -> BitVector {
    let seed = Digest::of(hash, &n.concat(m).concat(challenge)).to_bits();
    let period = seed.len();
    BitVector::from_bits((0..width).map(|i| seed.bit(i % period)))
}
