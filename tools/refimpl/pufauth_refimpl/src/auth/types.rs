use core::fmt;
use core::str::FromStr;

use super::constants::*;
use super::error::AuthError;
use crate::bits::{BitVector, Digest, SZ_DIGEST};
use crate::codec::{CodecError, Reader, Writer};
use crate::config::ProtocolConfig;

/// Rotating session pseudonym under which a tag's current
/// (challenge, response) pair is stored.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier([u8; SZ_SID]);

impl Identifier {
    pub const fn from_bytes(bytes: [u8; SZ_SID]) -> Self {
        Self(bytes)
    }

    pub fn from_digest(d: Digest) -> Self {
        Self(d.0)
    }

    pub fn as_bytes(&self) -> &[u8; SZ_SID] {
        &self.0
    }

    pub fn to_bits(&self) -> BitVector {
        Digest(self.0).to_bits()
    }

    /// First four bytes in hex; enough to correlate log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", hex::encode(self.0))
    }
}

impl FromStr for Identifier {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|_| CodecError::Invalid("identifier hex"))?;
        let bytes: [u8; SZ_SID] = raw
            .try_into()
            .map_err(|_| CodecError::Invalid("identifier length"))?;
        Ok(Self(bytes))
    }
}

/// Opaque id of a reader channel. Each id carries at most one round at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderId(pub u64);

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader-{}", self.0)
    }
}

/// Server-side record for one sid. Replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub challenge: BitVector,
    pub response: BitVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    MInit,
    M1,
    M2,
    M3,
    M4,
    M5,
}

impl MessageKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MInit => "MInit",
            Self::M1 => "M1",
            Self::M2 => "M2",
            Self::M3 => "M3",
            Self::M4 => "M4",
            Self::M5 => "M5",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    MInit,
    M1,
    M2 { sid: Identifier },
    M3 { challenge: BitVector, n_mod: BitVector, auth1: Digest },
    M4 { resp_mod: BitVector, m_mod: BitVector, auth2: Digest },
    M5 { auth3: Digest },
}

fn expect_len(v: &BitVector, expected: usize) -> Result<(), AuthError> {
    if v.len() != expected {
        return Err(AuthError::LengthMismatch { expected, got: v.len() });
    }
    Ok(())
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::MInit => MessageKind::MInit,
            Message::M1 => MessageKind::M1,
            Message::M2 { .. } => MessageKind::M2,
            Message::M3 { .. } => MessageKind::M3,
            Message::M4 { .. } => MessageKind::M4,
            Message::M5 { .. } => MessageKind::M5,
        }
    }

    /// Check every bit-vector field against the configured widths.
    pub fn validate(&self, config: &ProtocolConfig) -> Result<(), AuthError> {
        let r = config.response_bits;
        match self {
            Message::MInit | Message::M1 | Message::M2 { .. } | Message::M5 { .. } => Ok(()),
            Message::M3 { challenge, n_mod, .. } => {
                expect_len(challenge, config.challenge_width())?;
                expect_len(n_mod, r)
            }
            Message::M4 { resp_mod, m_mod, .. } => {
                expect_len(resp_mod, r)?;
                expect_len(m_mod, r)
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Message::MInit => w.write_u8(KIND_MINIT),
            Message::M1 => w.write_u8(KIND_M1),
            Message::M2 { sid } => {
                w.write_u8(KIND_M2);
                w.write_bytes(sid.as_bytes());
            }
            Message::M3 { challenge, n_mod, auth1 } => {
                w.write_u8(KIND_M3);
                w.write_bits(challenge);
                w.write_bits(n_mod);
                w.write_bytes(auth1.as_bytes());
            }
            Message::M4 { resp_mod, m_mod, auth2 } => {
                w.write_u8(KIND_M4);
                w.write_bits(resp_mod);
                w.write_bits(m_mod);
                w.write_bytes(auth2.as_bytes());
            }
            Message::M5 { auth3 } => {
                w.write_u8(KIND_M5);
                w.write_bytes(auth3.as_bytes());
            }
        }
        w.into_vec()
    }

    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(buf);
        let msg = match r.read_u8()? {
            KIND_MINIT => Message::MInit,
            KIND_M1 => Message::M1,
            KIND_M2 => Message::M2 { sid: Identifier(r.read_exact::<SZ_SID>()?) },
            KIND_M3 => {
                let challenge = r.read_bits()?;
                let n_mod = r.read_bits()?;
                let auth1 = Digest(r.read_exact::<SZ_DIGEST>()?);
                Message::M3 { challenge, n_mod, auth1 }
            }
            KIND_M4 => {
                let resp_mod = r.read_bits()?;
                let m_mod = r.read_bits()?;
                let auth2 = Digest(r.read_exact::<SZ_DIGEST>()?);
                Message::M4 { resp_mod, m_mod, auth2 }
            }
            KIND_M5 => Message::M5 { auth3: Digest(r.read_exact::<SZ_DIGEST>()?) },
            _ => return Err(CodecError::Invalid("message kind")),
        };
        r.finish()?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_hex_roundtrip() {
        let id = Identifier::from_bytes([0xAB; SZ_SID]);
        let s = id.to_string();
        assert_eq!(s.len(), 64);
        assert_eq!(s.parse::<Identifier>().unwrap(), id);
        assert_eq!(id.short(), "abababab");
    }

    #[test]
    fn identifier_parse_rejects_garbage() {
        assert!("changed_sid".parse::<Identifier>().is_err());
        assert!("abcd".parse::<Identifier>().is_err());
    }

    #[test]
    fn validate_checks_widths() {
        let cfg = ProtocolConfig::default();
        let good = Message::M4 {
            resp_mod: BitVector::zeros(16),
            m_mod: BitVector::zeros(16),
            auth2: Digest([0; 32]),
        };
        assert!(good.validate(&cfg).is_ok());
        let bad = Message::M3 {
            challenge: BitVector::zeros(64 * 16 - 8),
            n_mod: BitVector::zeros(16),
            auth1: Digest([0; 32]),
        };
        assert_eq!(
            bad.validate(&cfg).unwrap_err(),
            AuthError::LengthMismatch { expected: 1024, got: 1016 }
        );
    }

    #[test]
    fn decode_rejects_unknown_kind_and_trailing() {
        assert_eq!(Message::decode(&[0x09]).unwrap_err(), CodecError::Invalid("message kind"));
        assert_eq!(Message::decode(&[KIND_M1, 0]).unwrap_err(), CodecError::TrailingBytes);
        assert_eq!(Message::decode(&[]).unwrap_err(), CodecError::Truncated);
    }
}
