use core::fmt;

use thiserror::Error;

use super::types::{Identifier, MessageKind};
use crate::bits::BitsError;
use crate::codec::CodecError;
use crate::puf::PufError;

/// Which hash-chain check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    /// Tag checking M3: the server knows this device's response.
    Auth1,
    /// Server checking M4: the tag unmasked n and evaluated the next challenge.
    Auth2,
    /// Tag checking M5: the server derived the same chain.
    Auth3,
}

impl fmt::Display for AuthStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthStep::Auth1 => "auth1",
            AuthStep::Auth2 => "auth2",
            AuthStep::Auth3 => "auth3",
        })
    }
}

/// Round-local failure. Any of these ends the in-flight round on the side
/// that raised it; nothing persisted by that side changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("length mismatch: expected {expected} bits, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("unknown identity {}", .0.short())]
    UnknownIdentity(Identifier),
    #[error("identity {} is held by another round", .0.short())]
    IdentityBusy(Identifier),
    #[error("authentication failed: {0} mismatch")]
    AuthenticationFailure(AuthStep),
    #[error("protocol violation: expected {expected}, got {got}")]
    ProtocolViolation { expected: MessageKind, got: MessageKind },
    #[error("nonce increment overflows {width} bits")]
    Overflow { width: usize },
    #[error("tag has no session identity")]
    NotEnrolled,
    #[error("puf: {0}")]
    Puf(#[from] PufError),
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    #[error("bits: {0}")]
    Bits(BitsError),
}

impl From<BitsError> for AuthError {
    fn from(e: BitsError) -> Self {
        match e {
            BitsError::LengthMismatch { left, right } => {
                AuthError::LengthMismatch { expected: left, got: right }
            }
            BitsError::Overflow { width } => AuthError::Overflow { width },
            other => AuthError::Bits(other),
        }
    }
}

impl AuthError {
    /// Stable reject code for callers and logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::LengthMismatch { .. } => "REJECT_LENGTH_MISMATCH",
            AuthError::UnknownIdentity(_) => "REJECT_UNKNOWN_IDENTITY",
            AuthError::IdentityBusy(_) => "REJECT_IDENTITY_BUSY",
            AuthError::AuthenticationFailure(AuthStep::Auth1) => "REJECT_AUTH1_MISMATCH",
            AuthError::AuthenticationFailure(AuthStep::Auth2) => "REJECT_AUTH2_MISMATCH",
            AuthError::AuthenticationFailure(AuthStep::Auth3) => "REJECT_AUTH3_MISMATCH",
            AuthError::ProtocolViolation { .. } => "REJECT_PROTOCOL_VIOLATION",
            AuthError::Overflow { .. } => "REJECT_NONCE_OVERFLOW",
            AuthError::NotEnrolled => "REJECT_NOT_ENROLLED",
            AuthError::Puf(_) => "REJECT_PUF_CHALLENGE_SHAPE",
            AuthError::Codec(_) => "REJECT_CODEC",
            AuthError::Bits(_) => "REJECT_BIT_VECTOR",
        }
    }
}
