//! Cryptographic interfaces and (optional) standard-crypto implementations.
//!
//! The protocol needs exactly two primitives:
//! - SHA-256, used both as the integrity tag over masked secrets and as the
//!   generator for rotating session identifiers
//! - a source of uniformly random bytes for nonces and initial identifiers

pub mod traits;
#[cfg(feature = "stdcrypto")]
pub mod stdcrypto;
