//! Protocol defaults and fixed sizes.

use std::time::Duration;

pub const DEFAULT_CHALLENGE_BITS: usize = 64;
pub const DEFAULT_RESPONSE_BITS: usize = 16;

// Leaves headroom for the +1/+2 nonce increments after the leading zero.
pub const MIN_RESPONSE_BITS: usize = 8;
pub const MAX_CHALLENGE_BITS: usize = 1 << 16;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

pub const SZ_SID: usize = 32;

// Upper bound on any bit vector accepted from the wire.
pub const MAX_WIRE_BITS: usize = MAX_CHALLENGE_BITS;

// Message kind tags
pub const KIND_MINIT: u8 = 0x00;
pub const KIND_M1: u8 = 0x01;
pub const KIND_M2: u8 = 0x02;
pub const KIND_M3: u8 = 0x03;
pub const KIND_M4: u8 = 0x04;
pub const KIND_M5: u8 = 0x05;
