//! PUF-anchored mutual authentication reference implementation.
//!
//! A tag never stores key material; it proves possession of its physical
//! device by evaluating a PUF on server-issued challenges. Each completed
//! round rotates the pseudonym (sid) the server indexes the tag under.
//!
//! This crate focuses on exact hash-chain semantics, strict message
//! ordering per reader channel, and identity-store consistency under
//! message loss and concurrent rounds. Transport is out of scope.

pub mod auth;
pub mod bits;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod puf;
mod refimpl_error;

pub use auth::{
    AuthError, AuthStep, Identifier, IdentityRecord, IdentityStore, Message, MessageKind,
    ReaderId, Server, ServerState, Tag, TagState,
};
pub use bits::{BitVector, BitsError, Digest};
pub use config::{ConfigError, ProtocolConfig};
pub use puf::{ArbiterPuf, Puf, PufError};
pub use refimpl_error::RefimplError;
