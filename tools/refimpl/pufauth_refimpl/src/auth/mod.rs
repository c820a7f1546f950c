//! Tag/server mutual authentication over a PUF.
//!
//! One round on a reader channel:
//!
//! ```text
//! reader -> server   MInit
//! server -> tag      M1
//! tag    -> server   M2 { sid }
//! server -> tag      M3 { challenge, n_mod, auth1 }
//! tag    -> server   M4 { resp_mod, m_mod, auth2 }
//! server -> tag      M5 { auth3 }
//! ```
//!
//! A completed round rotates the tag's session identity on both sides.

pub mod constants;
mod chain;
mod error;
mod server;
mod store;
mod tag;
mod types;

pub use chain::*;
pub use error::*;
pub use server::*;
pub use store::*;
pub use tag::*;
pub use types::*;
