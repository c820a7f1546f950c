//! Protocol parameters shared by the tag, the server and the codec.
//!
//! `C` (sub-challenge width) and `R` (response width, also the number of
//! PUF evaluations per challenge) are cross-cutting: every component is
//! constructed from the same validated `ProtocolConfig`.

use std::time::Duration;

use thiserror::Error;

use crate::auth::constants::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-zero multiple of 8 (got {value})")]
    NotByteAligned { name: &'static str, value: usize },
    #[error("response_bits must be at least {min} (got {value})")]
    ResponseTooNarrow { min: usize, value: usize },
    #[error("challenge width {value} exceeds {max} bits")]
    ChallengeTooWide { max: usize, value: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// C: bits per sub-challenge (arbiter stages).
    pub challenge_bits: usize,
    /// R: response bits, one PUF evaluation each.
    pub response_bits: usize,
    /// How long a consumed identity record stays valid for a tag that
    /// missed its M5. Zero deletes it as soon as its successor exists.
    pub retention: Duration,
    /// Age after which an unfinished reader session is dropped.
    pub session_timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            challenge_bits: DEFAULT_CHALLENGE_BITS,
            response_bits: DEFAULT_RESPONSE_BITS,
            retention: DEFAULT_RETENTION,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

impl ProtocolConfig {
    pub fn new(challenge_bits: usize, response_bits: usize) -> Result<Self, ConfigError> {
        let cfg = Self { challenge_bits, response_bits, ..Self::default() };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Full challenge width, `C * R`.
    pub fn challenge_width(&self) -> usize {
        self.challenge_bits * self.response_bits
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("challenge_bits", self.challenge_bits),
            ("response_bits", self.response_bits),
        ] {
            if value == 0 || value % 8 != 0 {
                return Err(ConfigError::NotByteAligned { name, value });
            }
        }
        if self.response_bits < MIN_RESPONSE_BITS {
            return Err(ConfigError::ResponseTooNarrow {
                min: MIN_RESPONSE_BITS,
                value: self.response_bits,
            });
        }
        let width = self.challenge_bits.saturating_mul(self.response_bits);
        if width > MAX_CHALLENGE_BITS {
            return Err(ConfigError::ChallengeTooWide { max: MAX_CHALLENGE_BITS, value: width });
        }
        Ok(())
    }
}
