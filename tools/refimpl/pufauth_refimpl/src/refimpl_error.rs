use core::fmt;

use crate::auth::AuthError;
use crate::codec::CodecError;
use crate::config::ConfigError;

/// Canonical refimpl error surface for callers.
///
/// Formatting invariant:
/// - All user-visible rejects MUST include a stable `reason_code=<CODE>` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefimplError {
    Reject(&'static str),
    Codec,
    Config,
}

impl RefimplError {
    pub fn code(&self) -> &'static str {
        match self {
            RefimplError::Reject(c) => *c,
            RefimplError::Codec => "REJECT_CODEC",
            RefimplError::Config => "REJECT_CONFIG",
        }
    }
}

impl From<AuthError> for RefimplError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Codec(_) => RefimplError::Codec,
            other => RefimplError::Reject(other.reason_code()),
        }
    }
}

impl From<CodecError> for RefimplError {
    fn from(_: CodecError) -> Self {
        RefimplError::Codec
    }
}

impl From<ConfigError> for RefimplError {
    fn from(_: ConfigError) -> Self {
        RefimplError::Config
    }
}

impl fmt::Display for RefimplError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.code();
        write!(f, "authentication rejected: {c}; reason_code={c}")
    }
}

impl std::error::Error for RefimplError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthStep, Identifier, MessageKind};

    #[test]
    fn formats_unknown_identity_with_reason_code_token() {
        let e: RefimplError = AuthError::UnknownIdentity(Identifier::from_bytes([0; 32])).into();
        assert_eq!(
            e.to_string(),
            "authentication rejected: REJECT_UNKNOWN_IDENTITY; reason_code=REJECT_UNKNOWN_IDENTITY"
        );
    }

    #[test]
    fn auth_steps_have_distinct_codes() {
        let codes: Vec<&str> = [AuthStep::Auth1, AuthStep::Auth2, AuthStep::Auth3]
            .into_iter()
            .map(|s| RefimplError::from(AuthError::AuthenticationFailure(s)).code())
            .collect();
        assert_eq!(
            codes,
            ["REJECT_AUTH1_MISMATCH", "REJECT_AUTH2_MISMATCH", "REJECT_AUTH3_MISMATCH"]
        );
    }

    #[test]
    fn protocol_violation_and_codec_codes() {
        let e: RefimplError = AuthError::ProtocolViolation {
            expected: MessageKind::M2,
            got: MessageKind::M4,
        }
        .into();
        assert_eq!(e.code(), "REJECT_PROTOCOL_VIOLATION");

        let e: RefimplError = CodecError::Invalid("message kind").into();
        assert_eq!(
            e.to_string(),
            "authentication rejected: REJECT_CODEC; reason_code=REJECT_CODEC"
        );
    }

    #[test]
    fn conversions_cover_every_variant() {
        let from_config: RefimplError =
            ConfigError::ResponseTooNarrow { min: 8, value: 0 }.into();
        let from_codec: RefimplError = CodecError::Truncated.into();
        let from_auth: RefimplError = AuthError::NotEnrolled.into();
        assert_eq!(from_config, RefimplError::Config);
        assert_eq!(from_codec, RefimplError::Codec);
        assert_eq!(from_auth, RefimplError::Reject("REJECT_NOT_ENROLLED"));
    }
}
