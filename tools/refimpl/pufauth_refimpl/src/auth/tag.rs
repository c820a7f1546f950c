//! Tag half of the handshake.
//!
//! The tag runs one round at a time. Its only state kept across rounds is
//! the current sid, and that changes only after both auth1 and auth3 have
//! verified.

use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::chain;
use super::error::{AuthError, AuthStep};
use super::types::{Identifier, Message, MessageKind};
use crate::bits::{verify_digest, BitVector, Digest};
use crate::config::{ConfigError, ProtocolConfig};
use crate::crypto::traits::{Hash, RandomSource};
use crate::puf::Puf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagState {
    Idle,
    AwaitingM3,
    AwaitingM5,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct TagRound {
    n: BitVector,
    m_plus_1: BitVector,
}

enum Phase {
    Idle,
    AwaitingM3,
    AwaitingM5(TagRound),
}

impl Phase {
    fn expected(&self) -> MessageKind {
        match self {
            Phase::Idle => MessageKind::M1,
            Phase::AwaitingM3 => MessageKind::M3,
            Phase::AwaitingM5(_) => MessageKind::M5,
        }
    }
}

pub struct Tag {
    config: ProtocolConfig,
    puf: Box<dyn Puf>,
    sid: Option<Identifier>,
    phase: Phase,
    hash: Box<dyn Hash + Send + Sync>,
    rng: Box<dyn RandomSource + Send>,
}

impl Tag {
    #[cfg(feature = "stdcrypto")]
    pub fn new(config: ProtocolConfig, puf: Box<dyn Puf>) -> Result<Self, ConfigError> {
        use crate::crypto::stdcrypto::{OsRandom, StdCrypto};
        Self::with_deps(config, puf, Box::new(StdCrypto), Box::new(OsRandom))
    }

    pub fn with_deps(
        config: ProtocolConfig,
        puf: Box<dyn Puf>,
        hash: Box<dyn Hash + Send + Sync>,
        rng: Box<dyn RandomSource + Send>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, puf, sid: None, phase: Phase::Idle, hash, rng })
    }

    pub fn sid(&self) -> Option<Identifier> {
        self.sid
    }

    pub fn set_sid(&mut self, sid: Identifier) {
        self.sid = Some(sid);
    }

    pub fn state(&self) -> TagState {
        match self.phase {
            Phase::Idle => TagState::Idle,
            Phase::AwaitingM3 => TagState::AwaitingM3,
            Phase::AwaitingM5(_) => TagState::AwaitingM5,
        }
    }

    /// Swap the device under this tag, returning the old one. Models
    /// physical substitution; any round in flight is dropped.
    pub fn replace_puf(&mut self, puf: Box<dyn Puf>) -> Box<dyn Puf> {
        self.phase = Phase::Idle;
        std::mem::replace(&mut self.puf, puf)
    }

    pub fn respond(&self, challenge: &BitVector) -> Result<BitVector, AuthError> {
        Ok(self.puf.evaluate(challenge)?)
    }

    /// Feed one server message. Returns the reply, or `None` once M5 has
    /// verified and the sid has rotated. On error the round is dropped and
    /// the sid is unchanged.
    pub fn handle(&mut self, message: &Message) -> Result<Option<Message>, AuthError> {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        match self.step(phase, message) {
            Ok((reply, next)) => {
                self.phase = next;
                Ok(reply)
            }
            Err(e) => {
                warn!(code = e.reason_code(), "tag round aborted: {e}");
                Err(e)
            }
        }
    }

    fn step(&mut self, phase: Phase, message: &Message) -> Result<(Option<Message>, Phase), AuthError> {
        message.validate(&self.config)?;
        match (phase, message) {
            // M1 always starts over, so a tag that lost M5 can retry.
            (_, Message::M1) => {
                let sid = self.sid.ok_or(AuthError::NotEnrolled)?;
                Ok((Some(Message::M2 { sid }), Phase::AwaitingM3))
            }
            (Phase::AwaitingM3, Message::M3 { challenge, n_mod, auth1 }) => {
                let (m4, round) = self.on_m3(challenge, n_mod, auth1)?;
                Ok((Some(m4), Phase::AwaitingM5(round)))
            }
            (Phase::AwaitingM5(round), Message::M5 { auth3 }) => {
                self.on_m5(&round, auth3)?;
                Ok((None, Phase::Idle))
            }
            (phase, other) => Err(AuthError::ProtocolViolation {
                expected: phase.expected(),
                got: other.kind(),
            }),
        }
    }

    fn on_m3(
        &mut self,
        challenge: &BitVector,
        n_mod: &BitVector,
        auth1: &Digest,
    ) -> Result<(Message, TagRound), AuthError> {
        let h = &*self.hash;
        let mut response = self.puf.evaluate(challenge)?;
        let n = n_mod.xor(&response)?;
        let check = verify_digest(auth1, &chain::auth1(h, &n, &response));
        response.zeroize();
        check.map_err(|_| AuthError::AuthenticationFailure(AuthStep::Auth1))?;

        let mut m = BitVector::random(self.config.response_bits, &mut *self.rng);
        let next_challenge =
            chain::derive_next_challenge(h, &n, &m, challenge, self.config.challenge_width());
        let mut next_response = self.puf.evaluate(&next_challenge)?;
        let resp_mod = next_response.xor(&n)?;
        let m_mod = m.xor(&n)?;
        let m_plus_1 = m.increment(1)?;
        let auth2 = chain::auth2(h, &n, &m_plus_1, &next_response);
        next_response.zeroize();
        m.zeroize();

        debug!("answered challenge");
        Ok((Message::M4 { resp_mod, m_mod, auth2 }, TagRound { n, m_plus_1 }))
    }

    fn on_m5(&mut self, round: &TagRound, auth3: &Digest) -> Result<(), AuthError> {
        let sid = self.sid.ok_or(AuthError::NotEnrolled)?;
        let h = &*self.hash;
        let m_plus_2 = round.m_plus_1.increment(1)?;
        verify_digest(auth3, &chain::auth3(h, &round.n, &m_plus_2))
            .map_err(|_| AuthError::AuthenticationFailure(AuthStep::Auth3))?;
        let next = chain::next_sid(h, &round.n, &m_plus_2, &sid);
        self.sid = Some(next);
        info!(sid = %sid.short(), next = %next.short(), "server authenticated; identity rotated");
        Ok(())
    }
}
