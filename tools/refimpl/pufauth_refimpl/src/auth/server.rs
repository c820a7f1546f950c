//! Server half of the handshake.
//!
//! The server keeps one `AuthSession` per reader channel and the identity
//! store shared by all channels. Sessions are taken out of the map while a
//! message for them is processed, so channels never wait on each other
//! except for the short store and rng critical sections.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::chain;
use super::error::{AuthError, AuthStep};
use super::store::{IdentityStore, LeaseId};
use super::tag::Tag;
use super::types::{Identifier, IdentityRecord, Message, MessageKind, ReaderId};
use crate::bits::{verify_digest, BitVector, Digest};
use crate::config::{ConfigError, ProtocolConfig};
use crate::crypto::traits::{Hash, RandomSource};
use crate::puf::seeded_challenge;

/// Where a reader channel stands in its round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    AwaitingInit,
    AwaitingM2,
    AwaitingM4,
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct PendingRound {
    #[zeroize(skip)]
    sid: Identifier,
    #[zeroize(skip)]
    lease: LeaseId,
    challenge: BitVector,
    response: BitVector,
    n: BitVector,
}

enum Phase {
    AwaitingM2,
    AwaitingM4(PendingRound),
}

struct AuthSession {
    opened_at: Instant,
    phase: Phase,
}

impl AuthSession {
    fn expected(&self) -> MessageKind {
        match self.phase {
            Phase::AwaitingM2 => MessageKind::M2,
            Phase::AwaitingM4(_) => MessageKind::M4,
        }
    }
}

pub struct Server {
    config: ProtocolConfig,
    hash: Box<dyn Hash + Send + Sync>,
    rng: Mutex<Box<dyn RandomSource + Send>>,
    store: Mutex<IdentityStore>,
    sessions: Mutex<HashMap<ReaderId, AuthSession>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Server {
    #[cfg(feature = "stdcrypto")]
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        use crate::crypto::stdcrypto::{OsRandom, StdCrypto};
        Self::with_deps(config, Box::new(StdCrypto), Box::new(OsRandom))
    }

    pub fn with_deps(
        config: ProtocolConfig,
        hash: Box<dyn Hash + Send + Sync>,
        rng: Box<dyn RandomSource + Send>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = IdentityStore::with_policy(config.retention, config.session_timeout);
        Ok(Self {
            config,
            hash,
            rng: Mutex::new(rng),
            store: Mutex::new(store),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn fresh_bits(&self, len: usize) -> BitVector {
        let mut rng = lock(&self.rng);
        BitVector::random(len, &mut **rng)
    }

    fn fresh_identifier(&self) -> Identifier {
        let mut seed = [0u8; 32];
        lock(&self.rng).fill(&mut seed);
        let sid = Identifier::from_digest(Digest(self.hash.sha256(&seed)));
        seed.zeroize();
        sid
    }

    /// Enroll a device: evaluate it once on a seeded challenge, store the
    /// pair under a fresh sid and hand that sid to the tag.
    pub fn enroll(&self, tag: &mut Tag, challenge_seed: u64) -> Result<Identifier, AuthError> {
        let challenge = seeded_challenge(&self.config, challenge_seed);
        let response = tag.respond(&challenge)?;
        let sid = self.enroll_response(challenge, response)?;
        tag.set_sid(sid);
        Ok(sid)
    }

    /// Register a (challenge, response) pair measured out of band.
    pub fn enroll_response(
        &self,
        challenge: BitVector,
        response: BitVector,
    ) -> Result<Identifier, AuthError> {
        for (v, expected) in [
            (&challenge, self.config.challenge_width()),
            (&response, self.config.response_bits),
        ] {
            if v.len() != expected {
                return Err(AuthError::LengthMismatch { expected, got: v.len() });
            }
        }
        let sid = self.fresh_identifier();
        lock(&self.store).put(sid, challenge, response);
        info!(sid = %sid.short(), "enrolled tag");
        Ok(sid)
    }

    pub fn identity(&self, sid: &Identifier) -> Option<IdentityRecord> {
        lock(&self.store).get(sid).ok().cloned()
    }

    pub fn identity_count(&self) -> usize {
        lock(&self.store).len()
    }

    /// Out-of-band removal, e.g. to revoke a tag.
    pub fn remove_identity(&self, sid: &Identifier) -> bool {
        lock(&self.store).remove(sid).is_some()
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn session_state(&self, reader: ReaderId) -> ServerState {
        match lock(&self.sessions).get(&reader).map(|s| &s.phase) {
            None => ServerState::AwaitingInit,
            Some(Phase::AwaitingM2) => ServerState::AwaitingM2,
            Some(Phase::AwaitingM4(_)) => ServerState::AwaitingM4,
        }
    }

    pub fn purge_expired_identities(&self, now: Instant) -> usize {
        let n = lock(&self.store).purge_expired(now);
        if n > 0 {
            debug!(purged = n, "purged expired identity records");
        }
        n
    }

    /// Drop sessions older than the session timeout, releasing any
    /// identity they held.
    pub fn sweep_expired_sessions(&self, now: Instant) -> usize {
        let mut sessions = lock(&self.sessions);
        let stale: Vec<ReaderId> = sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.opened_at) >= self.config.session_timeout)
            .map(|(r, _)| *r)
            .collect();
        for reader in &stale {
            if let Some(s) = sessions.remove(reader) {
                self.abandon(s);
            }
        }
        if !stale.is_empty() {
            debug!(swept = stale.len(), "dropped abandoned sessions");
        }
        stale.len()
    }

    pub fn dispatch(&self, message: &Message, reader: ReaderId) -> Result<Message, AuthError> {
        self.dispatch_at(message, reader, Instant::now())
    }

    /// Process one message for `reader` as of `now`. Any error discards the
    /// channel's session and leaves the identity store as it was.
    pub fn dispatch_at(
        &self,
        message: &Message,
        reader: ReaderId,
        now: Instant,
    ) -> Result<Message, AuthError> {
        let session = self.take_session(reader, now);
        match self.step(session, message, now) {
            Ok((reply, next)) => {
                if let Some(s) = next {
                    self.put_session(reader, s);
                }
                Ok(reply)
            }
            Err(e) => {
                warn!(%reader, code = e.reason_code(), "round aborted: {e}");
                Err(e)
            }
        }
    }

    fn take_session(&self, reader: ReaderId, now: Instant) -> Option<AuthSession> {
        let session = lock(&self.sessions).remove(&reader)?;
        if now.saturating_duration_since(session.opened_at) >= self.config.session_timeout {
            debug!(%reader, "session timed out");
            self.abandon(session);
            return None;
        }
        Some(session)
    }

    // Another message on the same reader may have opened a session while
    // this one was out of the map; the displaced one gives up its lease.
    fn put_session(&self, reader: ReaderId, session: AuthSession) {
        let displaced = lock(&self.sessions).insert(reader, session);
        if let Some(old) = displaced {
            debug!(%reader, "session displaced by a concurrent message");
            self.abandon(old);
        }
    }

    fn abandon(&self, session: AuthSession) {
        if let Phase::AwaitingM4(round) = &session.phase {
            lock(&self.store).release(&round.sid, round.lease);
        }
    }

    fn step(
        &self,
        session: Option<AuthSession>,
        message: &Message,
        now: Instant,
    ) -> Result<(Message, Option<AuthSession>), AuthError> {
        if let Err(e) = message.validate(&self.config) {
            if let Some(s) = session {
                self.abandon(s);
            }
            return Err(e);
        }

        match (session, message) {
            (None, Message::MInit) => {
                debug!("round opened");
                let s = AuthSession { opened_at: now, phase: Phase::AwaitingM2 };
                Ok((Message::M1, Some(s)))
            }
            (Some(s), Message::M2 { sid }) if matches!(s.phase, Phase::AwaitingM2) => {
                let (m3, round) = self.on_m2(*sid, now)?;
                let s = AuthSession { opened_at: s.opened_at, phase: Phase::AwaitingM4(round) };
                Ok((m3, Some(s)))
            }
            (Some(AuthSession { phase: Phase::AwaitingM4(round), .. }), Message::M4 { resp_mod, m_mod, auth2 }) => {
                let m5 = self.on_m4(&round, resp_mod, m_mod, auth2, now)?;
                Ok((m5, None))
            }
            (session, other) => {
                let expected = session.as_ref().map_or(MessageKind::MInit, AuthSession::expected);
                if let Some(s) = session {
                    self.abandon(s);
                }
                Err(AuthError::ProtocolViolation { expected, got: other.kind() })
            }
        }
    }

    fn on_m2(&self, sid: Identifier, now: Instant) -> Result<(Message, PendingRound), AuthError> {
        let (record, lease) = lock(&self.store).checkout(&sid, now)?;
        let round = PendingRound {
            sid,
            lease,
            challenge: record.challenge,
            response: record.response,
            n: self.fresh_bits(self.config.response_bits),
        };
        let n_mod = match round.response.xor(&round.n) {
            Ok(v) => v,
            Err(e) => {
                lock(&self.store).release(&sid, lease);
                return Err(e.into());
            }
        };
        let auth1 = chain::auth1(&*self.hash, &round.n, &round.response);
        debug!(sid = %sid.short(), "issued challenge");
        let m3 = Message::M3 { challenge: round.challenge.clone(), n_mod, auth1 };
        Ok((m3, round))
    }

    fn on_m4(
        &self,
        round: &PendingRound,
        resp_mod: &BitVector,
        m_mod: &BitVector,
        auth2: &Digest,
        now: Instant,
    ) -> Result<Message, AuthError> {
        match self.provision(round, resp_mod, m_mod, auth2) {
            Ok((next_sid, record, m5)) => {
                lock(&self.store).rotate(&round.sid, round.lease, next_sid, record, now)?;
                info!(sid = %round.sid.short(), next = %next_sid.short(), "tag authenticated; identity rotated");
                Ok(m5)
            }
            Err(e) => {
                lock(&self.store).release(&round.sid, round.lease);
                Err(e)
            }
        }
    }

    fn provision(
        &self,
        round: &PendingRound,
        resp_mod: &BitVector,
        m_mod: &BitVector,
        auth2: &Digest,
    ) -> Result<(Identifier, IdentityRecord, Message), AuthError> {
        let h = &*self.hash;
        let mut m = m_mod.xor(&round.n)?;
        let next_response = resp_mod.xor(&round.n)?;
        let m_plus_1 = m.increment(1)?;
        let expected = chain::auth2(h, &round.n, &m_plus_1, &next_response);
        verify_digest(auth2, &expected)
            .map_err(|_| AuthError::AuthenticationFailure(AuthStep::Auth2))?;

        let next_challenge = chain::derive_next_challenge(
            h,
            &round.n,
            &m,
            &round.challenge,
            self.config.challenge_width(),
        );
        let m_plus_2 = m.increment(2)?;
        let next_sid = chain::next_sid(h, &round.n, &m_plus_2, &round.sid);
        let auth3 = chain::auth3(h, &round.n, &m_plus_2);
        m.zeroize();

        let record = IdentityRecord { challenge: next_challenge, response: next_response };
        Ok((next_sid, record, Message::M5 { auth3 }))
    }
}
