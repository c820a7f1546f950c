//! Server-side identity store.
//!
//! Besides the plain sid -> record map, each entry tracks the rotation
//! lineage used by the retention policy:
//!
//! - a record consumed by a successful round is retired, not deleted, and
//!   stays usable for `retention` after its first retirement so a tag that
//!   lost M5 can retry under its old sid;
//! - reusing a retired record discards the successor the tag never adopted;
//! - the first successful round under a successor deletes its predecessor.
//!
//! A record presented in M2 is leased to that round until it completes,
//! aborts, or the lease outlives `lease_timeout`. While a lease is live the
//! record, its predecessor and its successor all refuse a second round, and
//! no leased record is ever deleted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::constants::{DEFAULT_RETENTION, DEFAULT_SESSION_TIMEOUT};
use super::error::AuthError;
use super::types::{Identifier, IdentityRecord};
use crate::bits::BitVector;

/// Proof that a round holds the lease on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LeaseId(u64);

#[derive(Clone, Copy)]
struct Lease {
    id: LeaseId,
    at: Instant,
}

struct Entry {
    record: IdentityRecord,
    predecessor: Option<Identifier>,
    successor: Option<Identifier>,
    retired_at: Option<Instant>,
    lease: Option<Lease>,
}

impl Entry {
    fn fresh(record: IdentityRecord, predecessor: Option<Identifier>) -> Self {
        Self { record, predecessor, successor: None, retired_at: None, lease: None }
    }

    fn expired(&self, now: Instant, retention: Duration) -> bool {
        self.retired_at
            .is_some_and(|at| now.saturating_duration_since(at) >= retention)
    }

    fn leased(&self, now: Instant, timeout: Duration) -> bool {
        self.lease
            .is_some_and(|l| now.saturating_duration_since(l.at) < timeout)
    }
}

pub struct IdentityStore {
    entries: HashMap<Identifier, Entry>,
    retention: Duration,
    lease_timeout: Duration,
    next_lease: u64,
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::with_policy(DEFAULT_RETENTION, DEFAULT_SESSION_TIMEOUT)
    }
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `retention` as in `ProtocolConfig::retention`; a lease older than
    /// `lease_timeout` no longer blocks other rounds.
    pub fn with_policy(retention: Duration, lease_timeout: Duration) -> Self {
        Self { entries: HashMap::new(), retention, lease_timeout, next_lease: 0 }
    }

    /// Insert or overwrite; last write wins.
    pub fn put(&mut self, sid: Identifier, challenge: BitVector, response: BitVector) {
        self.entries
            .insert(sid, Entry::fresh(IdentityRecord { challenge, response }, None));
    }

    /// Raw lookup; does not apply the retention policy.
    pub fn get(&self, sid: &Identifier) -> Result<&IdentityRecord, AuthError> {
        self.entries
            .get(sid)
            .map(|e| &e.record)
            .ok_or(AuthError::UnknownIdentity(*sid))
    }

    pub fn remove(&mut self, sid: &Identifier) -> Option<IdentityRecord> {
        self.entries.remove(sid).map(|e| e.record)
    }

    pub fn contains(&self, sid: &Identifier) -> bool {
        self.entries.contains_key(sid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_retired(&self, sid: &Identifier) -> bool {
        self.entries.get(sid).is_some_and(|e| e.retired_at.is_some())
    }

    pub fn is_leased(&self, sid: &Identifier, now: Instant) -> bool {
        self.entries
            .get(sid)
            .is_some_and(|e| e.leased(now, self.lease_timeout))
    }

    /// Lease the record for one round. Expired retired records are dropped
    /// on contact and reported as unknown.
    pub(crate) fn checkout(
        &mut self,
        sid: &Identifier,
        now: Instant,
    ) -> Result<(IdentityRecord, LeaseId), AuthError> {
        let entry = self.entries.get(sid).ok_or(AuthError::UnknownIdentity(*sid))?;
        if entry.leased(now, self.lease_timeout) {
            return Err(AuthError::IdentityBusy(*sid));
        }
        if entry.expired(now, self.retention) {
            self.entries.remove(sid);
            return Err(AuthError::UnknownIdentity(*sid));
        }
        // A retired record and its successor never run rounds side by side:
        // whichever finishes second would act on a lineage the other rewrote.
        let kin = [entry.predecessor, entry.successor];
        if kin.iter().flatten().any(|k| self.is_leased(k, now)) {
            return Err(AuthError::IdentityBusy(*sid));
        }

        self.next_lease += 1;
        let id = LeaseId(self.next_lease);
        let entry = self
            .entries
            .get_mut(sid)
            .ok_or(AuthError::UnknownIdentity(*sid))?;
        entry.lease = Some(Lease { id, at: now });
        Ok((entry.record.clone(), id))
    }

    /// Drop `lease` if it is still the one held on `sid`.
    pub(crate) fn release(&mut self, sid: &Identifier, lease: LeaseId) {
        if let Some(e) = self.entries.get_mut(sid) {
            if e.lease.is_some_and(|l| l.id == lease) {
                e.lease = None;
            }
        }
    }

    /// Provision `next` after a successful round under `old`. Fails without
    /// touching the store when `old` is gone or no longer held by `lease`.
    pub(crate) fn rotate(
        &mut self,
        old: &Identifier,
        lease: LeaseId,
        next: Identifier,
        record: IdentityRecord,
        now: Instant,
    ) -> Result<(), AuthError> {
        let keep_old = !self.retention.is_zero();
        let entry = self
            .entries
            .get_mut(old)
            .ok_or(AuthError::UnknownIdentity(*old))?;
        if !entry.lease.is_some_and(|l| l.id == lease) {
            return Err(AuthError::IdentityBusy(*old));
        }
        entry.lease = None;
        let abandoned = entry.successor.take().filter(|s| *s != next);
        let predecessor = entry.predecessor.take();
        if keep_old {
            entry.retired_at.get_or_insert(now);
            entry.successor = Some(next);
        }

        for stale in [abandoned, predecessor].into_iter().flatten() {
            if !self.is_leased(&stale, now) {
                self.entries.remove(&stale);
            }
        }
        if !keep_old {
            self.entries.remove(old);
        }
        self.entries
            .insert(next, Entry::fresh(record, keep_old.then_some(*old)));
        Ok(())
    }

    /// Drop retired records whose retention window has passed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let (retention, timeout) = (self.retention, self.lease_timeout);
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.leased(now, timeout) || !e.expired(now, retention));
        before - self.entries.len()
    }
}
