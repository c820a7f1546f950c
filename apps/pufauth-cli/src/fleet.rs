//! Simulated tags and in-process reader channels.

use pufauth_refimpl::crypto::stdcrypto::{SeededRandom, StdCrypto};
use pufauth_refimpl::{
    ArbiterPuf, AuthError, Message, MessageKind, ProtocolConfig, ReaderId, RefimplError, Server,
    Tag,
};
use tracing::warn;

/// Builds a reproducible server and a run of devices from one seed.
pub struct TagFactory {
    config: ProtocolConfig,
    seed: u64,
    next_serial: u64,
}

impl TagFactory {
    pub fn new(config: ProtocolConfig, seed: u64) -> Self {
        Self { config, seed, next_serial: 0 }
    }

    pub fn server(&self) -> Result<Server, RefimplError> {
        Ok(Server::with_deps(
            self.config.clone(),
            Box::new(StdCrypto),
            Box::new(SeededRandom::from_seed(self.seed)),
        )?)
    }

    /// A new device; its PUF and nonce stream depend only on seed and serial.
    pub fn manufacture(&mut self) -> Result<(u64, Tag), RefimplError> {
        let serial = self.next_serial;
        self.next_serial += 1;
        let device = self.seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(serial);
        let tag = Tag::with_deps(
            self.config.clone(),
            Box::new(ArbiterPuf::new(self.config.challenge_bits, device)),
            Box::new(StdCrypto),
            Box::new(SeededRandom::from_seed(device ^ 0x7A67)),
        )?;
        Ok((device, tag))
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub authenticated: usize,
    pub failed: usize,
}

impl Report {
    fn record(&mut self, outcome: Result<(), AuthError>) {
        match outcome {
            Ok(()) => self.authenticated += 1,
            Err(e) => {
                warn!(code = e.reason_code(), "round failed: {e}");
                self.failed += 1;
            }
        }
    }
}

fn reply(tag: &mut Tag, msg: &Message) -> Result<Message, AuthError> {
    tag.handle(msg)?.ok_or(AuthError::ProtocolViolation {
        expected: MessageKind::M3,
        got: MessageKind::M5,
    })
}

/// Every message of one round, in order.
pub fn round(server: &Server, tag: &mut Tag, reader: ReaderId) -> Result<Vec<Message>, AuthError> {
    let m1 = server.dispatch(&Message::MInit, reader)?;
    let m2 = reply(tag, &m1)?;
    let m3 = server.dispatch(&m2, reader)?;
    let m4 = reply(tag, &m3)?;
    let m5 = server.dispatch(&m4, reader)?;
    tag.handle(&m5)?;
    Ok(vec![Message::MInit, m1, m2, m3, m4, m5])
}

pub fn run_sequential(server: &Server, tags: &mut [Tag], rounds: u32) -> Report {
    let mut report = Report::default();
    for _ in 0..rounds {
        for tag in tags.iter_mut() {
            report.record(round(server, tag, ReaderId(0)).map(|_| ()));
        }
    }
    report
}

/// Each tag gets its own reader; every step is taken for all tags before
/// the next step starts.
pub fn run_interleaved(server: &Server, tags: &mut [Tag], rounds: u32) -> Report {
    let mut report = Report::default();
    for _ in 0..rounds {
        let mut inflight: Vec<Result<Message, AuthError>> =
            vec![Ok(Message::MInit); tags.len()];
        for step in 0..3 {
            for (i, tag) in tags.iter_mut().enumerate() {
                let reader = ReaderId(i as u64);
                let next = match &inflight[i] {
                    Ok(msg) => server.dispatch(msg, reader).and_then(|resp| {
                        if step == 2 {
                            tag.handle(&resp).map(|_| Message::MInit)
                        } else {
                            reply(tag, &resp)
                        }
                    }),
                    Err(e) => Err(e.clone()),
                };
                inflight[i] = next;
            }
        }
        for outcome in inflight {
            report.record(outcome.map(|_| ()));
        }
    }
    report
}
