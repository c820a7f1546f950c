#![allow(dead_code)]

use pufauth_refimpl::crypto::stdcrypto::{SeededRandom, StdCrypto};
use pufauth_refimpl::{ArbiterPuf, AuthError, Message, ProtocolConfig, ReaderId, Server, Tag};

pub fn server_with(cfg: ProtocolConfig, seed: u64) -> Server {
    Server::with_deps(cfg, Box::new(StdCrypto), Box::new(SeededRandom::from_seed(seed)))
        .expect("valid config")
}

pub fn server() -> Server {
    server_with(ProtocolConfig::default(), 0xC0FFEE)
}

/// A tag built on the device with serial `serial`.
pub fn tag_with(cfg: &ProtocolConfig, serial: u64) -> Tag {
    Tag::with_deps(
        cfg.clone(),
        Box::new(ArbiterPuf::new(cfg.challenge_bits, serial)),
        Box::new(StdCrypto),
        Box::new(SeededRandom::from_seed(0x7A6_0000 + serial)),
    )
    .expect("valid config")
}

/// Manufacture `n` tags with consecutive serials and enroll each one.
pub fn enrolled_tags(server: &Server, n: u64) -> Vec<Tag> {
    (0..n)
        .map(|serial| {
            let mut t = tag_with(server.config(), serial);
            server.enroll(&mut t, serial).expect("enroll");
            t
        })
        .collect()
}

fn reply(tag: &mut Tag, msg: &Message) -> Result<Message, AuthError> {
    Ok(tag.handle(msg)?.expect("tag reply"))
}

/// Run MInit..M5 for `tag` on `reader`.
pub fn run_round(server: &Server, tag: &mut Tag, reader: ReaderId) -> Result<(), AuthError> {
    let m1 = server.dispatch(&Message::MInit, reader)?;
    let m2 = reply(tag, &m1)?;
    let m3 = server.dispatch(&m2, reader)?;
    let m4 = reply(tag, &m3)?;
    let m5 = server.dispatch(&m4, reader)?;
    assert!(tag.handle(&m5)?.is_none());
    Ok(())
}
