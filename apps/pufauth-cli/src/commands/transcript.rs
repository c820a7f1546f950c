use std::path::Path;

use anyhow::{Context, Result};
use pufauth_refimpl::ReaderId;

use crate::config;
use crate::fleet::{self, TagFactory};

/// One enrolled tag, one round, every message printed as `<kind> <hex>`.
pub fn run(store: Option<&Path>, seed: u64) -> Result<()> {
    let cfg = config::load_protocol(store)?;
    let mut factory = TagFactory::new(cfg, seed);
    let server = factory.server()?;
    let (device, mut tag) = factory.manufacture()?;
    let old = server.enroll(&mut tag, device)?;

    let messages = fleet::round(&server, &mut tag, ReaderId(0)).context("handshake")?;
    for msg in &messages {
        println!("{} {}", msg.kind(), hex::encode(msg.encode()));
    }
    let new = tag.sid().context("tag lost its identity")?;
    println!("sid: {} -> {}", old.short(), new.short());
    Ok(())
}
