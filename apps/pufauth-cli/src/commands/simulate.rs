use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use crate::config;
use crate::fleet::{self, TagFactory};

pub fn run(
    store: Option<&Path>,
    tags: u64,
    rounds: u32,
    interleaved: bool,
    seed: u64,
) -> Result<()> {
    if tags == 0 {
        bail!("--tags must be > 0");
    }
    let cfg = config::load_protocol(store)?;
    let mut factory = TagFactory::new(cfg, seed);
    let server = factory.server()?;

    let mut fleet = Vec::new();
    for _ in 0..tags {
        let (device, mut tag) = factory.manufacture()?;
        server.enroll(&mut tag, device)?;
        fleet.push(tag);
    }
    info!(tags, rounds, interleaved, "fleet enrolled");

    let report = if interleaved {
        fleet::run_interleaved(&server, &mut fleet, rounds)
    } else {
        fleet::run_sequential(&server, &mut fleet, rounds)
    };

    println!("tags: {tags}");
    println!("rounds: {}", u64::from(rounds) * tags);
    println!("authenticated: {}", report.authenticated);
    println!("failed: {}", report.failed);
    println!("identities: {}", server.identity_count());
    if report.failed > 0 {
        bail!("{} round(s) failed", report.failed);
    }
    Ok(())
}
