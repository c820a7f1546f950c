use std::fs::DirBuilder;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pufauth_refimpl::ProtocolConfig;

#[cfg(unix)]
use std::os::unix::fs::DirBuilderExt;

use crate::config::{self, Config};

pub fn run(
    store: &Path,
    challenge_bits: Option<usize>,
    response_bits: Option<usize>,
    retention_secs: Option<u64>,
    session_timeout_secs: Option<u64>,
) -> Result<()> {
    let mut dir = DirBuilder::new();
    dir.recursive(true);
    #[cfg(unix)]
    dir.mode(0o700);
    dir.create(store).context("create store dir")?;

    let cfg_path = store.join(config::CONFIG_FILE_NAME);
    if cfg_path.exists() {
        bail!("config already exists; delete it or choose a new --store");
    }

    let d = ProtocolConfig::default();
    let mut p = ProtocolConfig::new(
        challenge_bits.unwrap_or(d.challenge_bits),
        response_bits.unwrap_or(d.response_bits),
    )?;
    if let Some(s) = retention_secs {
        p = p.with_retention(Duration::from_secs(s));
    }
    if let Some(s) = session_timeout_secs {
        p = p.with_session_timeout(Duration::from_secs(s));
    }

    config::write_config(&cfg_path, &Config::from_protocol(&p))?;
    println!("initialized store at {}", store.display());
    Ok(())
}
