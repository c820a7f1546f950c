use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::{self, Config};

pub fn run(store: &Path) -> Result<()> {
    if !store.exists() {
        bail!(
            "store not found: {} (run: pufauth init --store <path>)",
            store.display()
        );
    }

    let cfg_path = store.join(config::CONFIG_FILE_NAME);
    let cfg: Config = config::read_config(&cfg_path).with_context(|| {
        format!(
            "config missing or invalid: {} (run: pufauth init --store <path>)",
            cfg_path.display()
        )
    })?;
    let p = cfg.to_protocol()?;

    println!("store: {}", store.display());
    println!("challenge_bits: {}", p.challenge_bits);
    println!("response_bits: {}", p.response_bits);
    println!("challenge_width: {}", p.challenge_width());
    println!("retention_secs: {}", cfg.retention_secs);
    println!("session_timeout_secs: {}", cfg.session_timeout_secs);
    Ok(())
}
