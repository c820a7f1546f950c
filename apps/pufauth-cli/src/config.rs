use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use anyhow::{Context, Result};
use pufauth_refimpl::ProtocolConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// On-disk form of `ProtocolConfig`, durations in whole seconds.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub challenge_bits: usize,
    pub response_bits: usize,
    pub retention_secs: u64,
    pub session_timeout_secs: u64,
}

impl Config {
    pub fn from_protocol(p: &ProtocolConfig) -> Self {
        Self {
            challenge_bits: p.challenge_bits,
            response_bits: p.response_bits,
            retention_secs: p.retention.as_secs(),
            session_timeout_secs: p.session_timeout.as_secs(),
        }
    }

    pub fn to_protocol(&self) -> Result<ProtocolConfig> {
        let p = ProtocolConfig::new(self.challenge_bits, self.response_bits)?
            .with_retention(Duration::from_secs(self.retention_secs))
            .with_session_timeout(Duration::from_secs(self.session_timeout_secs));
        Ok(p)
    }
}

/// Writes `cfg` owner-only (0600 on unix). The JSON lands beside `path`
/// first and is renamed over it, so readers see the old file or the new one.
pub fn write_config(path: &Path, cfg: &Config) -> Result<()> {
    let data = serde_json::to_vec_pretty(cfg).context("serialize config")?;
    let staged = path.with_extension("json.partial");
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(0o600);
    let mut file = opts
        .open(&staged)
        .with_context(|| format!("create {}", staged.display()))?;
    file.write_all(&data).context("write config")?;
    file.sync_all().context("flush config")?;
    fs::rename(&staged, path).with_context(|| format!("install {}", path.display()))?;
    Ok(())
}

pub fn read_config(path: &Path) -> Result<Config> {
    let data = fs::read(path).context("read config")?;
    serde_json::from_slice(&data).context("parse config")
}

/// Parameters from `store`'s config, or the defaults when no store is given.
pub fn load_protocol(store: Option<&Path>) -> Result<ProtocolConfig> {
    match store {
        None => Ok(ProtocolConfig::default()),
        Some(dir) => {
            let path = dir.join(CONFIG_FILE_NAME);
            let cfg = read_config(&path).with_context(|| {
                format!(
                    "config missing or invalid: {} (run: pufauth init --store <path>)",
                    path.display()
                )
            })?;
            cfg.to_protocol()
        }
    }
}
