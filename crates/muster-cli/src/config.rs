//! Layered configuration: optional TOML file, then `MUSTER_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use muster_ledger::LedgerConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  /// SQLite file holding the ledger.
  pub store_path:                 PathBuf,
  /// UTC offset, in hours, of the ledger's reference timezone. Ledger
  /// timestamps are wall-clock times in this zone. Defaults to `8.0`.
  pub reference_utc_offset_hours: f64,
  pub ledger:                     LedgerConfig,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      store_path:                 PathBuf::from("muster.db"),
      reference_utc_offset_hours: 8.0,
      ledger:                     LedgerConfig::default(),
    }
  }
}

impl CliConfig {
  /// Load from `path` (missing is fine) overlaid with `MUSTER_`-prefixed
  /// variables, e.g. `MUSTER_STORE_PATH` or `MUSTER_LEDGER__MAX_RETRIES`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("MUSTER")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: CliConfig = settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
