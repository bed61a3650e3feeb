//! Store configuration.
//!
//! Values come from `<data dir>/config.toml` when present, overridden by
//! `AXIOM_`-prefixed environment variables. Nested keys use a double
//! underscore, e.g. `AXIOM_POLICY__ALLOW_DRAFT_TO_SATISFIED=true`.

use std::{path::Path, time::Duration};

use axiom_core::policy::Policy;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  /// How long a writer waits for the directory lock before giving up.
  pub lock_timeout_ms: u64,
  /// SQLite busy timeout for the connection.
  pub busy_timeout_ms: u64,
  /// Rows fetched per round trip by listing cursors.
  pub page_size:       usize,
  pub policy:          Policy,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      lock_timeout_ms: 5_000,
      busy_timeout_ms: 5_000,
      page_size:       64,
      policy:          Policy::default(),
    }
  }
}

impl StoreConfig {
  /// Load configuration for a data directory. A missing file means
  /// defaults.
  pub fn load(config_path: &Path) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(config_path).required(false))
      .add_source(
        config::Environment::with_prefix("AXIOM")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("policy.closed_statuses"),
      )
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  pub fn lock_timeout(&self) -> Duration {
    Duration::from_millis(self.lock_timeout_ms)
  }

  pub fn busy_timeout(&self) -> Duration {
    Duration::from_millis(self.busy_timeout_ms)
  }

  /// Page size, never zero.
  pub fn page_size(&self) -> usize { self.page_size.max(1) }
}
