//! Error type for `axiom-store-sqlite`.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] axiom_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  /// A stored value could not be mapped back onto a domain type.
  #[error("invalid stored data: {0}")]
  Decode(String),

  /// Another writer held the data directory for longer than the configured
  /// timeout.
  #[error("data directory {path:?} is locked by another writer (waited {waited:?})")]
  LockContention { path: PathBuf, waited: Duration },

  /// The on-disk schema was written by a newer version of Axiom. Nothing is
  /// read or written when this is returned.
  #[error("on-disk schema version {found} is newer than supported version {supported}")]
  SchemaMismatch { found: u32, supported: u32 },

  /// The data directory holds records laid out by something other than
  /// this store. It is left exactly as found.
  #[error("{path:?} was not written by this store ({detail}); manual intervention required")]
  ForeignSchema { path: PathBuf, detail: String },

  #[error("{0:?} has no reasoning store; run `axiom init` first")]
  NotInitialized(PathBuf),

  #[error("{0:?} is not inside a git repository")]
  NotARepository(PathBuf),
}

impl From<axiom_core::validate::ValidationError> for Error {
  fn from(e: axiom_core::validate::ValidationError) -> Self {
    Self::Core(e.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
