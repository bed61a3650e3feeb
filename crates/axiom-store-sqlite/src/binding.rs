//! Binding a store to a repository root.
//!
//! All persistent state for a repository lives under `<root>/.intent/`:
//!
//! | file          | contents                                        |
//! |---------------|-------------------------------------------------|
//! | `intent.db`   | the SQLite database                             |
//! | `meta.json`   | [`Metadata`] describing the binding             |
//! | `write.lock`  | advisory lock file, held for the span of writes |
//! | `config.toml` | optional [`crate::StoreConfig`] overrides       |

use std::{
  fs,
  io::Write as _,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  schema::{self, SCHEMA_VERSION},
};

pub const DATA_DIR: &str = ".intent";
const DB_FILE: &str = "intent.db";
const META_FILE: &str = "meta.json";
const LOCK_FILE: &str = "write.lock";
const CONFIG_FILE: &str = "config.toml";

/// Contents of `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
  pub repo_path:      PathBuf,
  pub created_at:     DateTime<Utc>,
  pub schema_version: u32,
}

/// A repository root together with its data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryBinding {
  root:     PathBuf,
  data_dir: PathBuf,
}

/// What `meta.json` turned out to hold.
enum MetaState {
  Missing,
  /// Empty, not JSON, or missing fields. Safe to rewrite.
  Damaged,
  /// A complete record whose `schema_version` this build cannot interpret.
  Foreign(serde_json::Value),
  Valid(Metadata),
}

/// Walk up from `start` to the first directory containing `.git`.
pub fn find_root(start: impl AsRef<Path>) -> Result<PathBuf> {
  let start = start.as_ref();
  let canonical = fs::canonicalize(start)?;
  let root = canonical
    .ancestors()
    .find(|dir| dir.join(".git").exists())
    .ok_or_else(|| Error::NotARepository(start.to_path_buf()))?;
  debug!(root = ?root, "discovered repository root");
  Ok(root.to_path_buf())
}

impl RepositoryBinding {
  /// Find the enclosing repository and bind it.
  pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
    Self::bind(find_root(start)?)
  }

  /// Bind `root` directly, creating the data directory and metadata record
  /// when they are absent. Binding an already-bound root changes nothing.
  ///
  /// A database already present must be one this store can open; otherwise
  /// nothing is written next to it.
  pub fn bind(root: impl AsRef<Path>) -> Result<Self> {
    let binding = Self::at(root)?;
    fs::create_dir_all(&binding.data_dir)?;
    if binding.db_path().is_file() {
      let conn =
        Connection::open_with_flags(binding.db_path(), OpenFlags::SQLITE_OPEN_READ_WRITE)?;
      schema::check_database(&conn)?;
    }
    binding.ensure_metadata()?;
    Ok(binding)
  }

  /// Attach to a root that has already been bound, without creating
  /// anything. Fails with [`Error::NotInitialized`] when there is no store.
  pub fn existing(root: impl AsRef<Path>) -> Result<Self> {
    let binding = Self::at(root)?;
    if !binding.db_path().is_file() {
      return Err(Error::NotInitialized(binding.root));
    }
    match binding.read_metadata()? {
      MetaState::Valid(meta) => binding.check_metadata(&meta)?,
      MetaState::Foreign(version) => return Err(binding.foreign_meta(&version)),
      MetaState::Missing | MetaState::Damaged => {
        warn!(path = ?binding.meta_path(), "repository metadata is missing or damaged");
      }
    }
    Ok(binding)
  }

  fn at(root: impl AsRef<Path>) -> Result<Self> {
    let root = fs::canonicalize(root.as_ref())?;
    if !root.is_dir() {
      return Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotADirectory,
        format!("{} is not a directory", root.display()),
      )));
    }
    let data_dir = root.join(DATA_DIR);
    Ok(Self { root, data_dir })
  }

  pub fn root(&self) -> &Path { &self.root }

  pub fn data_dir(&self) -> &Path { &self.data_dir }

  pub fn db_path(&self) -> PathBuf { self.data_dir.join(DB_FILE) }

  pub fn meta_path(&self) -> PathBuf { self.data_dir.join(META_FILE) }

  pub fn lock_path(&self) -> PathBuf { self.data_dir.join(LOCK_FILE) }

  pub fn config_path(&self) -> PathBuf { self.data_dir.join(CONFIG_FILE) }

  /// Read `meta.json`. Returns `None` unless it holds a complete record this
  /// build understands.
  pub fn metadata(&self) -> Result<Option<Metadata>> {
    Ok(match self.read_metadata()? {
      MetaState::Valid(meta) => Some(meta),
      _ => None,
    })
  }

  fn read_metadata(&self) -> Result<MetaState> {
    let raw = match fs::read_to_string(self.meta_path()) {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MetaState::Missing),
      Err(e) => return Err(e.into()),
    };
    let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(&raw) else {
      return Ok(MetaState::Damaged);
    };
    if ["repo_path", "created_at", "schema_version"]
      .iter()
      .any(|f| !fields.contains_key(*f))
    {
      return Ok(MetaState::Damaged);
    }

    let version = &fields["schema_version"];
    if version.as_u64().is_none_or(|v| u32::try_from(v).is_err()) {
      return Ok(MetaState::Foreign(version.clone()));
    }
    Ok(
      serde_json::from_value(serde_json::Value::Object(fields))
        .map_or(MetaState::Damaged, MetaState::Valid),
    )
  }

  fn foreign_meta(&self, version: &serde_json::Value) -> Error {
    Error::ForeignSchema {
      path:   self.meta_path(),
      detail: format!("unrecognised schema_version {version}"),
    }
  }

  fn check_metadata(&self, meta: &Metadata) -> Result<()> {
    if meta.schema_version > SCHEMA_VERSION {
      return Err(Error::SchemaMismatch {
        found:     meta.schema_version,
        supported: SCHEMA_VERSION,
      });
    }
    if meta.repo_path != self.root {
      warn!(
        recorded = ?meta.repo_path,
        actual = ?self.root,
        "repository has moved since it was bound"
      );
    }
    Ok(())
  }

  fn ensure_metadata(&self) -> Result<()> {
    match self.read_metadata()? {
      MetaState::Valid(meta) => self.check_metadata(&meta),
      MetaState::Foreign(version) => Err(self.foreign_meta(&version)),
      MetaState::Missing | MetaState::Damaged => {
        let meta = Metadata {
          repo_path:      self.root.clone(),
          created_at:     Utc::now(),
          schema_version: SCHEMA_VERSION,
        };
        self.write_metadata(&meta)?;
        info!(root = ?self.root, "wrote repository metadata");
        Ok(())
      }
    }
  }

  /// Replace `meta.json` atomically: write a sibling temp file, flush it to
  /// disk, then rename it over the target.
  fn write_metadata(&self, meta: &Metadata) -> Result<()> {
    let target = self.meta_path();
    let tmp = self
      .data_dir
      .join(format!("{META_FILE}.{}.tmp", std::process::id()));

    let mut file = fs::File::create(&tmp)?;
    file.write_all(&serde_json::to_vec_pretty(meta)?)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, &target)?;
    Ok(())
  }
}
