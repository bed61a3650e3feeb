//! Advisory write lock on the data directory.

use std::{
  fs::{File, OpenOptions},
  path::PathBuf,
  thread,
  time::{Duration, Instant},
};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Exclusive lock over `<data dir>/write.lock`, taken once per write.
#[derive(Debug, Clone)]
pub struct DirLock {
  path:    PathBuf,
  timeout: Duration,
}

impl DirLock {
  pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
    Self { path: path.into(), timeout }
  }

  /// Block until the lock is held or `timeout` has passed.
  pub fn acquire(&self) -> Result<LockGuard> {
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&self.path)?;

    let started = Instant::now();
    let mut announced = false;
    loop {
      match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {
          debug!(path = ?self.path, waited = ?started.elapsed(), "write lock acquired");
          return Ok(LockGuard { file });
        }
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
          let waited = started.elapsed();
          if waited >= self.timeout {
            warn!(path = ?self.path, ?waited, "gave up waiting for write lock");
            return Err(Error::LockContention { path: self.path.clone(), waited });
          }
          if !announced {
            warn!(path = ?self.path, "write lock held elsewhere; waiting");
            announced = true;
          }
          thread::sleep(POLL_INTERVAL.min(self.timeout - waited));
        }
        Err(e) => return Err(e.into()),
      }
    }
  }
}

/// Releases the lock when dropped, on every exit path.
#[derive(Debug)]
pub struct LockGuard {
  file: File,
}

impl Drop for LockGuard {
  fn drop(&mut self) {
    if let Err(e) = FileExt::unlock(&self.file) {
      warn!(error = %e, "failed to release write lock");
    }
  }
}
