//! Filesystem lock keyed by business date
//!
//! Guarantees at most one run per date on this machine. The protocol is
//! presence plus modification time of `<dir>/.lock-<YYYY-MM-DD>`; the file
//! content (timestamp and PID) is for humans only.
//!
//! Known limitation: eviction of a stale lock is delete-then-create. Two
//! processes evicting the same stale file at the same moment can both
//! succeed in the window between one's delete and the other's create. The
//! window is narrow and staleness implies the previous owner is long gone.

use crate::error::LockError;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Upper bound on create attempts within one acquisition
const MAX_ROUNDS: u32 = 4;

/// Lock file path for a date key
pub fn lock_path(dir: &Path, date_key: &str) -> PathBuf {
    dir.join(format!(".lock-{}", date_key))
}

/// Handle to an acquired date lock. Released explicitly or on drop.
#[derive(Debug)]
pub struct DateLock {
    path: PathBuf,
    content: String,
    released: bool,
}

impl DateLock {
    /// Try to take the lock for `date_key`.
    ///
    /// Fails with [`LockError::Held`] when a lock younger than `ttl` exists.
    /// Older locks are evicted and acquisition is retried a bounded number of
    /// times. Never waits for a held lock to go away.
    pub fn acquire(dir: &Path, date_key: &str, ttl: Duration) -> Result<Self, LockError> {
        fs::create_dir_all(dir).map_err(|source| LockError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = lock_path(dir, date_key);
        let mut rounds = 0;

        loop {
            if rounds >= MAX_ROUNDS {
                return Err(LockError::Contended {
                    path,
                    attempts: rounds,
                });
            }
            rounds += 1;

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let content = format!(
                        "{}\nPID: {}\n",
                        Local::now().to_rfc3339(),
                        std::process::id()
                    );
                    file.write_all(content.as_bytes())
                        .and_then(|_| file.sync_all())
                        .map_err(|source| LockError::Io {
                            path: path.clone(),
                            source,
                        })?;
                    info!(path = %path.display(), "Lock acquired: {}", path.display());
                    return Ok(Self {
                        path,
                        content,
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(source) => return Err(LockError::Io { path, source }),
            }

            let age = match lock_age(&path) {
                Ok(age) => age,
                // Removed between our create attempt and the stat; just try again
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(LockError::Io { path, source }),
            };

            if age < ttl {
                return Err(LockError::Held { path, age, ttl });
            }

            warn!(
                path = %path.display(),
                age_hours = age.as_secs_f64() / 3600.0,
                ttl_hours = ttl.as_secs_f64() / 3600.0,
                "Stale lock detected (age {:.1}h >= ttl {:.1}h), removing",
                age.as_secs_f64() / 3600.0,
                ttl.as_secs_f64() / 3600.0
            );
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(LockError::Io { path, source }),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Diagnostic content written at acquisition
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Release the lock. A lock file removed externally is not an error.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        // Only delete the file if it is still ours; a later run may have
        // evicted us as stale and written its own lock.
        match fs::read_to_string(&self.path) {
            Ok(current) if current == self.content => match fs::remove_file(&self.path) {
                Ok(()) => info!(path = %self.path.display(), "Lock released: {}", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove lock file {}",
                    self.path.display()
                ),
            },
            Ok(_) => warn!(
                path = %self.path.display(),
                "Lock file {} now belongs to another run, leaving it in place",
                self.path.display()
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Lock file already removed");
            }
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to read lock file {} on release",
                self.path.display()
            ),
        }
    }
}

impl Drop for DateLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Age of a lock file from its modification time. A timestamp in the
/// future counts as age zero.
fn lock_age(path: &Path) -> io::Result<Duration> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}
