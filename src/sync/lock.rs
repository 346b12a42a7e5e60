use crate::errors::{Result, VaultError};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Name of the marker file inside the git directory.
pub const LOCK_FILE_NAME: &str = "roster-sync.lock";

const MAX_ATTEMPTS: usize = 3;

/// Contents of the lock marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process that took the lock
    pub pid: u32,
    /// When the lock was taken
    pub started_at: DateTime<Utc>,
    /// Identifies one acquisition; only its holder may remove the marker
    pub token: Uuid,
}

impl LockInfo {
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Exclusive, non-blocking, per-repository synchronization lock.
///
/// Held as an OS advisory lock on the marker file. The marker's timestamp is
/// only consulted when that lock is contended: a holder older than the
/// staleness threshold is considered abandoned and its marker is replaced.
/// Removals of the marker are serialized through a sibling
/// `roster-sync.lock.guard` file, so concurrent reclaimers cannot unlink each
/// other's fresh marker. Dropping the guard releases the lock.
#[derive(Debug)]
pub struct OperationLock {
    path: PathBuf,
    file: Option<File>,
    info: LockInfo,
}

impl OperationLock {
    pub fn path_for(git_dir: &Path) -> PathBuf {
        git_dir.join(LOCK_FILE_NAME)
    }

    /// Take the lock or fail immediately with [`VaultError::Locked`].
    pub fn acquire(git_dir: &Path, stale_after: Duration) -> Result<Self> {
        let path = Self::path_for(git_dir);
        let mut last_holder = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    // The marker may have been unlinked between open and lock.
                    if !still_names(&path, &file) {
                        debug!("Lock file replaced during acquisition (attempt {})", attempt);
                        let _ = FileExt::unlock(&file);
                        continue;
                    }

                    if let Some(previous) = read_info(&path) {
                        debug!(
                            "Reclaiming unheld lock marker left by pid {} at {}",
                            previous.pid, previous.started_at
                        );
                    }

                    let info = LockInfo {
                        pid: std::process::id(),
                        started_at: Utc::now(),
                        token: Uuid::new_v4(),
                    };
                    if let Err(e) = write_info(&file, &info) {
                        let _ = FileExt::unlock(&file);
                        return Err(e);
                    }

                    debug!("Acquired sync lock {}", path.display());
                    return Ok(Self {
                        path,
                        file: Some(file),
                        info,
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    let (since, pid) = match read_info(&path) {
                        Some(info) => (info.started_at, info.pid),
                        None => (marker_mtime(&path).unwrap_or_else(Utc::now), 0),
                    };
                    last_holder = Some((since, pid));

                    let age = (Utc::now() - since).to_std().unwrap_or_default();
                    if age < stale_after {
                        return Err(VaultError::Locked { since, pid });
                    }

                    warn!(
                        "Reclaiming stale sync lock held by pid {} since {} ({}s old)",
                        pid,
                        since,
                        age.as_secs()
                    );
                    // Only unlink the marker we found contended; a racing
                    // reclaimer may already have replaced it with its own.
                    let removed = guarded(&path, || {
                        if !still_names(&path, &file) {
                            return Ok(false);
                        }
                        match fs::remove_file(&path) {
                            Ok(()) => Ok(true),
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                            Err(e) => Err(VaultError::Io(e)),
                        }
                    })?;
                    if !removed {
                        debug!("Stale lock already replaced (attempt {})", attempt);
                    }
                }
                Err(e) => return Err(VaultError::Io(e)),
            }
        }

        let (since, pid) = last_holder.unwrap_or_else(|| (Utc::now(), 0));
        Err(VaultError::Locked { since, pid })
    }

    /// Current marker contents, if any. Does not take the lock.
    pub fn inspect(git_dir: &Path) -> Option<LockInfo> {
        read_info(&Self::path_for(git_dir))
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock. Safe to call more than once.
    ///
    /// The marker is only removed while it still carries this holder's token,
    /// so a holder whose lock was reclaimed as stale cannot delete its
    /// successor's marker.
    pub fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        let removed = guarded(&self.path, || {
            if read_info(&self.path).is_some_and(|i| i.token == self.info.token) {
                match fs::remove_file(&self.path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(VaultError::Io(e)),
                }
            }
            Ok(())
        });
        if let Err(e) = removed {
            warn!("Could not remove sync lock {}: {}", self.path.display(), e);
        }

        let _ = FileExt::unlock(&file);
        debug!("Released sync lock {}", self.path.display());
        Ok(())
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

fn guard_path(marker: &Path) -> PathBuf {
    let mut name = marker.as_os_str().to_owned();
    name.push(".guard");
    PathBuf::from(name)
}

/// Run `f` while holding the guard file next to the marker.
///
/// Every unlink of the marker happens under this guard, so a check on the
/// marker followed by its removal cannot interleave with another removal.
/// The guard itself is never removed and is held only briefly.
fn guarded<T>(marker: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let guard = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(guard_path(marker))?;
    guard.lock_exclusive()?;
    let result = f();
    let _ = FileExt::unlock(&guard);
    result
}

fn read_info(path: &Path) -> Option<LockInfo> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

fn write_info(mut file: &File, info: &LockInfo) -> Result<()> {
    let content = serde_json::to_string(info)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn marker_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

#[cfg(unix)]
fn still_names(path: &Path, file: &File) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(path), file.metadata()) {
        (Ok(on_disk), Ok(held)) => on_disk.dev() == held.dev() && on_disk.ino() == held.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_names(path: &Path, _file: &File) -> bool {
    path.exists()
}
