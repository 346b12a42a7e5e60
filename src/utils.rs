use crate::errors::{Result, VaultError};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Terminal spinner shown while network-bound work runs
pub mod spinner;

/// Atomic file operations so a crash never leaves a half-written record
pub mod atomic_file {
    use super::*;

    /// Serialize `data` as pretty JSON and write it atomically
    pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;
        write_string(path, &content)
    }

    /// Write string content through a temporary file and rename
    pub fn write_string(path: &Path, content: &str) -> Result<()> {
        let _lock = crate::utils::file_locking::FileLock::acquire(path)?;
        write_unlocked(path, content.as_bytes())
    }

    fn write_unlocked(path: &Path, data: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");

        fs::write(&temp_path, data).map_err(|e| {
            VaultError::record(format!("Failed to write temporary file {}: {e}", temp_path.display()))
        })?;

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            VaultError::record(format!("Failed to finalize {}: {e}", path.display()))
        })
    }
}

/// Path validation so user-supplied ids never escape their directory
pub mod path_validation {
    use super::*;

    const MAX_ID_LEN: usize = 64;

    /// Accept only `[A-Za-z0-9_-]` identifiers.
    pub fn validate_id(id: &str) -> Result<&str> {
        if id.is_empty() || id.len() > MAX_ID_LEN {
            return Err(VaultError::validation(format!(
                "Identifier must be 1-{MAX_ID_LEN} characters"
            )));
        }

        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(VaultError::validation(format!(
                "Identifier '{id}' may only contain letters, digits, '-' and '_'"
            )));
        }

        Ok(id)
    }
}

/// Async helpers that keep the blocking engine off the runtime threads
pub mod async_ops {
    use super::*;
    use tokio::task;

    /// Run a blocking engine call on the blocking pool
    pub async fn run_blocking<F, R>(operation: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        task::spawn_blocking(operation)
            .await
            .map_err(|e| VaultError::config(format!("Background task failed: {e}")))?
    }
}

/// Sidecar lock files guarding concurrent writers of the same file
pub mod file_locking {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    pub struct FileLock {
        _file: File,
        lock_path: PathBuf,
    }

    impl FileLock {
        const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
        const RETRY_INTERVAL: Duration = Duration::from_millis(50);

        pub fn acquire(file_path: &Path) -> Result<Self> {
            Self::acquire_with_timeout(file_path, Self::DEFAULT_TIMEOUT)
        }

        pub fn acquire_with_timeout(file_path: &Path, timeout: Duration) -> Result<Self> {
            let lock_path = file_path.with_extension("lock");
            let start = Instant::now();

            loop {
                match OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&lock_path)
                {
                    Ok(file) => {
                        return Ok(Self {
                            _file: file,
                            lock_path,
                        })
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        if start.elapsed() >= timeout {
                            return Err(VaultError::record(format!(
                                "Timeout waiting for lock on {} after {}ms",
                                file_path.display(),
                                timeout.as_millis()
                            )));
                        }
                        std::thread::sleep(Self::RETRY_INTERVAL);
                    }
                    Err(e) => {
                        return Err(VaultError::record(format!(
                            "Failed to acquire lock {}: {e}",
                            lock_path.display()
                        )))
                    }
                }
            }
        }
    }

    impl Drop for FileLock {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
