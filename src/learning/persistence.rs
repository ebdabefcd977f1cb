//! Snapshot persistence port and its file-backed implementation

use super::store::LearningSnapshot;
use crate::{config::LearningConfig, EngineError, Result};
use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Port through which the learning store loads and saves its snapshot.
///
/// Injected so tests can run against memory and deployments against a file;
/// the store itself never touches the filesystem.
#[async_trait]
pub trait SnapshotPersistence: Send + Sync {
    /// Load the last persisted snapshot, if any exists
    async fn load(&self) -> Result<Option<LearningSnapshot>>;

    /// Persist a snapshot, replacing any previous one
    async fn save(&self, snapshot: &LearningSnapshot) -> Result<()>;
}

/// File-backed persistence guarded by an advisory lock file.
///
/// The lock is a sibling `.lock` file taken with create-new semantics,
/// retried with linear backoff, and broken when older than the staleness
/// timeout (a crashed process must not wedge every later writer).
pub struct FilePersistence {
    path: PathBuf,
    lock_path: PathBuf,
    lock_retries: u32,
    lock_backoff: Duration,
    lock_stale: Duration,
}

impl FilePersistence {
    /// Persistence over the snapshot path configured in `config`
    pub fn new(config: &LearningConfig) -> Self {
        let path = config.state_path.clone();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
            lock_retries: config.lock_retries,
            lock_backoff: Duration::from_millis(config.lock_backoff_ms),
            lock_stale: Duration::from_millis(config.lock_stale_ms),
        }
    }

    async fn acquire_lock(&self) -> Result<LockGuard> {
        for attempt in 1..=self.lock_retries {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
            {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(LockGuard {
                        path: self.lock_path.clone(),
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if self.break_stale_lock() {
                        continue;
                    }
                    debug!(
                        attempt,
                        path = %self.lock_path.display(),
                        "snapshot lock held, backing off"
                    );
                    tokio::time::sleep(self.lock_backoff * attempt).await;
                }
                Err(err) => {
                    return Err(EngineError::Persistence(format!(
                        "Failed to create lock file {}: {}",
                        self.lock_path.display(),
                        err
                    ))
                    .into());
                }
            }
        }

        Err(EngineError::Persistence(format!(
            "Could not acquire snapshot lock {} after {} attempts",
            self.lock_path.display(),
            self.lock_retries
        ))
        .into())
    }

    /// Remove the lock file if it has outlived the staleness timeout.
    /// Returns true when a stale lock was broken.
    fn break_stale_lock(&self) -> bool {
        let age = fs::metadata(&self.lock_path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok());

        match age {
            Some(age) if age > self.lock_stale => {
                warn!(
                    path = %self.lock_path.display(),
                    age_ms = age.as_millis() as u64,
                    "breaking stale snapshot lock"
                );
                fs::remove_file(&self.lock_path).is_ok()
            }
            _ => false,
        }
    }
}

#[async_trait]
impl SnapshotPersistence for FilePersistence {
    async fn load(&self) -> Result<Option<LearningSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let _guard = self.acquire_lock().await?;
        let content = fs::read_to_string(&self.path).map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to read snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let snapshot = serde_json::from_str(&content).map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to parse snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &LearningSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    EngineError::Persistence(format!(
                        "Failed to create snapshot directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let _guard = self.acquire_lock().await?;

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| EngineError::Persistence(format!("Failed to serialize snapshot: {}", e)))?;

        // Write to a sibling temp file first so a crash mid-write never
        // leaves a truncated snapshot behind.
        let tmp_path = temp_path(&self.path);
        fs::write(&tmp_path, content).map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to write snapshot {}: {}",
                tmp_path.display(),
                e
            ))
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            EngineError::Persistence(format!(
                "Failed to replace snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), "snapshot persisted");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.to_path_buf().into_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

/// Lock file removed on drop, so a failed save still releases the lock
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// In-memory persistence for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryPersistence {
    inner: std::sync::Mutex<Option<LearningSnapshot>>,
    fail_saves: std::sync::atomic::AtomicBool,
}

impl MemoryPersistence {
    /// Empty in-memory persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl SnapshotPersistence for MemoryPersistence {
    async fn load(&self) -> Result<Option<LearningSnapshot>> {
        Ok(self.inner.lock().expect("persistence lock poisoned").clone())
    }

    async fn save(&self, snapshot: &LearningSnapshot) -> Result<()> {
        if self.fail_saves.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(EngineError::Persistence("injected save failure".to_string()).into());
        }
        *self.inner.lock().expect("persistence lock poisoned") = Some(snapshot.clone());
        Ok(())
    }
}
