//! Offense ledger
//!
//! Per-user offense counters behind a narrow get/increment/reset interface.
//! The file-backed implementation keeps the counters in memory and writes
//! the whole document through on every mutation, so the counts survive a
//! restart. A missing or corrupt document on startup is an empty ledger,
//! not a fatal error.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Errors from the ledger's backing storage
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger document could not be read or written
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ledger document could not be serialized
    #[error("corrupt ledger document: {0}")]
    Corrupt(String),
}

/// Persistent per-user offense counters
///
/// `get` never fails and reports 0 for unknown users. `increment` must not
/// lose a concurrent strike against the same user, and a failed increment is
/// fatal for the request that issued it.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait OffenseLedger: Send + Sync {
    /// Current offense count for a user (0 if never recorded)
    async fn get(&self, user_id: u64) -> u64;

    /// Record one offense and return the new count
    async fn increment(&self, user_id: u64) -> Result<u64, LedgerError>;

    /// Set a user's count back to 0 (idempotent)
    async fn reset(&self, user_id: u64) -> Result<(), LedgerError>;
}

/// Ledger backed by a single YAML document on disk
pub struct FileLedger {
    /// In-memory counters, keyed by user id
    counts: DashMap<u64, u64>,
    /// Path of the persisted document
    path: PathBuf,
    /// Serializes mutations so a read-modify-write-persist cycle is atomic
    write_lock: Mutex<()>,
}

impl FileLedger {
    /// Load the ledger from `path`, treating a missing or unreadable
    /// document as an empty ledger.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let counts = DashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_yaml::from_str::<BTreeMap<String, u64>>(&contents) {
                Ok(stored) => {
                    for (user_id, count) in stored {
                        match user_id.parse::<u64>() {
                            Ok(id) => {
                                counts.insert(id, count);
                            }
                            Err(_) => {
                                warn!(key = %user_id, "Skipping non-numeric ledger key");
                            }
                        }
                    }
                    info!(path = %path.display(), entries = counts.len(), "Offense ledger loaded");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt offense ledger, starting empty");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No offense ledger on disk, starting empty");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read offense ledger, starting empty");
            }
        }

        Self {
            counts,
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Write the full document to disk
    async fn persist(&self) -> Result<(), LedgerError> {
        // String keys keep the document stable regardless of YAML integer quirks
        let snapshot: BTreeMap<String, u64> = self
            .counts
            .iter()
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect();

        let yaml = serde_yaml::to_string(&snapshot).map_err(|e| LedgerError::Corrupt(e.to_string()))?;

        if let Some(dir) = self.path.parent().filter(|p| *p != Path::new("")) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.path, yaml).await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl OffenseLedger for FileLedger {
    async fn get(&self, user_id: u64) -> u64 {
        self.counts.get(&user_id).map_or(0, |entry| *entry.value())
    }

    async fn increment(&self, user_id: u64) -> Result<u64, LedgerError> {
        let _guard = self.write_lock.lock().await;

        let new_count = {
            let mut entry = self.counts.entry(user_id).or_insert(0);
            *entry += 1;
            *entry
        };

        if let Err(e) = self.persist().await {
            // Roll back so a retried strike re-increments from the stored state
            if let Some(mut entry) = self.counts.get_mut(&user_id) {
                *entry = entry.saturating_sub(1);
            }
            return Err(e);
        }

        Ok(new_count)
    }

    async fn reset(&self, user_id: u64) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;

        // Records are zeroed, never deleted
        self.counts.insert(user_id, 0);
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ledger_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("offenses.yaml")
    }

    #[tokio::test]
    async fn test_get_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::load(ledger_path(&dir)).await;

        assert_eq!(ledger.get(12345).await, 0);
    }

    #[tokio::test]
    async fn test_increment_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::load(ledger_path(&dir)).await;

        for expected in 1..=4u64 {
            assert_eq!(ledger.increment(12345).await.unwrap(), expected);
        }
        assert_eq!(ledger.get(12345).await, 4);
        // Other users are untouched
        assert_eq!(ledger.get(67890).await, 0);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::load(ledger_path(&dir)).await;

        ledger.increment(12345).await.unwrap();
        ledger.increment(12345).await.unwrap();

        ledger.reset(12345).await.unwrap();
        assert_eq!(ledger.get(12345).await, 0);
        ledger.reset(12345).await.unwrap();
        assert_eq!(ledger.get(12345).await, 0);
    }

    #[tokio::test]
    async fn test_counts_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);

        {
            let ledger = FileLedger::load(&path).await;
            ledger.increment(12345).await.unwrap();
            ledger.increment(12345).await.unwrap();
            ledger.increment(67890).await.unwrap();
        }

        let reloaded = FileLedger::load(&path).await;
        assert_eq!(reloaded.get(12345).await, 2);
        assert_eq!(reloaded.get(67890).await, 1);
    }

    #[tokio::test]
    async fn test_corrupt_document_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = ledger_path(&dir);
        tokio::fs::write(&path, "{{{ not yaml").await.unwrap();

        let ledger = FileLedger::load(&path).await;
        assert_eq!(ledger.get(12345).await, 0);

        // The ledger is still usable and persists over the bad document
        assert_eq!(ledger.increment(12345).await.unwrap(), 1);
        let reloaded = FileLedger::load(&path).await;
        assert_eq!(reloaded.get(12345).await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(FileLedger::load(ledger_path(&dir)).await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.increment(12345).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(ledger.get(12345).await, 16);
    }
}
