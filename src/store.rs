//! Crash-safe durable persistence (component C1, `spec.md` §4.1).
//!
//! All writes land in a sibling temp file, get fsynced, then get renamed over
//! the target (the rename is atomic on the same filesystem); the file that was
//! there before is kept alongside as `.backup`. Every public method takes the
//! single process-wide mutex before touching disk, so correctness never
//! depends on interleaving — contention is negligible at this scale.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use solana_sdk::pubkey::Pubkey;

use crate::error::StorageError;
use crate::types::{CoreWallet, Pool, Session, Statistics, Worker};

const WORKERS_FILE: &str = "workers.json";
const STATISTICS_FILE: &str = "statistics.json";
const POOLS_FILE: &str = "pools.json";
const ACTIVE_POOLS_FILE: &str = "active_pools.json";
const CORE_WALLET_FILE: &str = "core_wallet.json";
const ERRORS_DIR: &str = "errors";
const SESSIONS_DIR: &str = "sessions";

pub struct Store {
    root: PathBuf,
    lock: Mutex<()>,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Atomically writes `value` (as pretty JSON) to `relative`, keeping the
    /// previous contents at `<relative>.backup`.
    fn write_atomic<T: serde::Serialize>(&self, relative: &str, value: &T) -> Result<(), StorageError> {
        let _guard = self.lock.lock().expect("store mutex is never poisoned");
        let target = self.path(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let json = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Serde {
            what: relative.to_string(),
            source,
        })?;

        let tmp_path = target.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path).map_err(|source| StorageError::Io {
                path: tmp_path.display().to_string(),
                source,
            })?;
            tmp.write_all(&json).map_err(|source| StorageError::Io {
                path: tmp_path.display().to_string(),
                source,
            })?;
            tmp.sync_all().map_err(|source| StorageError::Io {
                path: tmp_path.display().to_string(),
                source,
            })?;
        }

        if target.exists() {
            let backup_path = target.with_extension("json.backup");
            let _ = fs::copy(&target, &backup_path);
        }

        fs::rename(&tmp_path, &target).map_err(|source| StorageError::Io {
            path: target.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Reads and deserializes `relative`; a missing file yields `default` rather
    /// than an error, per the contract's "reads tolerate missing files" rule.
    fn read_or_default<T: serde::de::DeserializeOwned + Default>(&self, relative: &str) -> Result<T, StorageError> {
        let _guard = self.lock.lock().expect("store mutex is never poisoned");
        let target = self.path(relative);
        match fs::read(&target) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Serde {
                what: relative.to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(source) => Err(StorageError::Io {
                path: target.display().to_string(),
                source,
            }),
        }
    }

    pub fn upsert_worker(&self, worker: &Worker) -> Result<(), StorageError> {
        let mut workers: HashMap<String, Worker> = self.read_or_default(WORKERS_FILE)?;
        workers.insert(worker.worker_id.clone(), worker.clone());
        self.write_atomic(WORKERS_FILE, &workers)
    }

    pub fn load_workers(&self) -> Result<HashMap<String, Worker>, StorageError> {
        self.read_or_default(WORKERS_FILE)
    }

    pub fn delete_worker(&self, worker_id: &str) -> Result<(), StorageError> {
        let mut workers: HashMap<String, Worker> = self.read_or_default(WORKERS_FILE)?;
        workers.remove(worker_id);
        self.write_atomic(WORKERS_FILE, &workers)
    }

    pub fn save_stats(&self, worker_id: &str, stats: &Statistics) -> Result<(), StorageError> {
        let mut all: HashMap<String, Statistics> = self.read_or_default(STATISTICS_FILE)?;
        all.insert(worker_id.to_string(), stats.clone());
        self.write_atomic(STATISTICS_FILE, &all)
    }

    pub fn load_stats(&self, worker_id: &str) -> Result<Statistics, StorageError> {
        let all: HashMap<String, Statistics> = self.read_or_default(STATISTICS_FILE)?;
        Ok(all.get(worker_id).cloned().unwrap_or_default())
    }

    pub fn append_error(
        &self,
        worker_id: &str,
        message: impl Into<String>,
        contract_error_code: Option<u32>,
    ) -> Result<(), StorageError> {
        let relative = format!("{ERRORS_DIR}/{worker_id}.json");
        let mut stats: Statistics = self.read_or_default(&relative)?;
        stats.push_error(message, contract_error_code);
        self.write_atomic(&relative, &stats)
    }

    pub fn save_pool(&self, pool: &Pool) -> Result<(), StorageError> {
        let mut pools: HashMap<String, Pool> = self.read_or_default(POOLS_FILE)?;
        pools.insert(pool.pool_id.to_string(), pool.clone());
        self.write_atomic(POOLS_FILE, &pools)
    }

    /// Keyed by pool id (base58), since JSON object keys must be strings and
    /// `Pubkey`'s own `Serialize` impl isn't one.
    pub fn load_pools(&self) -> Result<HashMap<String, Pool>, StorageError> {
        self.read_or_default(POOLS_FILE)
    }

    pub fn save_active_pools(&self, active: &[Pubkey]) -> Result<(), StorageError> {
        self.write_atomic(ACTIVE_POOLS_FILE, &active.to_vec())
    }

    pub fn load_active_pools(&self) -> Result<Vec<Pubkey>, StorageError> {
        self.read_or_default(ACTIVE_POOLS_FILE)
    }

    pub fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        let timestamp = session.stopped_at.timestamp_millis();
        let relative = format!("{SESSIONS_DIR}/{}/session_{timestamp}.json", session.worker_id);
        self.write_atomic(&relative, session)
    }

    pub fn save_core_wallet(&self, wallet: &CoreWallet) -> Result<(), StorageError> {
        self.write_atomic(CORE_WALLET_FILE, wallet)
    }

    pub fn load_core_wallet(&self) -> Result<Option<CoreWallet>, StorageError> {
        let _guard = self.lock.lock().expect("store mutex is never poisoned");
        let target = self.path(CORE_WALLET_FILE);
        match fs::read(&target) {
            Ok(bytes) => {
                let wallet = serde_json::from_slice(&bytes).map_err(|source| StorageError::Serde {
                    what: CORE_WALLET_FILE.to_string(),
                    source,
                })?;
                Ok(Some(wallet))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: target.display().to_string(),
                source,
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TokenSide, WorkerKind, WorkerStatus, WorkerWallet};

    fn sample_worker(id: &str) -> Worker {
        Worker {
            worker_id: id.to_string(),
            kind: WorkerKind::Deposit,
            pool_id: Pubkey::new_unique(),
            token_side: Some(TokenSide::A),
            initial_amount: 1_000,
            auto_refill: false,
            share_tokens: true,
            wallet: WorkerWallet::generate(),
            status: WorkerStatus::Created,
            created_at: chrono::Utc::now(),
            last_operation_at: None,
        }
    }

    #[test]
    fn upsert_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let worker = sample_worker("dep-1");
        store.upsert_worker(&worker).unwrap();

        let loaded = store.load_workers().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["dep-1"].initial_amount, 1_000);
    }

    #[test]
    fn missing_files_return_empty_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        assert!(store.load_workers().unwrap().is_empty());
        assert!(store.load_pools().unwrap().is_empty());
        assert!(store.load_active_pools().unwrap().is_empty());
        assert!(store.load_core_wallet().unwrap().is_none());
    }

    #[test]
    fn write_is_atomic_and_keeps_a_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.upsert_worker(&sample_worker("dep-1")).unwrap();
        store.upsert_worker(&sample_worker("dep-2")).unwrap();

        assert!(dir.path().join(WORKERS_FILE).exists());
        assert!(dir.path().join("workers.json.backup").exists());
        assert!(!dir.path().join("workers.tmp").exists());
    }

    #[test]
    fn errors_are_bounded_per_worker() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        for i in 0..15 {
            store.append_error("dep-1", format!("boom {i}"), None).unwrap();
        }
        let relative = format!("{ERRORS_DIR}/dep-1.json");
        let stats: Statistics = store.read_or_default(&relative).unwrap();
        assert_eq!(stats.last_errors.len(), crate::constants::MAX_WORKER_ERRORS);
        assert_eq!(stats.last_errors.back().unwrap().message, "boom 14");
    }

    #[test]
    fn delete_worker_removes_it_from_the_registry() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.upsert_worker(&sample_worker("dep-1")).unwrap();
        store.delete_worker("dep-1").unwrap();
        assert!(store.load_workers().unwrap().is_empty());
    }
}
