//! Persistence seam for scan records.
//!
//! The orchestrator never writes fields directly: every change goes through
//! [`ScanStore::apply`], which checks the lifecycle table and persists the
//! transition as one unit.

use super::errors::StoreError;
use super::models::{Scan, ScanId, ScanStatus, ScanType};
use super::state::{Applied, Transition};
use crate::utils::fs::atomic_write;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Filter and pagination for [`ScanStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanQuery {
    pub status: Option<ScanStatus>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl ScanQuery {
    pub fn with_status(mut self, status: ScanStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    /// Number of records matching the filter, before pagination.
    pub total: usize,
    pub scans: Vec<Scan>,
}

#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Creates a PENDING record with the next free id.
    async fn create(&self, scan_type: ScanType, tool: &str, target: &str) -> Result<Scan, StoreError>;

    async fn get(&self, id: ScanId) -> Result<Scan, StoreError>;

    /// Applies `transition` to the stored record and returns the record as
    /// persisted afterwards.
    async fn apply(&self, id: ScanId, transition: Transition) -> Result<(Scan, Applied), StoreError>;

    /// Newest first.
    async fn list(&self, query: &ScanQuery) -> Result<ScanPage, StoreError>;
}

fn paginate(mut scans: Vec<Scan>, query: &ScanQuery) -> ScanPage {
    scans.retain(|scan| query.status.is_none_or(|status| scan.status == status));
    // ids are handed out in creation order
    scans.sort_by(|a, b| b.id.cmp(&a.id));

    let total = scans.len();
    let scans = scans
        .into_iter()
        .skip(query.skip)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect();

    ScanPage { total, scans }
}

/// In-process store, used for embedding and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    last_id: u64,
    scans: BTreeMap<ScanId, Scan>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn create(&self, scan_type: ScanType, tool: &str, target: &str) -> Result<Scan, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.last_id += 1;
        let scan = Scan::new(ScanId(inner.last_id), scan_type, tool, target);
        inner.scans.insert(scan.id, scan.clone());
        Ok(scan)
    }

    async fn get(&self, id: ScanId) -> Result<Scan, StoreError> {
        let inner = self.inner.lock().await;
        inner.scans.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn apply(&self, id: ScanId, transition: Transition) -> Result<(Scan, Applied), StoreError> {
        let mut inner = self.inner.lock().await;
        let scan = inner.scans.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let applied = scan.apply(transition)?;
        Ok((scan.clone(), applied))
    }

    async fn list(&self, query: &ScanQuery) -> Result<ScanPage, StoreError> {
        let inner = self.inner.lock().await;
        Ok(paginate(inner.scans.values().cloned().collect(), query))
    }
}

/// One JSON document per scan under a directory.
///
/// Records are read back from disk on every call so that several processes
/// (a worker and a CLI `cancel`, say) observe each other's writes. Every
/// read-modify-write holds an exclusive lock on `.lock` in the directory, so
/// handles in different processes never interleave a transition.
pub struct FileStore {
    records: Records,
    lock: Mutex<()>,
}

const RECORD_PREFIX: &str = "scan-";
const RECORD_SUFFIX: &str = ".json";
const LOCK_FILE: &str = ".lock";

#[derive(Clone)]
struct Records {
    dir: PathBuf,
}

impl Records {
    fn record_path(&self, id: ScanId) -> PathBuf {
        self.dir.join(format!("{}{}{}", RECORD_PREFIX, id, RECORD_SUFFIX))
    }

    fn record_id(path: &Path) -> Option<ScanId> {
        let name = path.file_name()?.to_str()?;
        name.strip_prefix(RECORD_PREFIX)?
            .strip_suffix(RECORD_SUFFIX)?
            .parse()
            .ok()
    }

    fn read(&self, id: ScanId) -> Result<Scan, StoreError> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StoreError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write(&self, scan: &Scan) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(scan)?;
        atomic_write(self.record_path(scan.id), &bytes)?;
        Ok(())
    }

    fn record_ids(&self) -> Result<Vec<ScanId>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            if let Some(id) = Self::record_id(&entry?.path()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn lock(&self) -> io::Result<DirLock> {
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.dir.join(LOCK_FILE))?;
        lock_exclusive(&file)?;
        Ok(DirLock { _file: file })
    }
}

/// Held for the duration of one read-modify-write; closing the file
/// releases the lock.
struct DirLock {
    _file: fs::File,
}

#[cfg(unix)]
fn lock_exclusive(file: &fs::File) -> io::Result<()> {
    use nix::fcntl::{FlockArg, flock};
    use std::os::fd::AsRawFd;

    flock(file.as_raw_fd(), FlockArg::LockExclusive)?;
    Ok(())
}

// only the in-process lock applies here
#[cfg(not(unix))]
fn lock_exclusive(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

/// Runs filesystem work off the async runtime; waiting on the directory
/// lock may block.
async fn blocking<T, F>(work: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        tracing::debug!("scan store at {:?}", dir);
        Ok(Self {
            records: Records { dir },
            lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl ScanStore for FileStore {
    async fn create(&self, scan_type: ScanType, tool: &str, target: &str) -> Result<Scan, StoreError> {
        let _guard = self.lock.lock().await;
        let records = self.records.clone();
        let (tool, target) = (tool.to_string(), target.to_string());

        blocking(move || {
            let _dir_lock = records.lock()?;
            let next = records.record_ids()?.into_iter().map(|id| id.0).max().unwrap_or(0) + 1;
            let scan = Scan::new(ScanId(next), scan_type, &tool, &target);
            records.write(&scan)?;
            Ok(scan)
        })
        .await
    }

    async fn get(&self, id: ScanId) -> Result<Scan, StoreError> {
        self.records.read(id)
    }

    async fn apply(&self, id: ScanId, transition: Transition) -> Result<(Scan, Applied), StoreError> {
        let _guard = self.lock.lock().await;
        let records = self.records.clone();

        blocking(move || {
            let _dir_lock = records.lock()?;
            let mut scan = records.read(id)?;
            let applied = scan.apply(transition)?;
            if applied == Applied::Changed {
                records.write(&scan)?;
            }
            Ok((scan, applied))
        })
        .await
    }

    async fn list(&self, query: &ScanQuery) -> Result<ScanPage, StoreError> {
        let mut scans = Vec::new();
        for id in self.records.record_ids()? {
            match self.records.read(id) {
                Ok(scan) => scans.push(scan),
                Err(e) => tracing::warn!("skipping unreadable scan record {}: {}", id, e),
            }
        }
        Ok(paginate(scans, query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::TaskRef;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn start() -> Transition {
        Transition::Start {
            task_ref: TaskRef::generate(),
            started_at: Utc::now(),
        }
    }

    async fn exercise(store: &dyn ScanStore) {
        let a = store.create(ScanType::Port, "masscan", "10.0.0.0/24").await.unwrap();
        let b = store.create(ScanType::Web, "httpx", "example.com").await.unwrap();
        let c = store.create(ScanType::Ssl, "testssl", "example.com:443").await.unwrap();
        assert_eq!((a.id, b.id, c.id), (ScanId(1), ScanId(2), ScanId(3)));

        let (running, applied) = store.apply(b.id, start()).await.unwrap();
        assert_eq!(applied, Applied::Changed);
        assert_eq!(running.status, ScanStatus::Running);
        assert_eq!(store.get(b.id).await.unwrap().status, ScanStatus::Running);

        let err = store
            .apply(a.id, Transition::Fail {
                message: "x".to_string(),
                completed_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let all = store.list(&ScanQuery::default()).await.unwrap();
        assert_eq!(all.total, 3);
        let ids: Vec<ScanId> = all.scans.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![ScanId(3), ScanId(2), ScanId(1)]);

        let pending = store
            .list(&ScanQuery::default().with_status(ScanStatus::Pending).page(1, 5))
            .await
            .unwrap();
        assert_eq!(pending.total, 2);
        assert_eq!(pending.scans.len(), 1);
        assert_eq!(pending.scans[0].id, ScanId(1));

        assert!(matches!(
            store.get(ScanId(99)).await,
            Err(StoreError::NotFound(ScanId(99)))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_file_store() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = FileStore::open(dir.path()).unwrap();
            let scan = store.create(ScanType::Service, "nmap", "10.0.0.1").await.unwrap();
            store.apply(scan.id, start()).await.unwrap();
            scan.id
        };

        let reopened = FileStore::open(dir.path()).unwrap();
        let scan = reopened.get(id).await.unwrap();
        assert_eq!(scan.status, ScanStatus::Running);
        assert!(scan.task_ref.is_some());

        let next = reopened.create(ScanType::Port, "rustscan", "10.0.0.1").await.unwrap();
        assert_eq!(next.id, ScanId(id.0 + 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_file_store_handles_share_one_directory() {
        let dir = TempDir::new().unwrap();
        let worker = std::sync::Arc::new(FileStore::open(dir.path()).unwrap());
        let canceller = std::sync::Arc::new(FileStore::open(dir.path()).unwrap());

        for _ in 0..50 {
            let scan = worker.create(ScanType::Port, "masscan", "10.0.0.1").await.unwrap();

            let (w, c) = (worker.clone(), canceller.clone());
            let start_task = tokio::spawn(async move { w.apply(scan.id, start()).await });
            let cancel_task = tokio::spawn(async move {
                c.apply(scan.id, Transition::Cancel {
                    completed_at: Utc::now(),
                })
                .await
            });
            let started = start_task.await.unwrap();
            let cancelled = cancel_task.await.unwrap();

            // RUNNING -> CANCELLED is legal, so cancel always wins and the
            // start only succeeds if it came first
            let (on_disk, _) = cancelled.unwrap();
            assert_eq!(on_disk.status, ScanStatus::Cancelled);
            match started {
                Ok((scan, _)) => assert_eq!(scan.status, ScanStatus::Running),
                Err(e) => assert!(matches!(e, StoreError::InvalidTransition { .. }), "{e}"),
            }
            assert_eq!(canceller.get(scan.id).await.unwrap().status, ScanStatus::Cancelled);
        }

        let (a, b) = tokio::join!(
            worker.create(ScanType::Web, "httpx", "a.example.com"),
            canceller.create(ScanType::Web, "httpx", "b.example.com"),
        );
        assert_ne!(a.unwrap().id, b.unwrap().id);
        assert_eq!(worker.list(&ScanQuery::default()).await.unwrap().total, 52);
    }

    #[tokio::test]
    async fn test_file_store_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        fs::write(dir.path().join("scan-7.json"), "{ torn").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        let page = store.list(&ScanQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);

        // ids continue after the highest record file present
        let scan = store.create(ScanType::Port, "masscan", "10.0.0.1").await.unwrap();
        assert_eq!(scan.id, ScanId(8));
    }
}
