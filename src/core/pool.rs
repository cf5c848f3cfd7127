use super::errors::DispatchError;
use super::models::{DispatchRequest, ScanStatus, TaskContext, TaskRef};
use super::orchestrator::Orchestrator;
use super::store::ScanQuery;
use crate::plugins::options::ScanOptions;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

struct Job {
    task_ref: TaskRef,
    request: DispatchRequest,
}

/// Fixed set of workers draining one bounded queue. Each worker runs a
/// single scan at a time.
pub struct WorkerPool {
    orchestrator: Arc<Orchestrator>,
    queue: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(orchestrator: Arc<Orchestrator>, workers: usize, queue_depth: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Job>(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move {
                    loop {
                        // the lock is held only while waiting for the next job
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { break };

                        let ctx = TaskContext::new(job.task_ref, worker);
                        let id = job.request.scan_id;
                        if let Err(e) = orchestrator.run(&ctx, job.request).await {
                            tracing::error!("[worker {}] scan {} not run: {}", worker, id, e);
                        }
                    }
                    tracing::debug!("[worker {}] queue closed, exiting", worker);
                })
            })
            .collect();

        tracing::debug!("worker pool started: {} workers, queue depth {}", workers, queue_depth);
        Self {
            orchestrator,
            queue: Some(tx),
            workers: handles,
        }
    }

    /// Validates the request and queues it. Waits for room when the queue
    /// is full.
    pub async fn submit(&self, request: DispatchRequest) -> Result<TaskRef, DispatchError> {
        let queue = self.queue.as_ref().ok_or(DispatchError::PoolClosed)?;
        self.orchestrator.accept(&request).await?;

        let task_ref = TaskRef::generate();
        tracing::info!("scan {} queued as task {}", request.scan_id, task_ref);
        queue
            .send(Job {
                task_ref: task_ref.clone(),
                request,
            })
            .await
            .map_err(|_| DispatchError::PoolClosed)?;

        Ok(task_ref)
    }

    /// Queues every PENDING scan in the store, oldest first, with the
    /// adapters' default options. Scans the orchestrator refuses are logged
    /// and skipped; they stay PENDING.
    pub async fn submit_pending(&self) -> Result<Vec<TaskRef>, DispatchError> {
        let mut pending = self
            .orchestrator
            .store()
            .list(&ScanQuery::default().with_status(ScanStatus::Pending))
            .await?
            .scans;
        pending.reverse();

        let mut queued = Vec::with_capacity(pending.len());
        for scan in pending {
            match self.submit(DispatchRequest::for_scan(&scan, ScanOptions::new())).await {
                Ok(task_ref) => queued.push(task_ref),
                Err(DispatchError::PoolClosed) => return Err(DispatchError::PoolClosed),
                Err(e) => tracing::warn!("skipping pending scan {}: {}", scan.id, e),
            }
        }
        Ok(queued)
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops accepting work, lets the workers drain what is queued and
    /// waits for them.
    pub async fn shutdown(mut self) {
        self.queue.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("worker task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::config::ToolConfig;
    use crate::core::events::ScanEvent;
    use crate::core::models::ScanType;
    use crate::core::store::{MemoryStore, ScanStore};
    use crate::plugins::registry::AdapterRegistry;

    // `echo` as nmap: prints its argv, which the XML parser rejects and the
    // text fallback turns into an empty host list
    fn registry() -> AdapterRegistry {
        let mut config = EngineConfig::default();
        config.tools.insert(
            "nmap".to_string(),
            ToolConfig {
                binary: Some("/bin/echo".to_string()),
                timeout_secs: Some(5),
                ..Default::default()
            },
        );
        AdapterRegistry::from_config(&config)
    }

    #[tokio::test]
    async fn test_pool_runs_every_submitted_scan() {
        let store: Arc<dyn ScanStore> = Arc::new(MemoryStore::new());
        let (tx, mut events) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), Arc::new(registry())).with_events(tx));
        let pool = WorkerPool::spawn(orchestrator, 2, 4);
        assert_eq!(pool.worker_count(), 2);

        let mut refs = Vec::new();
        for host in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            let scan = store.create(ScanType::Service, "nmap", host).await.unwrap();
            refs.push(
                pool.submit(DispatchRequest::for_scan(&scan, ScanOptions::new()))
                    .await
                    .unwrap(),
            );
        }
        pool.shutdown().await;

        let page = store.list(&ScanQuery::default()).await.unwrap();
        assert_eq!(page.total, 3);
        for scan in &page.scans {
            assert_eq!(scan.status, ScanStatus::Completed);
            assert!(refs.contains(scan.task_ref.as_ref().unwrap()));
            assert!(scan.parse_degraded);
        }

        let mut terminal = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ScanEvent::Completed { .. }) {
                terminal += 1;
            }
        }
        assert_eq!(terminal, 3);
    }

    #[tokio::test]
    async fn test_submit_rejects_before_queueing() {
        let store: Arc<dyn ScanStore> = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), Arc::new(registry())));
        let pool = WorkerPool::spawn(orchestrator, 1, 1);

        let scan = store.create(ScanType::Web, "wpscan", "example.com").await.unwrap();
        let err = pool
            .submit(DispatchRequest::for_scan(&scan, ScanOptions::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(_)));
        pool.shutdown().await;

        assert_eq!(store.get(scan.id).await.unwrap().status, ScanStatus::Pending);
    }

    #[tokio::test]
    async fn test_submit_pending_drains_store_with_configured_workers() {
        let store: Arc<dyn ScanStore> = Arc::new(MemoryStore::new());
        let first = store.create(ScanType::Service, "nmap", "10.0.0.1").await.unwrap();
        let unknown = store.create(ScanType::Web, "wpscan", "example.com").await.unwrap();
        let second = store.create(ScanType::Service, "nmap", "10.0.0.2").await.unwrap();

        let config = EngineConfig::default();
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), Arc::new(registry())));
        let pool = WorkerPool::spawn(orchestrator, config.workers.count, config.workers.queue_depth);
        assert_eq!(pool.worker_count(), config.workers.count);

        let queued = pool.submit_pending().await.unwrap();
        assert_eq!(queued.len(), 2);
        pool.shutdown().await;

        for id in [first.id, second.id] {
            assert_eq!(store.get(id).await.unwrap().status, ScanStatus::Completed);
        }
        assert_eq!(store.get(unknown.id).await.unwrap().status, ScanStatus::Pending);
    }
}
